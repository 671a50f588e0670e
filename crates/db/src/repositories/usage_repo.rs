//! Repository for quota counters.
//!
//! Every check-and-increment runs under the single usage mutex, so two
//! concurrent requests for the same identity can never both be granted the
//! last unit.

use chrono::{NaiveDate, Utc};
use webopt_core::quota::{anonymous_allows, anonymous_remaining, overage_units};
use webopt_core::types::EntityId;

use crate::models::usage::{AccountUsage, ReserveOutcome, UsageRecord};
use crate::Database;

pub struct UsageRepo;

impl UsageRepo {
    // -----------------------------------------------------------------------
    // Anonymous
    // -----------------------------------------------------------------------

    /// Reserve `count` units for `fingerprint` on `day` if they fit `limit`.
    ///
    /// Creates the day's record on first use. A denied request changes nothing.
    pub async fn try_reserve_anonymous(
        db: &Database,
        fingerprint: &str,
        day: NaiveDate,
        limit: u32,
        count: u32,
    ) -> ReserveOutcome {
        let mut usage = db.usage.lock().await;
        let record = usage
            .anonymous
            .entry((fingerprint.to_string(), day))
            .or_insert_with(|| UsageRecord {
                fingerprint: fingerprint.to_string(),
                day,
                used: 0,
                reserved: 0,
                limit,
                created_at: Utc::now(),
            });
        record.limit = limit;

        if anonymous_allows(record.used, record.reserved, count, limit) {
            record.reserved += count;
            ReserveOutcome {
                allowed: true,
                remaining: anonymous_remaining(record.used, record.reserved, limit),
            }
        } else {
            ReserveOutcome {
                allowed: false,
                remaining: anonymous_remaining(record.used, record.reserved, limit),
            }
        }
    }

    /// Convert `count` reserved units into used units.
    ///
    /// Units committed without a matching reservation (for example after the
    /// day rolled over) are still counted as used.
    pub async fn commit_anonymous(
        db: &Database,
        fingerprint: &str,
        day: NaiveDate,
        limit: u32,
        count: u32,
    ) {
        let mut usage = db.usage.lock().await;
        let record = usage
            .anonymous
            .entry((fingerprint.to_string(), day))
            .or_insert_with(|| UsageRecord {
                fingerprint: fingerprint.to_string(),
                day,
                used: 0,
                reserved: 0,
                limit,
                created_at: Utc::now(),
            });
        record.reserved = record.reserved.saturating_sub(count);
        record.used = record.used.saturating_add(count);
    }

    /// Return `count` reserved units without spending them.
    pub async fn release_anonymous(db: &Database, fingerprint: &str, day: NaiveDate, count: u32) {
        let mut usage = db.usage.lock().await;
        if let Some(record) = usage.anonymous.get_mut(&(fingerprint.to_string(), day)) {
            record.reserved = record.reserved.saturating_sub(count);
        }
    }

    pub async fn anonymous_usage(
        db: &Database,
        fingerprint: &str,
        day: NaiveDate,
    ) -> Option<UsageRecord> {
        let usage = db.usage.lock().await;
        usage.anonymous.get(&(fingerprint.to_string(), day)).cloned()
    }

    // -----------------------------------------------------------------------
    // Subscriber accounts
    // -----------------------------------------------------------------------

    /// Add `count` used units to an account's cycle, returning the overage
    /// units this call incurred against `ceiling`.
    pub async fn commit_account(
        db: &Database,
        account_id: EntityId,
        cycle_index: i64,
        ceiling: u32,
        count: u32,
    ) -> u32 {
        let mut usage = db.usage.lock().await;
        let record = usage
            .accounts
            .entry((account_id, cycle_index))
            .or_insert_with(|| AccountUsage {
                account_id,
                cycle_index,
                used: 0,
                overage_units: 0,
            });
        let added = overage_units(record.used, count, ceiling);
        record.used = record.used.saturating_add(count);
        record.overage_units = record.overage_units.saturating_add(added);
        added
    }

    pub async fn account_usage(
        db: &Database,
        account_id: EntityId,
        cycle_index: i64,
    ) -> Option<AccountUsage> {
        let usage = db.usage.lock().await;
        usage.accounts.get(&(account_id, cycle_index)).cloned()
    }
}
