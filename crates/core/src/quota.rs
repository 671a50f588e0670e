//! Caller identities, quota tiers and usage-window arithmetic.
//!
//! Anonymous callers are bounded by a per-day counter keyed by fingerprint;
//! the day rolls over at local midnight. Subscriber accounts (sessions and API
//! keys) use fixed-length cycles counted from account creation and are never
//! denied: usage past the plan ceiling is billed as overage.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use crate::types::{EntityId, Timestamp};

// ---------------------------------------------------------------------------
// Caller / tier
// ---------------------------------------------------------------------------

/// Who is asking, as resolved from the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Caller {
    /// An authenticated subscriber session.
    Subscriber { account_id: EntityId },
    /// A presented API key, stored only as its SHA-256 hex digest. The
    /// fingerprint is used when the key does not belong to any account.
    ApiKey {
        key_hash: String,
        fingerprint: String,
    },
    /// No credentials.
    Anonymous { fingerprint: String },
}

impl Caller {
    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Subscriber { .. } => "subscriber",
            Self::ApiKey { .. } => "api_key",
            Self::Anonymous { .. } => "anonymous",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Anonymous,
    ApiKey,
    Subscriber,
}

/// Result of `authorize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Authorization {
    pub allowed: bool,
    /// `None` means unlimited (a subscriber session).
    pub remaining: Option<u32>,
    pub tier: Tier,
}

// ---------------------------------------------------------------------------
// Anonymous daily window
// ---------------------------------------------------------------------------

/// Key of the daily window containing `now`, in `now`'s own time zone.
pub fn day_key<Tz: TimeZone>(now: &DateTime<Tz>) -> NaiveDate {
    now.date_naive()
}

/// The next midnight after `now` in `now`'s time zone, as UTC.
///
/// When midnight does not exist locally (a DST gap) the first valid instant
/// after it is used.
pub fn next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Timestamp {
    let fallback = now.with_timezone(&Utc) + Duration::days(1);
    let Some(tomorrow) = now
        .date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    else {
        return fallback;
    };
    let tz = now.timezone();
    (0..=2_i64)
        .find_map(|h| tz.from_local_datetime(&(tomorrow + Duration::hours(h))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(fallback)
}

/// Whether an anonymous request for `requested` more units fits the ceiling.
pub fn anonymous_allows(used: u32, reserved: u32, requested: u32, limit: u32) -> bool {
    used.saturating_add(reserved).saturating_add(requested) <= limit
}

/// Units still available to an anonymous caller today.
pub fn anonymous_remaining(used: u32, reserved: u32, limit: u32) -> u32 {
    limit.saturating_sub(used.saturating_add(reserved))
}

// ---------------------------------------------------------------------------
// Subscriber billing cycle
// ---------------------------------------------------------------------------

/// Zero-based index of the cycle containing `now`.
pub fn cycle_index(created_at: Timestamp, now: Timestamp, cycle_days: i64) -> i64 {
    let cycle_days = cycle_days.max(1);
    (now - created_at).num_days().max(0) / cycle_days
}

pub fn cycle_start(created_at: Timestamp, index: i64, cycle_days: i64) -> Timestamp {
    created_at + Duration::days(index * cycle_days.max(1))
}

/// Instant the cycle with `index` ends and the next one begins.
pub fn cycle_end(created_at: Timestamp, index: i64, cycle_days: i64) -> Timestamp {
    cycle_start(created_at, index + 1, cycle_days)
}

/// Overage units incurred by moving a counter from `used_before` to
/// `used_before + count` against `ceiling`.
pub fn overage_units(used_before: u32, count: u32, ceiling: u32) -> u32 {
    let used_after = used_before.saturating_add(count);
    used_after.saturating_sub(ceiling) - used_before.saturating_sub(ceiling)
}

pub fn overage_cost_cents(units: u32, rate_cents: u32) -> u64 {
    units as u64 * rate_cents as u64
}

// ---------------------------------------------------------------------------
// Quota status
// ---------------------------------------------------------------------------

/// Caller-facing quota snapshot. The two shapes are distinct on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum QuotaStatus {
    Anonymous {
        used: u32,
        quota: u32,
        remaining: u32,
        resets_at: Timestamp,
    },
    Subscriber {
        plan: String,
        used: u32,
        quota: u32,
        remaining: u32,
        overage_units: u32,
        overage_rate_cents: u32,
        overage_cost_cents: u64,
        cycle_started_at: Timestamp,
        resets_at: Timestamp,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
