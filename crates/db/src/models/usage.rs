//! Quota models: anonymous daily usage and subscriber accounts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use webopt_core::types::{EntityId, Timestamp};

// ---------------------------------------------------------------------------
// Anonymous
// ---------------------------------------------------------------------------

/// Per-fingerprint, per-day counter. Created lazily on first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageRecord {
    pub fingerprint: String,
    pub day: NaiveDate,
    /// Units spent on completed work.
    pub used: u32,
    /// Units authorized for work still in flight.
    pub reserved: u32,
    pub limit: u32,
    pub created_at: Timestamp,
}

/// Outcome of an atomic reserve attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveOutcome {
    pub allowed: bool,
    pub remaining: u32,
}

// ---------------------------------------------------------------------------
// Subscriber
// ---------------------------------------------------------------------------

/// A subscriber account. API keys are stored only as SHA-256 hex digests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaAccount {
    pub id: EntityId,
    pub name: String,
    pub plan: String,
    pub monthly_limit: u32,
    pub overage_rate_cents: u32,
    #[serde(skip_serializing)]
    pub api_key_hashes: Vec<String>,
    /// Billing cycles are counted from this instant.
    pub created_at: Timestamp,
}

/// DTO for registering an account, also the shape of the accounts file.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateQuotaAccount {
    pub id: Option<EntityId>,
    pub name: String,
    pub plan: String,
    pub monthly_limit: u32,
    pub overage_rate_cents: u32,
    #[serde(default)]
    pub api_key_hashes: Vec<String>,
    pub created_at: Option<Timestamp>,
}

/// Usage of one account within one billing cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountUsage {
    pub account_id: EntityId,
    pub cycle_index: i64,
    pub used: u32,
    pub overage_units: u32,
}
