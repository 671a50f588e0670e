//! Record models and repositories for the optimization pipeline.
//!
//! Rows live in an in-process [`Database`]: one lock per table, with the
//! variant table held as an explicit `BTreeMap` keyed by
//! [`VariantKey`](webopt_core::variants::VariantKey) so composite-key upserts
//! are a map operation rather than a persistence-layer feature.
//!
//! Repositories are zero-sized structs whose async methods take `&Database`,
//! mirroring a pool-backed repository layer.

pub mod models;
pub mod repositories;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use webopt_core::types::EntityId;
use webopt_core::variants::VariantKey;

use crate::models::batch::Batch;
use crate::models::image::Image;
use crate::models::usage::{AccountUsage, QuotaAccount, UsageRecord};
use crate::models::variant::Variant;

/// Shared handle to the store.
pub type DbPool = Arc<Database>;

/// Create an empty store.
pub fn create_pool() -> DbPool {
    Arc::new(Database::default())
}

/// Table storage. Lock order when more than one table is held:
/// `batches` before `images`.
#[derive(Default)]
pub struct Database {
    pub(crate) batches: RwLock<HashMap<EntityId, Batch>>,
    pub(crate) images: RwLock<HashMap<EntityId, Image>>,
    pub(crate) variants: RwLock<BTreeMap<VariantKey, Variant>>,
    pub(crate) usage: Mutex<UsageTables>,
    pub(crate) accounts: RwLock<AccountTables>,
}

/// Counters guarded by one mutex so every check-and-increment is atomic.
#[derive(Default)]
pub(crate) struct UsageTables {
    /// Keyed by `(fingerprint, local day)`.
    pub(crate) anonymous: HashMap<(String, chrono::NaiveDate), UsageRecord>,
    /// Keyed by `(account id, cycle index)`.
    pub(crate) accounts: HashMap<(EntityId, i64), AccountUsage>,
}

#[derive(Default)]
pub(crate) struct AccountTables {
    pub(crate) by_id: HashMap<EntityId, QuotaAccount>,
    /// API key SHA-256 hex digest -> account id.
    pub(crate) by_key_hash: HashMap<String, EntityId>,
}
