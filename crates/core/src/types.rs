/// All entity identifiers are time-ordered UUIDs (v7).
pub type EntityId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh entity identifier.
pub fn new_id() -> EntityId {
    uuid::Uuid::now_v7()
}
