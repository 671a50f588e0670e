//! Batch entity model and DTOs.

use serde::Serialize;
use webopt_core::lifecycle::BatchStatus;
use webopt_core::settings::ConversionSettings;
use webopt_core::types::{EntityId, Timestamp};

/// A submitted batch of images sharing one set of conversion settings.
#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    pub id: EntityId,
    pub status: BatchStatus,
    pub total_images: u32,
    /// Images that reached a terminal state. Never decreases.
    pub processed_images: u32,
    pub settings: ConversionSettings,
    pub keywords: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a batch. The id is allocated by the caller so storage
/// paths can be written before any row exists.
#[derive(Debug, Clone)]
pub struct CreateBatch {
    pub id: EntityId,
    pub settings: ConversionSettings,
    pub keywords: Vec<String>,
}
