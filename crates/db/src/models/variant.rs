//! Responsive variant model and upsert DTO.

use serde::Serialize;
use webopt_core::formats::ImageFormat;
use webopt_core::types::{EntityId, Timestamp};
use webopt_core::variants::VariantKey;

/// One encoded size/format of an image.
#[derive(Debug, Clone, Serialize)]
pub struct Variant {
    pub id: EntityId,
    pub image_id: EntityId,
    pub size_name: String,
    pub format: ImageFormat,
    pub breakpoint_width: u32,
    /// Encoded dimensions; may differ slightly from the breakpoint.
    pub width: u32,
    pub height: u32,
    pub path: String,
    pub byte_size: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Variant {
    pub fn key(&self) -> VariantKey {
        VariantKey::new(self.image_id, self.size_name.clone(), self.format)
    }
}

/// DTO for inserting or updating a variant by its composite key.
#[derive(Debug, Clone)]
pub struct UpsertVariant {
    pub key: VariantKey,
    pub breakpoint_width: u32,
    pub width: u32,
    pub height: u32,
    pub path: String,
    pub byte_size: u64,
}
