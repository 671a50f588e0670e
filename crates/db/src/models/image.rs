//! Image entity model and DTOs.

use serde::{Deserialize, Serialize};
use webopt_core::formats::ImageFormat;
use webopt_core::lifecycle::ImageStatus;
use webopt_core::signature::VisualSignature;
use webopt_core::types::{EntityId, Timestamp};

// ---------------------------------------------------------------------------
// AssetDescriptor
// ---------------------------------------------------------------------------

/// A stored file plus the facts the pipeline knows about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    /// Opaque storage-relative path.
    pub path: String,
    pub byte_size: u64,
    pub format: ImageFormat,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Image {
    pub id: EntityId,
    pub batch_id: EntityId,
    /// Zero-based position within the submitted batch.
    pub position: u32,
    pub original_filename: String,
    pub original: AssetDescriptor,
    /// Primary converted asset; `None` until conversion succeeds.
    pub converted: Option<AssetDescriptor>,
    /// Sibling converted assets when more than one target format was requested.
    pub converted_alternates: Vec<AssetDescriptor>,
    pub status: ImageStatus,
    pub error_message: Option<String>,
    pub signature: Option<VisualSignature>,
    /// Written by external SEO collaborators; read by the scorer.
    pub alt_text: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Image {
    /// The converted asset for `format`, primary or sibling.
    pub fn converted_for(&self, format: ImageFormat) -> Option<&AssetDescriptor> {
        self.converted
            .iter()
            .chain(self.converted_alternates.iter())
            .find(|a| a.format == format)
    }
}

/// DTO for creating an image row.
#[derive(Debug, Clone)]
pub struct CreateImage {
    pub id: EntityId,
    pub batch_id: EntityId,
    pub position: u32,
    pub original_filename: String,
    pub original: AssetDescriptor,
}
