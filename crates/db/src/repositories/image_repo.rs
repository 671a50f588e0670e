//! Repository for images: lifecycle transitions and derived-field writes.

use chrono::Utc;
use webopt_core::error::CoreError;
use webopt_core::lifecycle::{validate_image_transition, ImageStatus};
use webopt_core::signature::VisualSignature;
use webopt_core::types::{EntityId, Timestamp};

use crate::models::image::{AssetDescriptor, CreateImage, Image};
use crate::Database;

pub(crate) fn new_image_row(input: CreateImage, now: Timestamp) -> Image {
    Image {
        id: input.id,
        batch_id: input.batch_id,
        position: input.position,
        original_filename: input.original_filename,
        original: input.original,
        converted: None,
        converted_alternates: Vec::new(),
        status: ImageStatus::Pending,
        error_message: None,
        signature: None,
        alt_text: None,
        created_at: now,
        updated_at: now,
    }
}

fn not_found(id: EntityId) -> CoreError {
    CoreError::NotFound { entity: "Image", id }
}

/// Provides lookups and guarded updates for images.
pub struct ImageRepo;

impl ImageRepo {
    pub async fn find_by_id(db: &Database, id: EntityId) -> Option<Image> {
        db.images.read().await.get(&id).cloned()
    }

    /// Images of a batch in submission order.
    pub async fn list_by_batch(db: &Database, batch_id: EntityId) -> Vec<Image> {
        let images = db.images.read().await;
        let mut rows: Vec<Image> = images
            .values()
            .filter(|img| img.batch_id == batch_id)
            .cloned()
            .collect();
        rows.sort_by_key(|img| img.position);
        rows
    }

    /// Move an image to `to`, enforcing the lifecycle rules.
    ///
    /// `error_message` is recorded only when moving to `failed`.
    pub async fn transition(
        db: &Database,
        id: EntityId,
        to: ImageStatus,
        error_message: Option<String>,
    ) -> Result<Image, CoreError> {
        let mut images = db.images.write().await;
        let image = images.get_mut(&id).ok_or_else(|| not_found(id))?;
        validate_image_transition(image.status, to)?;
        image.status = to;
        if to == ImageStatus::Failed {
            image.error_message = error_message;
        }
        image.updated_at = Utc::now();
        Ok(image.clone())
    }

    /// Record the primary converted asset and its siblings.
    ///
    /// Replaces any previous descriptors wholesale so a reader never sees a
    /// mix of old and new assets.
    pub async fn set_converted(
        db: &Database,
        id: EntityId,
        primary: AssetDescriptor,
        alternates: Vec<AssetDescriptor>,
    ) -> Result<Image, CoreError> {
        let mut images = db.images.write().await;
        let image = images.get_mut(&id).ok_or_else(|| not_found(id))?;
        image.converted = Some(primary);
        image.converted_alternates = alternates;
        image.updated_at = Utc::now();
        Ok(image.clone())
    }

    /// Fill in the original's dimensions once the source has been decoded.
    pub async fn set_original_dimensions(
        db: &Database,
        id: EntityId,
        width: u32,
        height: u32,
    ) -> Result<Image, CoreError> {
        let mut images = db.images.write().await;
        let image = images.get_mut(&id).ok_or_else(|| not_found(id))?;
        image.original.width = Some(width);
        image.original.height = Some(height);
        image.updated_at = Utc::now();
        Ok(image.clone())
    }

    pub async fn set_signature(
        db: &Database,
        id: EntityId,
        signature: VisualSignature,
    ) -> Result<Image, CoreError> {
        let mut images = db.images.write().await;
        let image = images.get_mut(&id).ok_or_else(|| not_found(id))?;
        image.signature = Some(signature);
        image.updated_at = Utc::now();
        Ok(image.clone())
    }

    /// Set or clear alt text. Blank text clears it.
    pub async fn set_alt_text(
        db: &Database,
        id: EntityId,
        alt_text: Option<String>,
    ) -> Result<Image, CoreError> {
        let mut images = db.images.write().await;
        let image = images.get_mut(&id).ok_or_else(|| not_found(id))?;
        image.alt_text = alt_text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        image.updated_at = Utc::now();
        Ok(image.clone())
    }
}
