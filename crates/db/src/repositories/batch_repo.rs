//! Repository for batches and their progress aggregate.

use chrono::Utc;
use webopt_core::error::CoreError;
use webopt_core::lifecycle::{derive_batch_status, BatchStatus, ImageStatus};
use webopt_core::types::EntityId;

use crate::models::batch::{Batch, CreateBatch};
use crate::models::image::{CreateImage, Image};
use crate::repositories::image_repo::new_image_row;
use crate::Database;

/// Provides creation, lookup and aggregate refresh for batches.
pub struct BatchRepo;

impl BatchRepo {
    /// Insert a batch in `pending` together with all of its images.
    ///
    /// Either every row is written or none is.
    pub async fn create_with_images(
        db: &Database,
        input: CreateBatch,
        images: Vec<CreateImage>,
    ) -> Result<(Batch, Vec<Image>), CoreError> {
        if images.iter().any(|img| img.batch_id != input.id) {
            return Err(CoreError::Validation(
                "Every image must belong to the batch being created".to_string(),
            ));
        }
        let mut batches = db.batches.write().await;
        let mut image_rows = db.images.write().await;
        if batches.contains_key(&input.id) {
            return Err(CoreError::Conflict(format!(
                "Batch {} already exists",
                input.id
            )));
        }
        if let Some(dup) = images.iter().find(|img| image_rows.contains_key(&img.id)) {
            return Err(CoreError::Conflict(format!("Image {} already exists", dup.id)));
        }

        let now = Utc::now();
        let batch = Batch {
            id: input.id,
            status: BatchStatus::Pending,
            total_images: images.len() as u32,
            processed_images: 0,
            settings: input.settings,
            keywords: input.keywords,
            created_at: now,
            updated_at: now,
        };
        let created: Vec<Image> = images
            .into_iter()
            .map(|img| new_image_row(img, now))
            .collect();
        for image in &created {
            image_rows.insert(image.id, image.clone());
        }
        batches.insert(batch.id, batch.clone());
        Ok((batch, created))
    }

    pub async fn find_by_id(db: &Database, id: EntityId) -> Option<Batch> {
        db.batches.read().await.get(&id).cloned()
    }

    /// Re-derive the batch status from its images.
    ///
    /// With `settled = true` the caller reports that one image has just
    /// reached a terminal state, and `processed_images` is incremented once.
    /// The batch lock is held while image statuses are read, so concurrent
    /// refreshes are serialised and the last one sees every settled image.
    pub async fn refresh(db: &Database, id: EntityId, settled: bool) -> Result<Batch, CoreError> {
        let mut batches = db.batches.write().await;
        let batch = batches.get_mut(&id).ok_or(CoreError::NotFound {
            entity: "Batch",
            id,
        })?;

        let statuses: Vec<ImageStatus> = {
            let images = db.images.read().await;
            images
                .values()
                .filter(|img| img.batch_id == id)
                .map(|img| img.status)
                .collect()
        };

        if settled {
            batch.processed_images = (batch.processed_images + 1).min(batch.total_images);
        }
        batch.status = derive_batch_status(&statuses);
        batch.updated_at = Utc::now();
        Ok(batch.clone())
    }
}
