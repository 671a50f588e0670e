//! Repository for responsive variants.
//!
//! Rows are keyed by `(image id, size name, format)`; an upsert on an existing
//! key updates the row in place and keeps its id and creation time.

use std::ops::Bound;

use chrono::Utc;
use webopt_core::formats::ImageFormat;
use webopt_core::types::{new_id, EntityId};
use webopt_core::variants::VariantKey;

use crate::models::variant::{UpsertVariant, Variant};
use crate::Database;

/// Smallest possible key for an image; every key of that image sorts at or
/// after it.
fn lower_bound(image_id: EntityId) -> VariantKey {
    VariantKey::new(image_id, String::new(), ImageFormat::Jpeg)
}

pub struct VariantRepo;

impl VariantRepo {
    /// Insert or update the row for `input.key`.
    ///
    /// Returns the stored row and whether it was newly created.
    pub async fn upsert(db: &Database, input: UpsertVariant) -> (Variant, bool) {
        let now = Utc::now();
        let mut variants = db.variants.write().await;
        match variants.get_mut(&input.key) {
            Some(existing) => {
                existing.breakpoint_width = input.breakpoint_width;
                existing.width = input.width;
                existing.height = input.height;
                existing.path = input.path;
                existing.byte_size = input.byte_size;
                existing.updated_at = now;
                (existing.clone(), false)
            }
            None => {
                let row = Variant {
                    id: new_id(),
                    image_id: input.key.image_id,
                    size_name: input.key.size_name.clone(),
                    format: input.key.format,
                    breakpoint_width: input.breakpoint_width,
                    width: input.width,
                    height: input.height,
                    path: input.path,
                    byte_size: input.byte_size,
                    created_at: now,
                    updated_at: now,
                };
                variants.insert(input.key, row.clone());
                (row, true)
            }
        }
    }

    pub async fn find(db: &Database, key: &VariantKey) -> Option<Variant> {
        db.variants.read().await.get(key).cloned()
    }

    /// All variants of an image, ordered by ascending breakpoint then format.
    pub async fn list_by_image(db: &Database, image_id: EntityId) -> Vec<Variant> {
        let variants = db.variants.read().await;
        let mut rows: Vec<Variant> = variants
            .range((Bound::Included(lower_bound(image_id)), Bound::Unbounded))
            .take_while(|(key, _)| key.image_id == image_id)
            .map(|(_, v)| v.clone())
            .collect();
        rows.sort_by(|a, b| {
            a.breakpoint_width
                .cmp(&b.breakpoint_width)
                .then(a.format.name().cmp(b.format.name()))
        });
        rows
    }

    pub async fn count_by_image(db: &Database, image_id: EntityId) -> usize {
        let variants = db.variants.read().await;
        variants
            .range((Bound::Included(lower_bound(image_id)), Bound::Unbounded))
            .take_while(|(key, _)| key.image_id == image_id)
            .count()
    }

    /// Remove every variant of an image as one set, returning the removed rows.
    pub async fn delete_by_image(db: &Database, image_id: EntityId) -> Vec<Variant> {
        let mut variants = db.variants.write().await;
        let keys: Vec<VariantKey> = variants
            .range((Bound::Included(lower_bound(image_id)), Bound::Unbounded))
            .take_while(|(key, _)| key.image_id == image_id)
            .map(|(key, _)| key.clone())
            .collect();
        keys.iter().filter_map(|key| variants.remove(key)).collect()
    }
}
