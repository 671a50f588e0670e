//! VariantMatrixGenerator: breakpoints x formats, each an independent unit.

use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use webopt_core::config::Breakpoint;
use webopt_core::formats::ImageFormat;
use webopt_core::types::EntityId;
use webopt_core::variants::{eligible_breakpoints, scaled_dimensions, variant_path, VariantKey};
use webopt_db::models::variant::{UpsertVariant, Variant};
use webopt_db::repositories::VariantRepo;
use webopt_db::DbPool;
use webopt_events::{event_types, EventBus, PipelineEvent};

use crate::conversion::ConversionEngine;
use crate::error::PipelineError;

/// One matrix cell that could not be produced.
#[derive(Debug)]
pub struct VariantFailure {
    pub key: VariantKey,
    pub error: PipelineError,
}

/// Result of one generation run.
#[derive(Debug, Default)]
pub struct MatrixOutcome {
    /// Rows written by this run, in generation order.
    pub variants: Vec<Variant>,
    pub created: usize,
    pub updated: usize,
    pub failures: Vec<VariantFailure>,
}

pub struct VariantMatrixGenerator {
    engine: Arc<ConversionEngine>,
    db: DbPool,
    events: Arc<EventBus>,
    quality: u8,
}

impl VariantMatrixGenerator {
    pub fn new(engine: Arc<ConversionEngine>, db: DbPool, events: Arc<EventBus>, quality: u8) -> Self {
        Self {
            engine,
            db,
            events,
            quality,
        }
    }

    /// Generate every eligible `(breakpoint, format)` variant of an image.
    ///
    /// `source` is the raster the primary asset was encoded from; its width is
    /// the effective width. Breakpoints at or above it are skipped. A failed
    /// cell is logged, published as `variant.failed` and does not stop the
    /// remaining cells. Re-running updates existing rows and overwrites their
    /// files.
    pub async fn generate(
        &self,
        batch_id: EntityId,
        image_id: EntityId,
        source: Arc<DynamicImage>,
        breakpoints: &[Breakpoint],
        formats: &[ImageFormat],
    ) -> MatrixOutcome {
        let (width, height) = source.dimensions();
        let mut outcome = MatrixOutcome::default();

        for breakpoint in eligible_breakpoints(breakpoints, width) {
            let (target_w, target_h) = scaled_dimensions(width, height, breakpoint.width);
            for format in formats {
                let key = VariantKey::new(image_id, breakpoint.name.clone(), *format);
                let stored = self
                    .engine
                    .encode_and_store(
                        Arc::clone(&source),
                        target_w,
                        target_h,
                        *format,
                        self.quality,
                        variant_path(&key),
                    )
                    .await;

                match stored {
                    Ok(asset) => {
                        let (row, created) = VariantRepo::upsert(
                            &self.db,
                            UpsertVariant {
                                key,
                                breakpoint_width: breakpoint.width,
                                width: asset.width.unwrap_or(target_w),
                                height: asset.height.unwrap_or(target_h),
                                path: asset.path,
                                byte_size: asset.byte_size,
                            },
                        )
                        .await;
                        if created {
                            outcome.created += 1;
                        } else {
                            outcome.updated += 1;
                        }
                        outcome.variants.push(row);
                    }
                    Err(error) => {
                        tracing::warn!(
                            batch_id = %batch_id,
                            image_id = %image_id,
                            size = %key.size_name,
                            format = %key.format,
                            error = %error,
                            "Variant generation failed"
                        );
                        self.events.publish(
                            PipelineEvent::new(event_types::VARIANT_FAILED)
                                .with_batch(batch_id)
                                .with_image(image_id)
                                .with_payload(serde_json::json!({
                                    "size_name": key.size_name,
                                    "format": key.format,
                                    "error": error.to_string(),
                                })),
                        );
                        outcome.failures.push(VariantFailure { key, error });
                    }
                }
            }
        }

        tracing::debug!(
            image_id = %image_id,
            created = outcome.created,
            updated = outcome.updated,
            failed = outcome.failures.len(),
            "Variant matrix generated"
        );
        outcome
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
