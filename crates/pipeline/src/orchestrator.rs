//! BatchOrchestrator: batch submission, the per-image state machine and the
//! derived-asset read surface.
//!
//! Submission validates, authorizes quota, stores originals and writes the
//! batch rows, then returns while a background task processes the images.
//! Each image runs its stages strictly in order:
//!
//! 1. `pending -> processing`
//! 2. read and decode the original
//! 3. resize + convert to the target format(s)
//! 4. generate the variant matrix
//! 5. extract the visual signature
//! 6. record quota, `processing -> completed`
//!
//! Images of one batch run concurrently up to `max_concurrent_images`. The
//! batch cancellation token is checked before every stage; a stage already
//! running is allowed to finish.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use webopt_core::config::{Breakpoint, PipelineConfig};
use webopt_core::error::CoreError;
use webopt_core::formats::ImageFormat;
use webopt_core::lifecycle::{
    cancellation_path, BatchStatus, ImageStatus, StatusCounts, CANCELLED_REASON,
};
use webopt_core::quota::{Authorization, Caller};
use webopt_core::scoring::{self, PerformanceReport, ScoreInput};
use webopt_core::settings::{validate_keywords, ConversionSettings};
use webopt_core::signature::VisualSignature;
use webopt_core::types::{new_id, EntityId};
use webopt_core::variants::{build_srcset, original_path, render_srcset, SrcsetCandidate, SrcsetEntry};
use webopt_db::models::batch::{Batch, CreateBatch};
use webopt_db::models::image::{AssetDescriptor, CreateImage, Image};
use webopt_db::models::variant::Variant;
use webopt_db::repositories::{BatchRepo, ImageRepo, VariantRepo};
use webopt_db::DbPool;
use webopt_events::{event_types, EventBus, PipelineEvent};

use crate::codec::DecodedImage;
use crate::conversion::ConversionEngine;
use crate::error::PipelineError;
use crate::ledger::QuotaLedger;
use crate::signature::extract_signature;
use crate::storage::StorageProvider;
use crate::variants::{MatrixOutcome, VariantMatrixGenerator};

// ---------------------------------------------------------------------------
// Submission types
// ---------------------------------------------------------------------------

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct BatchSubmission {
    pub files: Vec<SourceFile>,
    pub settings: ConversionSettings,
    pub keywords: Vec<String>,
}

/// What `submit` returns once the batch exists.
#[derive(Debug, Clone)]
pub struct SubmittedBatch {
    pub batch: Batch,
    pub images: Vec<Image>,
    pub authorization: Authorization,
}

// ---------------------------------------------------------------------------
// Read surface
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ImageProgress {
    pub id: EntityId,
    pub filename: String,
    pub status: ImageStatus,
    pub error_message: Option<String>,
}

/// Polling view of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchProgress {
    #[serde(flatten)]
    pub batch: Batch,
    pub counts: StatusCounts,
    pub images: Vec<ImageProgress>,
}

/// A stored asset as seen by readers.
#[derive(Debug, Clone, Serialize)]
pub struct AssetView {
    pub url: String,
    pub format: ImageFormat,
    pub byte_size: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantView {
    pub size_name: String,
    pub format: ImageFormat,
    pub breakpoint_width: u32,
    pub width: u32,
    pub height: u32,
    pub byte_size: u64,
    pub url: String,
}

/// Everything templating and export collaborators read about one image.
#[derive(Debug, Clone, Serialize)]
pub struct ImageDetails {
    pub id: EntityId,
    pub batch_id: EntityId,
    pub filename: String,
    pub status: ImageStatus,
    pub error_message: Option<String>,
    pub original: AssetView,
    pub converted: Option<AssetView>,
    pub converted_alternates: Vec<AssetView>,
    pub variants: Vec<VariantView>,
    pub signature: Option<VisualSignature>,
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SrcsetView {
    pub format: ImageFormat,
    pub entries: Vec<SrcsetEntry>,
    /// Attribute-ready form, e.g. `"/media/a.webp 320w, /media/b.webp 1000w"`.
    pub srcset: String,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct BatchOrchestrator {
    db: DbPool,
    engine: Arc<ConversionEngine>,
    variants: VariantMatrixGenerator,
    ledger: Arc<QuotaLedger>,
    events: Arc<EventBus>,
    config: Arc<PipelineConfig>,
    active: Mutex<HashMap<EntityId, CancellationToken>>,
    tracker: TaskTracker,
}

fn not_found(entity: &'static str, id: EntityId) -> PipelineError {
    PipelineError::Core(CoreError::NotFound { entity, id })
}

fn checkpoint(token: &CancellationToken) -> Result<(), PipelineError> {
    if token.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

impl BatchOrchestrator {
    pub fn new(
        db: DbPool,
        engine: Arc<ConversionEngine>,
        ledger: Arc<QuotaLedger>,
        events: Arc<EventBus>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        let variants = VariantMatrixGenerator::new(
            Arc::clone(&engine),
            Arc::clone(&db),
            Arc::clone(&events),
            config.variant_quality,
        );
        Self {
            db,
            engine,
            variants,
            ledger,
            events,
            config,
            active: Mutex::new(HashMap::new()),
            tracker: TaskTracker::new(),
        }
    }

    pub fn ledger(&self) -> &Arc<QuotaLedger> {
        &self.ledger
    }

    pub fn engine(&self) -> &Arc<ConversionEngine> {
        &self.engine
    }

    pub fn config(&self) -> &Arc<PipelineConfig> {
        &self.config
    }

    fn storage(&self) -> &Arc<dyn StorageProvider> {
        self.engine.storage()
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    fn validate_submission(
        &self,
        submission: &BatchSubmission,
    ) -> Result<Vec<ImageFormat>, PipelineError> {
        if submission.files.is_empty() {
            return Err(CoreError::Validation("At least one file is required".to_string()).into());
        }
        if submission.files.len() > self.config.max_files_per_batch {
            return Err(CoreError::Validation(format!(
                "A batch may contain at most {} files, got {}",
                self.config.max_files_per_batch,
                submission.files.len()
            ))
            .into());
        }
        submission.settings.check()?;
        validate_keywords(&submission.keywords)?;

        submission
            .files
            .iter()
            .map(|file| -> Result<ImageFormat, PipelineError> {
                if file.bytes.len() > self.config.max_upload_bytes {
                    return Err(CoreError::Validation(format!(
                        "'{}' exceeds the {} byte upload limit",
                        file.filename, self.config.max_upload_bytes
                    ))
                    .into());
                }
                ImageFormat::detect(&file.bytes).ok_or_else(|| {
                    CoreError::Validation(format!("'{}' is not a recognised image", file.filename))
                        .into()
                })
            })
            .collect()
    }

    /// Accept a batch and start processing it in the background.
    ///
    /// Validation, quota and storage failures are reported before any batch
    /// row exists. On success the batch id is usable immediately.
    pub async fn submit(
        self: &Arc<Self>,
        caller: Caller,
        submission: BatchSubmission,
    ) -> Result<SubmittedBatch, PipelineError> {
        let formats = self.validate_submission(&submission)?;
        let count = submission.files.len() as u32;

        let authorization = self.ledger.authorize(&caller, count).await?;
        if !authorization.allowed {
            tracing::info!(
                caller = caller.kind(),
                requested = count,
                "Batch rejected: quota exceeded"
            );
            return Err(PipelineError::QuotaExceeded {
                requested: count,
                remaining: authorization.remaining.unwrap_or(0),
            });
        }

        let batch_id = new_id();
        let mut rows = Vec::with_capacity(submission.files.len());
        for (position, (file, format)) in submission.files.into_iter().zip(formats).enumerate() {
            let image_id = new_id();
            let path = original_path(batch_id, image_id, format.extension());
            if let Err(error) = self.storage().write(&path, &file.bytes).await {
                self.abandon_submission(&caller, count, &rows).await;
                return Err(error);
            }
            rows.push(CreateImage {
                id: image_id,
                batch_id,
                position: position as u32,
                original_filename: file.filename,
                original: AssetDescriptor {
                    path,
                    byte_size: file.bytes.len() as u64,
                    format,
                    width: None,
                    height: None,
                },
            });
        }

        let create = CreateBatch {
            id: batch_id,
            settings: submission.settings.clone(),
            keywords: submission.keywords,
        };
        let (batch, images) = match BatchRepo::create_with_images(&self.db, create, rows.clone()).await {
            Ok(created) => created,
            Err(error) => {
                self.abandon_submission(&caller, count, &rows).await;
                return Err(error.into());
            }
        };

        let token = CancellationToken::new();
        self.active.lock().await.insert(batch_id, token.clone());

        tracing::info!(
            batch_id = %batch_id,
            images = count,
            caller = caller.kind(),
            target = ?submission.settings.target_format,
            "Batch submitted"
        );

        let this = Arc::clone(self);
        let work = images.clone();
        self.tracker.spawn(async move {
            this.run_batch(batch_id, caller, submission.settings, work, token)
                .await;
        });

        Ok(SubmittedBatch {
            batch,
            images,
            authorization,
        })
    }

    /// Undo a submission that failed before its rows were written.
    async fn abandon_submission(&self, caller: &Caller, count: u32, written: &[CreateImage]) {
        for row in written {
            if let Err(e) = self.storage().delete(&row.original.path).await {
                tracing::warn!(path = %row.original.path, error = %e, "Failed to remove orphaned original");
            }
        }
        if let Err(e) = self.ledger.release(caller, count).await {
            tracing::warn!(error = %e, "Failed to release quota for abandoned submission");
        }
    }

    // -----------------------------------------------------------------------
    // Processing
    // -----------------------------------------------------------------------

    async fn run_batch(
        self: Arc<Self>,
        batch_id: EntityId,
        caller: Caller,
        settings: ConversionSettings,
        images: Vec<Image>,
        token: CancellationToken,
    ) {
        let limit = self.config.max_concurrent_images.max(1);
        let job = Arc::new(ImageJob {
            batch_id,
            caller,
            settings,
            breakpoints: self.config.sorted_breakpoints(),
            token: token.clone(),
        });

        let tasks = images.into_iter().map(|image| {
            let this = Arc::clone(&self);
            let job = Arc::clone(&job);
            async move { this.process_image(&job, image).await }
        });
        futures::stream::iter(tasks)
            .buffer_unordered(limit)
            .collect::<Vec<()>>()
            .await;

        self.active.lock().await.remove(&batch_id);

        let Some(batch) = BatchRepo::find_by_id(&self.db, batch_id).await else {
            tracing::error!(batch_id = %batch_id, "Batch vanished while processing");
            return;
        };
        let event_type = if batch.status == BatchStatus::Completed {
            event_types::BATCH_COMPLETED
        } else {
            event_types::BATCH_FAILED
        };
        tracing::info!(
            batch_id = %batch_id,
            status = ?batch.status,
            processed = batch.processed_images,
            total = batch.total_images,
            cancelled = token.is_cancelled(),
            "Batch finished"
        );
        self.events.publish(
            PipelineEvent::new(event_type)
                .with_batch(batch_id)
                .with_payload(serde_json::json!({
                    "status": batch.status,
                    "processed_images": batch.processed_images,
                    "total_images": batch.total_images,
                })),
        );
    }

    async fn process_image(&self, job: &ImageJob, image: Image) {
        let image_id = image.id;
        let settled = match self.run_stages(job, &image).await {
            Ok(()) => self.complete_image(job, image_id).await,
            Err(error) => self.fail_image(job, image_id, error).await,
        };
        if let Err(e) = settled {
            tracing::error!(
                batch_id = %job.batch_id,
                image_id = %image_id,
                error = %e,
                "Failed to settle image"
            );
        }
    }

    async fn run_stages(&self, job: &ImageJob, image: &Image) -> Result<(), PipelineError> {
        let image_id = image.id;

        checkpoint(&job.token)?;
        ImageRepo::transition(&self.db, image_id, ImageStatus::Processing, None).await?;
        BatchRepo::refresh(&self.db, job.batch_id, false).await?;
        self.events.publish(
            PipelineEvent::new(event_types::IMAGE_PROCESSING)
                .with_batch(job.batch_id)
                .with_image(image_id),
        );

        checkpoint(&job.token)?;
        let bytes = self.storage().read(&image.original.path).await?;
        let DecodedImage { image: raster, format } = self.decode(bytes).await?;
        let source = Arc::new(raster);
        let (width, height) = source.dimensions();
        ImageRepo::set_original_dimensions(&self.db, image_id, width, height).await?;

        checkpoint(&job.token)?;
        let prepared = self.prepare(Arc::clone(&source), &job.settings).await?;
        let mut assets = self
            .engine
            .convert(image_id, Arc::clone(&prepared), &job.settings)
            .await?
            .into_iter();
        let primary = assets
            .next()
            .ok_or_else(|| PipelineError::internal("Conversion produced no asset"))?;
        ImageRepo::set_converted(&self.db, image_id, primary, assets.collect()).await?;

        checkpoint(&job.token)?;
        self.variants
            .generate(
                job.batch_id,
                image_id,
                prepared,
                &job.breakpoints,
                job.settings.target_format.formats(),
            )
            .await;

        checkpoint(&job.token)?;
        let signature = extract_signature(source, format).await?;
        ImageRepo::set_signature(&self.db, image_id, signature).await?;
        Ok(())
    }

    async fn complete_image(&self, job: &ImageJob, image_id: EntityId) -> Result<(), PipelineError> {
        self.ledger.record(&job.caller, 1).await?;
        let image = ImageRepo::transition(&self.db, image_id, ImageStatus::Completed, None).await?;
        BatchRepo::refresh(&self.db, job.batch_id, true).await?;

        tracing::info!(
            batch_id = %job.batch_id,
            image_id = %image_id,
            converted = ?image.converted.as_ref().map(|c| &c.path),
            "Image completed"
        );
        self.events.publish(
            PipelineEvent::new(event_types::IMAGE_COMPLETED)
                .with_batch(job.batch_id)
                .with_image(image_id)
                .with_payload(serde_json::json!({ "filename": image.original_filename })),
        );
        Ok(())
    }

    async fn fail_image(
        &self,
        job: &ImageJob,
        image_id: EntityId,
        error: PipelineError,
    ) -> Result<(), PipelineError> {
        let message = match &error {
            PipelineError::Cancelled => CANCELLED_REASON.to_string(),
            other => other.to_string(),
        };
        let current = ImageRepo::find_by_id(&self.db, image_id)
            .await
            .ok_or_else(|| not_found("Image", image_id))?;
        let path = cancellation_path(current.status);
        if path.is_empty() {
            return Ok(());
        }
        for status in path {
            ImageRepo::transition(&self.db, image_id, *status, Some(message.clone())).await?;
        }
        self.ledger.release(&job.caller, 1).await?;
        BatchRepo::refresh(&self.db, job.batch_id, true).await?;

        tracing::warn!(
            batch_id = %job.batch_id,
            image_id = %image_id,
            error = %message,
            retryable = error.is_retryable(),
            "Image failed"
        );
        let fallback = match &error {
            PipelineError::UnsupportedFormat { fallback, .. } => *fallback,
            _ => None,
        };
        self.events.publish(
            PipelineEvent::new(event_types::IMAGE_FAILED)
                .with_batch(job.batch_id)
                .with_image(image_id)
                .with_payload(serde_json::json!({
                    "error": message,
                    "retryable": error.is_retryable(),
                    "fallback_format": fallback,
                })),
        );
        Ok(())
    }

    async fn decode(&self, bytes: Vec<u8>) -> Result<DecodedImage, PipelineError> {
        let backend = Arc::clone(self.engine.backend());
        tokio::task::spawn_blocking(move || backend.decode(&bytes))
            .await
            .map_err(|e| PipelineError::internal(format!("Decode task failed: {e}")))?
    }

    async fn prepare(
        &self,
        source: Arc<DynamicImage>,
        settings: &ConversionSettings,
    ) -> Result<Arc<DynamicImage>, PipelineError> {
        let engine = Arc::clone(&self.engine);
        let settings = settings.clone();
        let prepared = tokio::task::spawn_blocking(move || engine.prepare(&source, &settings))
            .await
            .map_err(|e| PipelineError::internal(format!("Resize task failed: {e}")))?;
        Ok(Arc::new(prepared))
    }

    // -----------------------------------------------------------------------
    // Control
    // -----------------------------------------------------------------------

    /// Trip the batch's cancellation token.
    ///
    /// Returns `false` when the batch exists but is no longer running.
    pub async fn cancel(&self, batch_id: EntityId) -> Result<bool, PipelineError> {
        if BatchRepo::find_by_id(&self.db, batch_id).await.is_none() {
            return Err(not_found("Batch", batch_id));
        }
        match self.active.lock().await.get(&batch_id) {
            Some(token) => {
                token.cancel();
                tracing::info!(batch_id = %batch_id, "Batch cancellation requested");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Whether the batch still has a background task.
    pub async fn is_running(&self, batch_id: EntityId) -> bool {
        self.active.lock().await.contains_key(&batch_id)
    }

    /// Wait for every running batch to finish. Used at shutdown.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Re-run the variant matrix for a completed image, overwriting files and
    /// updating rows in place.
    pub async fn regenerate_variants(&self, image_id: EntityId) -> Result<MatrixOutcome, PipelineError> {
        let image = ImageRepo::find_by_id(&self.db, image_id)
            .await
            .ok_or_else(|| not_found("Image", image_id))?;
        if image.status != ImageStatus::Completed {
            return Err(CoreError::Conflict(format!(
                "Image {image_id} is {}; only completed images have variants",
                image.status.name()
            ))
            .into());
        }
        let batch = BatchRepo::find_by_id(&self.db, image.batch_id)
            .await
            .ok_or_else(|| not_found("Batch", image.batch_id))?;

        let bytes = self.storage().read(&image.original.path).await?;
        let decoded = self.decode(bytes).await?;
        let prepared = self.prepare(Arc::new(decoded.image), &batch.settings).await?;
        let outcome = self
            .variants
            .generate(
                batch.id,
                image_id,
                prepared,
                &self.config.sorted_breakpoints(),
                batch.settings.target_format.formats(),
            )
            .await;

        tracing::info!(
            image_id = %image_id,
            created = outcome.created,
            updated = outcome.updated,
            failed = outcome.failures.len(),
            "Variants regenerated"
        );
        Ok(outcome)
    }

    /// Delete every variant of an image, rows and files, as a set.
    pub async fn invalidate_variants(&self, image_id: EntityId) -> Result<usize, PipelineError> {
        if ImageRepo::find_by_id(&self.db, image_id).await.is_none() {
            return Err(not_found("Image", image_id));
        }
        let removed = VariantRepo::delete_by_image(&self.db, image_id).await;
        for variant in &removed {
            if let Err(e) = self.storage().delete(&variant.path).await {
                tracing::warn!(path = %variant.path, error = %e, "Failed to delete variant file");
            }
        }
        tracing::info!(image_id = %image_id, removed = removed.len(), "Variants invalidated");
        Ok(removed.len())
    }

    pub async fn set_alt_text(
        &self,
        image_id: EntityId,
        alt_text: Option<String>,
    ) -> Result<Image, PipelineError> {
        Ok(ImageRepo::set_alt_text(&self.db, image_id, alt_text).await?)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub async fn progress(&self, batch_id: EntityId) -> Result<BatchProgress, PipelineError> {
        let batch = BatchRepo::find_by_id(&self.db, batch_id)
            .await
            .ok_or_else(|| not_found("Batch", batch_id))?;
        let images = ImageRepo::list_by_batch(&self.db, batch_id).await;
        let statuses: Vec<ImageStatus> = images.iter().map(|img| img.status).collect();
        Ok(BatchProgress {
            batch,
            counts: StatusCounts::from_statuses(&statuses),
            images: images
                .into_iter()
                .map(|img| ImageProgress {
                    id: img.id,
                    filename: img.original_filename,
                    status: img.status,
                    error_message: img.error_message,
                })
                .collect(),
        })
    }

    fn asset_view(&self, asset: &AssetDescriptor) -> AssetView {
        AssetView {
            url: self.storage().url_for(&asset.path),
            format: asset.format,
            byte_size: asset.byte_size,
            width: asset.width,
            height: asset.height,
        }
    }

    fn variant_view(&self, variant: &Variant) -> VariantView {
        VariantView {
            size_name: variant.size_name.clone(),
            format: variant.format,
            breakpoint_width: variant.breakpoint_width,
            width: variant.width,
            height: variant.height,
            byte_size: variant.byte_size,
            url: self.storage().url_for(&variant.path),
        }
    }

    pub async fn image_details(&self, image_id: EntityId) -> Result<ImageDetails, PipelineError> {
        let image = ImageRepo::find_by_id(&self.db, image_id)
            .await
            .ok_or_else(|| not_found("Image", image_id))?;
        let variants = VariantRepo::list_by_image(&self.db, image_id).await;
        Ok(ImageDetails {
            id: image.id,
            batch_id: image.batch_id,
            original: self.asset_view(&image.original),
            converted: image.converted.as_ref().map(|a| self.asset_view(a)),
            converted_alternates: image
                .converted_alternates
                .iter()
                .map(|a| self.asset_view(a))
                .collect(),
            variants: variants.iter().map(|v| self.variant_view(v)).collect(),
            filename: image.original_filename,
            status: image.status,
            error_message: image.error_message,
            signature: image.signature,
            alt_text: image.alt_text,
        })
    }

    /// Responsive candidate list for one format, primary asset last.
    pub async fn srcset(&self, image_id: EntityId, format: ImageFormat) -> Result<SrcsetView, PipelineError> {
        let image = ImageRepo::find_by_id(&self.db, image_id)
            .await
            .ok_or_else(|| not_found("Image", image_id))?;
        let primary = image
            .converted_for(format)
            .and_then(|asset| asset.width.map(|w| (asset, w)));
        let Some((primary, primary_width)) = primary else {
            return Err(CoreError::Conflict(format!(
                "Image {image_id} has no converted {format} asset"
            ))
            .into());
        };

        let candidates = VariantRepo::list_by_image(&self.db, image_id)
            .await
            .into_iter()
            .filter(|v| v.format == format)
            .map(|v| SrcsetCandidate {
                url: self.storage().url_for(&v.path),
                breakpoint: v.breakpoint_width,
                width: v.width,
            })
            .collect();
        let entries = build_srcset(candidates, &self.storage().url_for(&primary.path), primary_width);
        Ok(SrcsetView {
            format,
            srcset: render_srcset(&entries),
            entries,
        })
    }

    /// Score an image from its persisted metadata.
    pub async fn score(&self, image_id: EntityId) -> Result<PerformanceReport, PipelineError> {
        let image = ImageRepo::find_by_id(&self.db, image_id)
            .await
            .ok_or_else(|| not_found("Image", image_id))?;
        let variant_count = VariantRepo::count_by_image(&self.db, image_id).await;
        Ok(scoring::score(&score_input(&image, variant_count)))
    }
}

/// Per-batch context shared by every image task of one run.
struct ImageJob {
    batch_id: EntityId,
    caller: Caller,
    settings: ConversionSettings,
    breakpoints: Vec<Breakpoint>,
    token: CancellationToken,
}

/// Scorer input: the converted asset when present, otherwise the original.
pub fn score_input(image: &Image, variant_count: usize) -> ScoreInput {
    let converted = image.converted.as_ref();
    let asset = converted.unwrap_or(&image.original);
    ScoreInput {
        file_size_bytes: asset.byte_size,
        original_size_bytes: converted.map(|_| image.original.byte_size),
        format: Some(asset.format),
        width: converted.and_then(|c| c.width),
        height: converted.and_then(|c| c.height),
        alt_text: image.alt_text.clone(),
        variant_count,
        placeholder_hash: image.signature.as_ref().map(|s| s.placeholder_hash.clone()),
        aspect_ratio: image.signature.as_ref().and_then(|s| s.aspect_ratio.clone()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
