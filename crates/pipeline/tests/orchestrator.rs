//! End-to-end tests for the batch orchestrator over in-memory storage.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use assert_matches::assert_matches;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use webopt_core::config::PipelineConfig;
use webopt_core::formats::{ImageFormat, TargetFormat};
use webopt_core::lifecycle::{BatchStatus, ImageStatus, CANCELLED_REASON};
use webopt_core::quota::{Caller, QuotaStatus};
use webopt_core::settings::ConversionSettings;
use webopt_core::types::EntityId;
use webopt_db::create_pool;
use webopt_events::{event_types, EventBus};
use webopt_pipeline::codec::{BasicBackend, DecodedImage};
use webopt_pipeline::orchestrator::BatchProgress;
use webopt_pipeline::{
    BatchOrchestrator, BatchSubmission, CodecBackend, ConversionEngine, LocalStorage,
    MemoryStorage, PipelineError, QuotaLedger, SourceFile, StorageProvider,
};

// ---------------------------------------------------------------------------
// Test backends
// ---------------------------------------------------------------------------

/// Decodes for real but "encodes" every format as a short tag, so the full
/// matrix runs fast in debug builds.
#[derive(Default)]
struct StubBackend {
    /// Held by a test to park decoding until it lets go.
    gate: Option<Arc<StdMutex<()>>>,
    /// Decodes that have reached the gate.
    parked: Arc<AtomicUsize>,
}

impl CodecBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn can_decode(&self, format: ImageFormat) -> bool {
        matches!(format, ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Webp)
    }

    fn can_encode(&self, format: ImageFormat) -> bool {
        matches!(format, ImageFormat::Webp | ImageFormat::Avif | ImageFormat::Jpeg)
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, PipelineError> {
        if let Some(gate) = &self.gate {
            self.parked.fetch_add(1, Ordering::SeqCst);
            let _held = gate.lock().unwrap();
        }
        BasicBackend.decode(bytes)
    }

    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        image.resize_exact(width, height, FilterType::Nearest)
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: ImageFormat,
        _quality: u8,
    ) -> Result<Vec<u8>, PipelineError> {
        Ok(format!("{format}:{}x{}", image.width(), image.height()).into_bytes())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    orchestrator: Arc<BatchOrchestrator>,
    storage: Arc<MemoryStorage>,
    events: Arc<EventBus>,
}

fn harness_with(backend: Arc<dyn CodecBackend>, config: PipelineConfig) -> Harness {
    let db = create_pool();
    let storage = Arc::new(MemoryStorage::new());
    let events = Arc::new(EventBus::default());
    let engine = Arc::new(ConversionEngine::new(
        backend,
        Arc::clone(&storage) as Arc<dyn StorageProvider>,
    ));
    let ledger = Arc::new(QuotaLedger::new(Arc::clone(&db), config.quota.clone()));
    let orchestrator = Arc::new(BatchOrchestrator::new(
        db,
        engine,
        ledger,
        Arc::clone(&events),
        Arc::new(config),
    ));
    Harness {
        orchestrator,
        storage,
        events,
    }
}

fn harness() -> Harness {
    harness_with(Arc::new(StubBackend::default()), PipelineConfig::default())
}

fn anonymous() -> Caller {
    Caller::Anonymous {
        fingerprint: "test-client".to_string(),
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let raster = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(raster)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn file(name: &str, bytes: Vec<u8>) -> SourceFile {
    SourceFile {
        filename: name.to_string(),
        bytes,
    }
}

fn submission(files: Vec<SourceFile>, target: TargetFormat) -> BatchSubmission {
    BatchSubmission {
        files,
        settings: ConversionSettings {
            target_format: target,
            ..Default::default()
        },
        keywords: vec!["hero".to_string()],
    }
}

/// Wait until the batch's background task has finished.
async fn settle(h: &Harness, batch_id: EntityId) -> BatchProgress {
    tokio::time::timeout(Duration::from_secs(180), async {
        while h.orchestrator.is_running(batch_id).await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("batch did not finish in time");
    h.orchestrator.progress(batch_id).await.unwrap()
}

// ---------------------------------------------------------------------------
// Variant matrix scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wide_source_gets_every_breakpoint_in_both_formats() {
    let h = harness();
    let submitted = h
        .orchestrator
        .submit(anonymous(), submission(vec![file("hero.png", png(2000, 1500))], TargetFormat::Both))
        .await
        .unwrap();
    let progress = settle(&h, submitted.batch.id).await;
    assert_eq!(progress.batch.status, BatchStatus::Completed);
    assert_eq!(progress.batch.processed_images, 1);

    let image_id = submitted.images[0].id;
    let details = h.orchestrator.image_details(image_id).await.unwrap();
    assert_eq!(details.status, ImageStatus::Completed);
    assert_eq!(details.variants.len(), 10);

    let converted = details.converted.unwrap();
    assert_eq!(converted.format, ImageFormat::Webp);
    assert_eq!((converted.width, converted.height), (Some(2000), Some(1500)));
    assert_eq!(details.converted_alternates.len(), 1);
    assert_eq!(details.converted_alternates[0].format, ImageFormat::Avif);

    let signature = details.signature.unwrap();
    assert_eq!(signature.aspect_ratio.as_deref(), Some("4:3"));
    assert!(!signature.has_transparency);
}

#[tokio::test]
async fn medium_source_skips_breakpoints_at_or_above_its_width() {
    let h = harness();
    let submitted = h
        .orchestrator
        .submit(anonymous(), submission(vec![file("a.png", png(1000, 750))], TargetFormat::Both))
        .await
        .unwrap();
    settle(&h, submitted.batch.id).await;

    let details = h.orchestrator.image_details(submitted.images[0].id).await.unwrap();
    assert_eq!(details.variants.len(), 6);
    assert!(details.variants.iter().all(|v| v.breakpoint_width < 1000));

    let medium = details
        .variants
        .iter()
        .find(|v| v.size_name == "medium" && v.format == ImageFormat::Avif)
        .unwrap();
    assert_eq!((medium.width, medium.height), (768, 576));
}

#[tokio::test]
async fn srcset_is_ascending_and_ends_with_primary() {
    let h = harness();
    let submitted = h
        .orchestrator
        .submit(anonymous(), submission(vec![file("a.png", png(1000, 750))], TargetFormat::Webp))
        .await
        .unwrap();
    settle(&h, submitted.batch.id).await;
    let image_id = submitted.images[0].id;

    let view = h.orchestrator.srcset(image_id, ImageFormat::Webp).await.unwrap();
    let widths: Vec<u32> = view.entries.iter().map(|e| e.width).collect();
    assert_eq!(widths, vec![320, 640, 768, 1000]);
    assert_eq!(
        view.entries.last().unwrap().url,
        format!("/media/converted/{image_id}.webp")
    );
    assert!(view.srcset.ends_with(" 1000w"));

    // No AVIF asset was requested for this batch.
    assert_matches!(
        h.orchestrator.srcset(image_id, ImageFormat::Avif).await,
        Err(PipelineError::Core(_))
    );
}

#[tokio::test]
async fn bounded_settings_shrink_the_effective_width() {
    let h = harness();
    let mut sub = submission(vec![file("a.png", png(1600, 1200))], TargetFormat::Webp);
    sub.settings.max_width = Some(700);
    let submitted = h.orchestrator.submit(anonymous(), sub).await.unwrap();
    settle(&h, submitted.batch.id).await;

    let details = h.orchestrator.image_details(submitted.images[0].id).await.unwrap();
    let converted = details.converted.unwrap();
    assert_eq!((converted.width, converted.height), (Some(700), Some(525)));
    let widths: Vec<u32> = details.variants.iter().map(|v| v.breakpoint_width).collect();
    assert_eq!(widths, vec![320, 640]);
}

// ---------------------------------------------------------------------------
// Regeneration and invalidation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn regeneration_updates_in_place() {
    let h = harness();
    let submitted = h
        .orchestrator
        .submit(anonymous(), submission(vec![file("a.png", png(1000, 750))], TargetFormat::Both))
        .await
        .unwrap();
    settle(&h, submitted.batch.id).await;
    let image_id = submitted.images[0].id;
    let files_before = h.storage.len().await;

    let outcome = h.orchestrator.regenerate_variants(image_id).await.unwrap();
    assert_eq!(outcome.created, 0);
    assert_eq!(outcome.updated, 6);
    assert!(outcome.failures.is_empty());

    let details = h.orchestrator.image_details(image_id).await.unwrap();
    assert_eq!(details.variants.len(), 6);
    assert_eq!(h.storage.len().await, files_before);
}

#[tokio::test]
async fn invalidation_removes_rows_and_files_as_a_set() {
    let h = harness();
    let submitted = h
        .orchestrator
        .submit(anonymous(), submission(vec![file("a.png", png(1000, 750))], TargetFormat::Webp))
        .await
        .unwrap();
    settle(&h, submitted.batch.id).await;
    let image_id = submitted.images[0].id;

    assert_eq!(h.orchestrator.invalidate_variants(image_id).await.unwrap(), 3);
    let details = h.orchestrator.image_details(image_id).await.unwrap();
    assert!(details.variants.is_empty());
    assert!(!h
        .storage
        .paths()
        .await
        .iter()
        .any(|p| p.starts_with("variants/")));

    // The score drops once the responsive variants are gone.
    let report = h.orchestrator.score(image_id).await.unwrap();
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.code == "no_responsive_variants"));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn corrupt_upload_fails_alone() {
    let h = harness();
    let mut truncated = png(200, 200);
    truncated.truncate(64);

    let submitted = h
        .orchestrator
        .submit(
            anonymous(),
            submission(
                vec![file("good.png", png(400, 300)), file("bad.png", truncated)],
                TargetFormat::Webp,
            ),
        )
        .await
        .unwrap();
    let progress = settle(&h, submitted.batch.id).await;

    assert_eq!(progress.batch.status, BatchStatus::Completed);
    assert_eq!(progress.batch.processed_images, 2);
    assert_eq!(progress.counts.completed, 1);
    assert_eq!(progress.counts.failed, 1);

    let bad = &progress.images[1];
    assert_eq!(bad.filename, "bad.png");
    assert_eq!(bad.status, ImageStatus::Failed);
    assert!(bad.error_message.as_deref().unwrap().contains("unreadable"));

    // Only the completed image is charged.
    let status = h.orchestrator.ledger().status(&anonymous()).await.unwrap();
    assert_matches!(status, QuotaStatus::Anonymous { used: 1, remaining: 9, .. });
}

#[tokio::test]
async fn unsupported_target_reports_a_fallback() {
    let h = harness_with(Arc::new(BasicBackend), PipelineConfig::default());
    let mut events = h.events.subscribe();
    let submitted = h
        .orchestrator
        .submit(anonymous(), submission(vec![file("a.png", png(64, 64))], TargetFormat::Avif))
        .await
        .unwrap();
    let progress = settle(&h, submitted.batch.id).await;
    assert_eq!(progress.batch.status, BatchStatus::Failed);

    let failed = loop {
        let event = events.recv().await.unwrap();
        if event.event_type == event_types::IMAGE_FAILED {
            break event;
        }
    };
    assert_eq!(failed.payload["fallback_format"], "webp");
    assert_eq!(failed.payload["retryable"], false);
}

#[tokio::test]
async fn quota_denial_creates_nothing() {
    let mut config = PipelineConfig::default();
    config.quota.anonymous_daily_limit = 2;
    let h = harness_with(Arc::new(StubBackend::default()), config);

    let result = h
        .orchestrator
        .submit(
            anonymous(),
            submission(
                vec![
                    file("a.png", png(8, 8)),
                    file("b.png", png(8, 8)),
                    file("c.png", png(8, 8)),
                ],
                TargetFormat::Webp,
            ),
        )
        .await;
    assert_matches!(
        result,
        Err(PipelineError::QuotaExceeded {
            requested: 3,
            remaining: 2
        })
    );
    assert!(h.storage.is_empty().await);
}

#[tokio::test]
async fn unrecognised_upload_is_rejected_before_quota() {
    let h = harness();
    let result = h
        .orchestrator
        .submit(
            anonymous(),
            submission(vec![file("notes.txt", b"hello".to_vec())], TargetFormat::Webp),
        )
        .await;
    assert_matches!(result, Err(PipelineError::Core(_)));

    let status = h.orchestrator.ledger().status(&anonymous()).await.unwrap();
    assert_matches!(status, QuotaStatus::Anonymous { used: 0, remaining: 10, .. });
}

// ---------------------------------------------------------------------------
// Cancellation and events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancelled_images_settle_as_failed_and_release_quota() {
    let gate = Arc::new(StdMutex::new(()));
    let parked = Arc::new(AtomicUsize::new(0));
    let backend = StubBackend {
        gate: Some(Arc::clone(&gate)),
        parked: Arc::clone(&parked),
    };
    let config = PipelineConfig {
        max_concurrent_images: 1,
        ..Default::default()
    };
    let h = harness_with(Arc::new(backend), config);

    let held = gate.lock().unwrap();
    let submitted = h
        .orchestrator
        .submit(
            anonymous(),
            submission(
                vec![
                    file("a.png", png(32, 24)),
                    file("b.png", png(32, 24)),
                    file("c.png", png(32, 24)),
                ],
                TargetFormat::Webp,
            ),
        )
        .await
        .unwrap();
    let first_id = submitted.images[0].id;

    // Cancel only once the first image is mid-decode.
    tokio::time::timeout(Duration::from_secs(30), async {
        while parked.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("first image never started decoding");
    let first = h.orchestrator.image_details(first_id).await.unwrap();
    assert_eq!(first.status, ImageStatus::Processing);

    assert!(h.orchestrator.cancel(submitted.batch.id).await.unwrap());
    drop(held);

    let progress = settle(&h, submitted.batch.id).await;
    assert_eq!(progress.batch.status, BatchStatus::Failed);
    assert_eq!(progress.batch.processed_images, 3);
    for image in &progress.images {
        assert_eq!(image.status, ImageStatus::Failed);
        assert_eq!(image.error_message.as_deref(), Some(CANCELLED_REASON));
    }

    // The decode already running finished and was recorded; the image then
    // stopped at the next stage boundary.
    let first = h.orchestrator.image_details(first_id).await.unwrap();
    assert_eq!((first.original.width, first.original.height), (Some(32), Some(24)));
    assert!(first.converted.is_none());
    assert!(first.variants.is_empty());

    // Later images never started a stage.
    let last = h.orchestrator.image_details(submitted.images[2].id).await.unwrap();
    assert_eq!(last.original.width, None);
    assert_eq!(parked.load(Ordering::SeqCst), 1);

    // A finished batch has nothing left to cancel.
    assert!(!h.orchestrator.cancel(submitted.batch.id).await.unwrap());

    let status = h.orchestrator.ledger().status(&anonymous()).await.unwrap();
    assert_matches!(status, QuotaStatus::Anonymous { used: 0, remaining: 10, .. });
}

#[tokio::test]
async fn lifecycle_events_are_published() {
    let h = harness();
    let mut events = h.events.subscribe();
    let submitted = h
        .orchestrator
        .submit(anonymous(), submission(vec![file("a.png", png(64, 48))], TargetFormat::Webp))
        .await
        .unwrap();
    h.orchestrator.drain().await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event.event_type);
    }
    assert_eq!(
        seen,
        vec![
            event_types::IMAGE_PROCESSING.to_string(),
            event_types::IMAGE_COMPLETED.to_string(),
            event_types::BATCH_COMPLETED.to_string(),
        ]
    );
    let progress = h.orchestrator.progress(submitted.batch.id).await.unwrap();
    assert_eq!(progress.batch.status, BatchStatus::Completed);
}

#[tokio::test]
async fn local_storage_holds_every_derived_file() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_pool();
    let storage: Arc<dyn StorageProvider> = Arc::new(LocalStorage::new(dir.path()));
    let config = Arc::new(PipelineConfig::default());
    let orchestrator = Arc::new(BatchOrchestrator::new(
        Arc::clone(&db),
        Arc::new(ConversionEngine::new(Arc::new(BasicBackend), storage)),
        Arc::new(QuotaLedger::new(Arc::clone(&db), config.quota.clone())),
        Arc::new(EventBus::default()),
        config,
    ));

    let submitted = orchestrator
        .submit(anonymous(), submission(vec![file("a.png", png(700, 350))], TargetFormat::Webp))
        .await
        .unwrap();
    orchestrator.drain().await;

    let image_id = submitted.images[0].id;
    assert!(dir.path().join(format!("converted/{image_id}.webp")).is_file());
    assert!(dir.path().join(format!("variants/{image_id}/thumbnail.webp")).is_file());
    assert!(dir.path().join(format!("variants/{image_id}/small.webp")).is_file());
    assert!(!dir.path().join(format!("variants/{image_id}/medium.webp")).exists());
}
