//! Integration tests for the repository layer.
//!
//! - Batch + image creation is all-or-nothing
//! - Lifecycle transitions and aggregate refresh
//! - Variant upsert idempotency and set deletion
//! - Atomic quota reservation
//! - Account lookup by API key digest

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use webopt_core::error::CoreError;
use webopt_core::formats::ImageFormat;
use webopt_core::lifecycle::{BatchStatus, ImageStatus};
use webopt_core::settings::ConversionSettings;
use webopt_core::types::{new_id, EntityId};
use webopt_core::variants::VariantKey;
use webopt_db::models::batch::CreateBatch;
use webopt_db::models::image::{AssetDescriptor, CreateImage};
use webopt_db::models::usage::CreateQuotaAccount;
use webopt_db::models::variant::UpsertVariant;
use webopt_db::repositories::{AccountRepo, BatchRepo, ImageRepo, UsageRepo, VariantRepo};
use webopt_db::{create_pool, Database};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_image(batch_id: EntityId, position: u32) -> CreateImage {
    let id = new_id();
    CreateImage {
        id,
        batch_id,
        position,
        original_filename: format!("photo-{position}.jpg"),
        original: AssetDescriptor {
            path: format!("originals/{batch_id}/{id}.jpg"),
            byte_size: 1024,
            format: ImageFormat::Jpeg,
            width: None,
            height: None,
        },
    }
}

async fn seed_batch(db: &Database, count: u32) -> (EntityId, Vec<EntityId>) {
    let batch_id = new_id();
    let images = (0..count).map(|i| new_image(batch_id, i)).collect();
    let (batch, images) = BatchRepo::create_with_images(
        db,
        CreateBatch {
            id: batch_id,
            settings: ConversionSettings::default(),
            keywords: vec!["sunset".into()],
        },
        images,
    )
    .await
    .unwrap();
    (batch.id, images.into_iter().map(|i| i.id).collect())
}

fn upsert(image_id: EntityId, size: &str, width: u32, byte_size: u64) -> UpsertVariant {
    let key = VariantKey::new(image_id, size, ImageFormat::Webp);
    UpsertVariant {
        path: format!("variants/{image_id}/{size}.webp"),
        key,
        breakpoint_width: width,
        width,
        height: width / 2,
        byte_size,
    }
}

// ---------------------------------------------------------------------------
// Batches and images
// ---------------------------------------------------------------------------

#[tokio::test]
async fn batch_created_with_images_in_pending() {
    let db = create_pool();
    let (batch_id, image_ids) = seed_batch(&db, 3).await;

    let batch = BatchRepo::find_by_id(&db, batch_id).await.unwrap();
    assert_eq!(batch.status, BatchStatus::Pending);
    assert_eq!(batch.total_images, 3);
    assert_eq!(batch.processed_images, 0);

    let images = ImageRepo::list_by_batch(&db, batch_id).await;
    let listed: Vec<EntityId> = images.iter().map(|i| i.id).collect();
    assert_eq!(listed, image_ids);
    assert!(images.iter().all(|i| i.status == ImageStatus::Pending));
}

#[tokio::test]
async fn mismatched_image_batch_creates_nothing() {
    let db = create_pool();
    let batch_id = new_id();
    let stray = new_image(new_id(), 0);
    let result = BatchRepo::create_with_images(
        &db,
        CreateBatch {
            id: batch_id,
            settings: ConversionSettings::default(),
            keywords: vec![],
        },
        vec![new_image(batch_id, 0), stray],
    )
    .await;

    assert_matches!(result, Err(CoreError::Validation(_)));
    assert!(BatchRepo::find_by_id(&db, batch_id).await.is_none());
    assert!(ImageRepo::list_by_batch(&db, batch_id).await.is_empty());
}

#[tokio::test]
async fn transition_cannot_skip_processing() {
    let db = create_pool();
    let (_, ids) = seed_batch(&db, 1).await;

    let result = ImageRepo::transition(&db, ids[0], ImageStatus::Completed, None).await;
    assert_matches!(result, Err(CoreError::Conflict(_)));

    ImageRepo::transition(&db, ids[0], ImageStatus::Processing, None)
        .await
        .unwrap();
    let image = ImageRepo::transition(&db, ids[0], ImageStatus::Failed, Some("boom".into()))
        .await
        .unwrap();
    assert_eq!(image.error_message.as_deref(), Some("boom"));

    // Terminal states never change.
    let result = ImageRepo::transition(&db, ids[0], ImageStatus::Processing, None).await;
    assert_matches!(result, Err(CoreError::Conflict(_)));
}

#[tokio::test]
async fn refresh_tracks_partial_success() {
    let db = create_pool();
    let (batch_id, ids) = seed_batch(&db, 2).await;

    for id in &ids {
        ImageRepo::transition(&db, *id, ImageStatus::Processing, None)
            .await
            .unwrap();
    }
    let batch = BatchRepo::refresh(&db, batch_id, false).await.unwrap();
    assert_eq!(batch.status, BatchStatus::Processing);

    ImageRepo::transition(&db, ids[0], ImageStatus::Failed, Some("corrupt".into()))
        .await
        .unwrap();
    let batch = BatchRepo::refresh(&db, batch_id, true).await.unwrap();
    assert_eq!(batch.processed_images, 1);
    assert_eq!(batch.status, BatchStatus::Processing);

    ImageRepo::transition(&db, ids[1], ImageStatus::Completed, None)
        .await
        .unwrap();
    let batch = BatchRepo::refresh(&db, batch_id, true).await.unwrap();
    assert_eq!(batch.processed_images, 2);
    assert_eq!(batch.status, BatchStatus::Completed);
}

#[tokio::test]
async fn blank_alt_text_clears() {
    let db = create_pool();
    let (_, ids) = seed_batch(&db, 1).await;

    let image = ImageRepo::set_alt_text(&db, ids[0], Some("  A red door ".into()))
        .await
        .unwrap();
    assert_eq!(image.alt_text.as_deref(), Some("A red door"));

    let image = ImageRepo::set_alt_text(&db, ids[0], Some("   ".into()))
        .await
        .unwrap();
    assert!(image.alt_text.is_none());
}

#[tokio::test]
async fn unknown_image_is_not_found() {
    let db = create_pool();
    let result = ImageRepo::set_alt_text(&db, new_id(), None).await;
    assert_matches!(result, Err(CoreError::NotFound { entity: "Image", .. }));
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upsert_updates_in_place() {
    let db = create_pool();
    let image_id = new_id();

    let (first, created) = VariantRepo::upsert(&db, upsert(image_id, "small", 640, 100)).await;
    assert!(created);
    let (second, created) = VariantRepo::upsert(&db, upsert(image_id, "small", 640, 80)).await;
    assert!(!created);

    assert_eq!(first.id, second.id);
    assert_eq!(second.byte_size, 80);
    assert_eq!(VariantRepo::count_by_image(&db, image_id).await, 1);
}

#[tokio::test]
async fn list_is_scoped_to_image_and_ordered() {
    let db = create_pool();
    let image_a = new_id();
    let image_b = new_id();

    VariantRepo::upsert(&db, upsert(image_a, "medium", 768, 1)).await;
    VariantRepo::upsert(&db, upsert(image_a, "thumbnail", 320, 1)).await;
    VariantRepo::upsert(&db, upsert(image_b, "small", 640, 1)).await;

    let widths: Vec<u32> = VariantRepo::list_by_image(&db, image_a)
        .await
        .iter()
        .map(|v| v.breakpoint_width)
        .collect();
    assert_eq!(widths, vec![320, 768]);
}

#[tokio::test]
async fn delete_by_image_removes_the_whole_set() {
    let db = create_pool();
    let image_a = new_id();
    let image_b = new_id();
    VariantRepo::upsert(&db, upsert(image_a, "thumbnail", 320, 1)).await;
    VariantRepo::upsert(&db, upsert(image_a, "small", 640, 1)).await;
    VariantRepo::upsert(&db, upsert(image_b, "small", 640, 1)).await;

    let removed = VariantRepo::delete_by_image(&db, image_a).await;
    assert_eq!(removed.len(), 2);
    assert_eq!(VariantRepo::count_by_image(&db, image_a).await, 0);
    assert_eq!(VariantRepo::count_by_image(&db, image_b).await, 1);
}

// ---------------------------------------------------------------------------
// Usage
// ---------------------------------------------------------------------------

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()
}

#[tokio::test]
async fn anonymous_reserve_denies_past_ceiling() {
    let db = create_pool();
    let ok = UsageRepo::try_reserve_anonymous(&db, "fp", day(), 3, 2).await;
    assert!(ok.allowed);
    assert_eq!(ok.remaining, 1);

    let denied = UsageRepo::try_reserve_anonymous(&db, "fp", day(), 3, 2).await;
    assert!(!denied.allowed);
    assert_eq!(denied.remaining, 1);

    UsageRepo::commit_anonymous(&db, "fp", day(), 3, 2).await;
    let record = UsageRepo::anonymous_usage(&db, "fp", day()).await.unwrap();
    assert_eq!((record.used, record.reserved), (2, 0));
}

#[tokio::test]
async fn released_units_become_available_again() {
    let db = create_pool();
    UsageRepo::try_reserve_anonymous(&db, "fp", day(), 2, 2).await;
    UsageRepo::release_anonymous(&db, "fp", day(), 1).await;
    let outcome = UsageRepo::try_reserve_anonymous(&db, "fp", day(), 2, 1).await;
    assert!(outcome.allowed);
    assert_eq!(outcome.remaining, 0);
}

#[tokio::test]
async fn windows_are_never_merged() {
    let db = create_pool();
    UsageRepo::try_reserve_anonymous(&db, "fp", day(), 1, 1).await;
    let next_day = day().succ_opt().unwrap();
    let outcome = UsageRepo::try_reserve_anonymous(&db, "fp", next_day, 1, 1).await;
    assert!(outcome.allowed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reservations_grant_the_last_unit_once() {
    let db = create_pool();
    UsageRepo::try_reserve_anonymous(&db, "fp", day(), 5, 4).await;

    let start = Arc::new(tokio::sync::Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = Arc::clone(&db);
            let start = Arc::clone(&start);
            tokio::spawn(async move {
                start.wait().await;
                UsageRepo::try_reserve_anonymous(&db, "fp", day(), 5, 1)
                    .await
                    .allowed
            })
        })
        .collect();

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            granted += 1;
        }
    }
    assert_eq!(granted, 1);

    let record = UsageRepo::anonymous_usage(&db, "fp", day()).await.unwrap();
    assert_eq!(record.reserved, 5);
}

#[tokio::test]
async fn account_commit_tracks_overage() {
    let db = create_pool();
    let account = new_id();
    assert_eq!(UsageRepo::commit_account(&db, account, 0, 10, 8).await, 0);
    assert_eq!(UsageRepo::commit_account(&db, account, 0, 10, 5).await, 3);

    let usage = UsageRepo::account_usage(&db, account, 0).await.unwrap();
    assert_eq!((usage.used, usage.overage_units), (13, 3));
    assert!(UsageRepo::account_usage(&db, account, 1).await.is_none());
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

fn account(name: &str, key_hash: &str) -> CreateQuotaAccount {
    CreateQuotaAccount {
        id: None,
        name: name.to_string(),
        plan: "starter".to_string(),
        monthly_limit: 500,
        overage_rate_cents: 2,
        api_key_hashes: vec![key_hash.to_string()],
        created_at: None,
    }
}

#[tokio::test]
async fn account_found_by_key_digest() {
    let db = create_pool();
    let created = AccountRepo::create(&db, account("acme", "abc123")).await.unwrap();
    let found = AccountRepo::find_by_api_key_hash(&db, "abc123").await.unwrap();
    assert_eq!(found.id, created.id);
    assert!(AccountRepo::find_by_api_key_hash(&db, "zzz").await.is_none());
    assert_eq!(AccountRepo::list(&db).await.len(), 1);
}

#[tokio::test]
async fn duplicate_key_digest_rejected() {
    let db = create_pool();
    AccountRepo::create(&db, account("acme", "abc123")).await.unwrap();
    let result = AccountRepo::create(&db, account("other", "abc123")).await;
    assert_matches!(result, Err(CoreError::Conflict(_)));
}
