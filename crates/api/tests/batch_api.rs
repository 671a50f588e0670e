//! Integration tests for batch submission and the image read surface.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, png_bytes, submit_as, MultipartBody, TestApp};
use uuid::Uuid;

/// Submit one 1200x900 PNG as WebP and wait for it to finish.
async fn completed_image(app: &TestApp) -> (Uuid, Uuid) {
    let body = MultipartBody::new()
        .text("format", "webp")
        .text("quality", "75")
        .text("keywords", "hero, banner")
        .file("hero.png", &png_bytes(1200, 900));
    let response = submit_as(app, "203.0.113.10", body).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = body_json(response).await;
    let batch_id: Uuid = json["data"]["batch_id"].as_str().unwrap().parse().unwrap();
    let image_id: Uuid = json["data"]["images"][0]["id"].as_str().unwrap().parse().unwrap();
    app.settle(batch_id).await;
    (batch_id, image_id)
}

// ---------------------------------------------------------------------------
// Test: Submission is accepted and reports the reservation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_returns_accepted_with_batch_summary() {
    let app = common::build_test_app();
    let body = MultipartBody::new()
        .file("a.png", &png_bytes(400, 300))
        .file("b.png", &png_bytes(300, 400));

    let response = submit_as(&app, "203.0.113.1", body).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["total_images"], 2);
    assert_eq!(data["tier"], "anonymous");
    assert_eq!(data["remaining"], 8);
    assert_eq!(data["images"][0]["filename"], "a.png");
    assert_eq!(data["images"][1]["filename"], "b.png");

    let batch_id: Uuid = data["batch_id"].as_str().unwrap().parse().unwrap();
    app.settle(batch_id).await;
}

// ---------------------------------------------------------------------------
// Test: Progress reaches completed with per-image status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn batch_progress_reports_completion() {
    let app = common::build_test_app();
    let (batch_id, image_id) = completed_image(&app).await;

    let response = app.get(&format!("/api/v1/batches/{batch_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["id"], batch_id.to_string());
    assert_eq!(data["status"], "completed");
    assert_eq!(data["processed_images"], 1);
    assert_eq!(data["keywords"], serde_json::json!(["hero", "banner"]));
    assert_eq!(data["counts"]["completed"], 1);
    assert_eq!(data["images"][0]["id"], image_id.to_string());
    assert_eq!(data["images"][0]["status"], "completed");
}

// ---------------------------------------------------------------------------
// Test: Image details expose converted asset, variants and signature
// ---------------------------------------------------------------------------

#[tokio::test]
async fn image_details_include_derived_assets() {
    let app = common::build_test_app();
    let (_, image_id) = completed_image(&app).await;

    let json = body_json(app.get(&format!("/api/v1/images/{image_id}")).await).await;
    let data = &json["data"];

    assert_eq!(data["status"], "completed");
    assert_eq!(data["original"]["format"], "png");
    assert_eq!(data["converted"]["format"], "webp");
    assert_eq!(data["converted"]["width"], 1200);
    assert!(data["converted"]["url"]
        .as_str()
        .unwrap()
        .starts_with("/media/converted/"));

    // 320, 640, 768 and 1024 are all narrower than 1200; 1280 is not.
    let sizes: Vec<&str> = data["variants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["size_name"].as_str().unwrap())
        .collect();
    assert_eq!(sizes.len(), 4);
    assert!(!sizes.contains(&"xlarge"));

    assert_eq!(data["signature"]["aspect_ratio"], "4:3");
    assert!(data["signature"]["lqip"]
        .as_str()
        .unwrap()
        .starts_with("data:image/"));
}

// ---------------------------------------------------------------------------
// Test: srcset lists variants plus the converted asset
// ---------------------------------------------------------------------------

#[tokio::test]
async fn srcset_lists_ascending_widths() {
    let app = common::build_test_app();
    let (_, image_id) = completed_image(&app).await;

    let response = app
        .get(&format!("/api/v1/images/{image_id}/srcset?format=webp"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let srcset = json["data"]["srcset"].as_str().unwrap();
    assert!(srcset.contains("320w"));
    assert!(srcset.ends_with("1200w"));

    // Defaulting to the primary converted format gives the same answer.
    let default = body_json(app.get(&format!("/api/v1/images/{image_id}/srcset")).await).await;
    assert_eq!(default["data"]["srcset"], srcset);

    let avif = app
        .get(&format!("/api/v1/images/{image_id}/srcset?format=avif"))
        .await;
    assert_eq!(avif.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Test: Alt text updates feed the performance score
// ---------------------------------------------------------------------------

#[tokio::test]
async fn alt_text_clears_the_missing_alt_recommendation() {
    let app = common::build_test_app();
    let (_, image_id) = completed_image(&app).await;

    let codes = |json: &serde_json::Value| -> Vec<String> {
        json["data"]["recommendations"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["code"].as_str().unwrap().to_string())
            .collect()
    };

    let before = body_json(app.get(&format!("/api/v1/images/{image_id}/score")).await).await;
    assert!(codes(&before).contains(&"missing_alt_text".to_string()));

    let response = app
        .send(
            Request::builder()
                .method(Method::PATCH)
                .uri(format!("/api/v1/images/{image_id}"))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"alt_text":"  A gradient  "}"#))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["alt_text"], "A gradient");

    let after = body_json(app.get(&format!("/api/v1/images/{image_id}/score")).await).await;
    assert!(!codes(&after).contains(&"missing_alt_text".to_string()));
    assert!(after["data"]["score"].as_u64().unwrap() >= before["data"]["score"].as_u64().unwrap());
}

// ---------------------------------------------------------------------------
// Test: Variant regeneration and invalidation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn regenerate_then_invalidate_variants() {
    let app = common::build_test_app();
    let (_, image_id) = completed_image(&app).await;

    let response = app
        .send(
            Request::post(format!("/api/v1/images/{image_id}/variants/regenerate"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["created"], 0);
    assert_eq!(json["data"]["updated"], 4);
    assert_eq!(json["data"]["failures"], serde_json::json!([]));

    let response = app
        .send(
            Request::delete(format!("/api/v1/images/{image_id}/variants"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["removed"], 4);

    let details = body_json(app.get(&format!("/api/v1/images/{image_id}")).await).await;
    assert_eq!(details["data"]["variants"], serde_json::json!([]));
}

// ---------------------------------------------------------------------------
// Test: Cancelling a finished batch is a no-op
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_after_completion_reports_false() {
    let app = common::build_test_app();
    let (batch_id, _) = completed_image(&app).await;

    let response = app
        .send(
            Request::post(format!("/api/v1/batches/{batch_id}/cancel"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["cancelled"], false);
}

// ---------------------------------------------------------------------------
// Test: Rejected submissions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_submission_is_rejected() {
    let app = common::build_test_app();
    let response = submit_as(&app, "203.0.113.2", MultipartBody::new().text("format", "webp")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn unrecognised_upload_is_rejected() {
    let app = common::build_test_app();
    let body = MultipartBody::new().file("notes.png", b"definitely not an image");
    let response = submit_as(&app, "203.0.113.3", body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_setting_is_rejected() {
    let app = common::build_test_app();
    let body = MultipartBody::new()
        .text("quality", "best")
        .file("a.png", &png_bytes(64, 64));
    let response = submit_as(&app, "203.0.113.4", body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn out_of_range_quality_is_a_validation_error() {
    let app = common::build_test_app();
    let body = MultipartBody::new()
        .text("quality", "0")
        .file("a.png", &png_bytes(64, 64));
    let response = submit_as(&app, "203.0.113.5", body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Test: Unknown ids
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_batch_and_image_return_404() {
    let app = common::build_test_app();
    let id = Uuid::new_v4();

    let batch = app.get(&format!("/api/v1/batches/{id}")).await;
    assert_eq!(batch.status(), StatusCode::NOT_FOUND);

    let image = app.get(&format!("/api/v1/images/{id}")).await;
    assert_eq!(image.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(image).await["code"], "NOT_FOUND");
}
