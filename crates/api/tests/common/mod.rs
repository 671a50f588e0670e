#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use webopt_api::auth::jwt::JwtConfig;
use webopt_api::config::ServerConfig;
use webopt_api::router::build_app_router;
use webopt_api::state::AppState;
use webopt_core::config::PipelineConfig;
use webopt_events::EventBus;
use webopt_pipeline::codec::BasicBackend;
use webopt_pipeline::{BatchOrchestrator, ConversionEngine, MemoryStorage, QuotaLedger};

pub const BOUNDARY: &str = "webopt-test-boundary";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        storage_root: std::env::temp_dir()
            .join("webopt-api-tests")
            .to_string_lossy()
            .into_owned(),
        codec_backend: webopt_pipeline::BackendPreference::Basic,
        accounts_file: None,
        jwt: JwtConfig {
            secret: "test-secret-do-not-use".to_string(),
            access_token_expiry_mins: 15,
        },
        pipeline: PipelineConfig {
            max_concurrent_images: 2,
            ..PipelineConfig::default()
        },
    }
}

/// A running application plus handles into its internals.
pub struct TestApp {
    pub router: Router,
    pub orchestrator: Arc<BatchOrchestrator>,
    pub config: ServerConfig,
}

impl TestApp {
    pub fn ledger(&self) -> &Arc<QuotaLedger> {
        self.orchestrator.ledger()
    }

    /// Wait until the background run for `batch_id` has finished.
    pub async fn settle(&self, batch_id: Uuid) {
        tokio::time::timeout(Duration::from_secs(120), async {
            while self.orchestrator.is_running(batch_id).await {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("batch did not settle in time");
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }
}

/// Build the full application with the basic codec and in-memory storage.
///
/// Uses the same [`build_app_router`] as `main.rs`, so tests exercise the
/// production middleware stack.
pub fn build_test_app() -> TestApp {
    build_test_app_with(test_config())
}

pub fn build_test_app_with(config: ServerConfig) -> TestApp {
    let pool = webopt_db::create_pool();
    let event_bus = Arc::new(EventBus::default());
    let engine = Arc::new(ConversionEngine::new(
        Arc::new(BasicBackend),
        Arc::new(MemoryStorage::new()),
    ));
    let ledger = Arc::new(QuotaLedger::new(
        Arc::clone(&pool),
        config.pipeline.quota.clone(),
    ));
    let orchestrator = Arc::new(BatchOrchestrator::new(
        pool,
        engine,
        ledger,
        Arc::clone(&event_bus),
        Arc::new(config.pipeline.clone()),
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator: Arc::clone(&orchestrator),
        event_bus,
    };

    TestApp {
        router: build_app_router(state, &config),
        orchestrator,
        config,
    }
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Encode a gradient PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// A `multipart/form-data` body under construction.
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, filename: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; \
                 filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

/// Submit `body` as the given client address and return the response.
pub async fn submit_as(app: &TestApp, address: &str, body: MultipartBody) -> Response<Body> {
    let request = submit_request_with(body, |b| b.header("x-forwarded-for", address));
    app.send(request).await
}

/// Build a submission, letting the caller add headers first.
pub fn submit_request_with(
    body: MultipartBody,
    headers: impl FnOnce(axum::http::request::Builder) -> axum::http::request::Builder,
) -> Request<Body> {
    let builder = headers(
        Request::builder()
            .method(Method::POST)
            .uri("/api/v1/batches")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ),
    );
    builder.body(Body::from(body.finish())).unwrap()
}
