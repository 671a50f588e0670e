pub mod batch;
pub mod health;
pub mod image;
pub mod quota;

use axum::Router;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Multipart framing overhead allowed on top of the raw file bytes.
const MULTIPART_SLACK_BYTES: usize = 1024 * 1024;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /batches                                  submit (multipart)
/// /batches/{id}                             progress
/// /batches/{id}/cancel                      cancel (POST)
///
/// /images/{id}                              details, alt text (PATCH)
/// /images/{id}/srcset                       srcset (?format=)
/// /images/{id}/score                        performance report
/// /images/{id}/variants                     invalidate (DELETE)
/// /images/{id}/variants/regenerate          regenerate (POST)
///
/// /quota                                    caller's quota snapshot
/// ```
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    let body_limit = config
        .pipeline
        .max_upload_bytes
        .saturating_mul(config.pipeline.max_files_per_batch)
        .saturating_add(MULTIPART_SLACK_BYTES);

    Router::new()
        .nest("/batches", batch::router(body_limit))
        .nest("/images", image::router())
        .nest("/quota", quota::router())
}
