//! Route definitions for batch endpoints.
//!
//! Mounted at `/batches` within the `/api/v1` tree.
//!
//! ```text
//! POST   /               -> submit (multipart)
//! GET    /{id}           -> get_progress
//! POST   /{id}/cancel    -> cancel
//! ```

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::batch;
use crate::state::AppState;

/// Build the `/batches` router. `body_limit` caps a whole multipart upload.
pub fn router(body_limit: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(batch::submit).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/{id}", get(batch::get_progress))
        .route("/{id}/cancel", post(batch::cancel))
}
