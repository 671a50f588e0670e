//! Route definitions for image endpoints.
//!
//! Mounted at `/images` within the `/api/v1` tree.
//!
//! ```text
//! GET    /{id}                        -> get_by_id
//! PATCH  /{id}                        -> update (alt text)
//! GET    /{id}/srcset                 -> srcset (?format=webp|avif)
//! GET    /{id}/score                  -> score
//! POST   /{id}/variants/regenerate    -> regenerate_variants
//! DELETE /{id}/variants               -> invalidate_variants
//! ```

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::image;
use crate::state::AppState;

/// Build the `/images` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(image::get_by_id).patch(image::update))
        .route("/{id}/srcset", get(image::srcset))
        .route("/{id}/score", get(image::score))
        .route(
            "/{id}/variants/regenerate",
            post(image::regenerate_variants),
        )
        .route("/{id}/variants", delete(image::invalidate_variants))
}
