//! Handlers for the `/images` resource: the derived-asset read surface plus
//! alt text and variant maintenance.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use webopt_core::error::CoreError;
use webopt_core::formats::ImageFormat;
use webopt_core::scoring::PerformanceReport;
use webopt_core::types::EntityId;
use webopt_pipeline::orchestrator::{ImageDetails, SrcsetView};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Longest alt text accepted.
const MAX_ALT_TEXT_LEN: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct UpdateImage {
    /// `null` or blank clears the alt text.
    pub alt_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SrcsetParams {
    /// Defaults to the image's primary converted format.
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VariantFailureView {
    pub size_name: String,
    pub format: ImageFormat,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct RegenerateResponse {
    pub image_id: EntityId,
    pub created: usize,
    pub updated: usize,
    pub failures: Vec<VariantFailureView>,
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub image_id: EntityId,
    pub removed: usize,
}

/// GET /api/v1/images/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> AppResult<Json<DataResponse<ImageDetails>>> {
    let details = state.orchestrator.image_details(id).await?;
    Ok(Json(DataResponse { data: details }))
}

/// PATCH /api/v1/images/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
    Json(input): Json<UpdateImage>,
) -> AppResult<Json<DataResponse<ImageDetails>>> {
    if input
        .alt_text
        .as_ref()
        .is_some_and(|t| t.chars().count() > MAX_ALT_TEXT_LEN)
    {
        return Err(CoreError::Validation(format!(
            "Alt text must be at most {MAX_ALT_TEXT_LEN} characters"
        ))
        .into());
    }
    state.orchestrator.set_alt_text(id, input.alt_text).await?;
    let details = state.orchestrator.image_details(id).await?;
    Ok(Json(DataResponse { data: details }))
}

/// GET /api/v1/images/{id}/srcset?format=webp
pub async fn srcset(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
    Query(params): Query<SrcsetParams>,
) -> AppResult<Json<DataResponse<SrcsetView>>> {
    let format = match params.format.as_deref() {
        Some(name) => ImageFormat::from_name(name)?,
        None => state
            .orchestrator
            .image_details(id)
            .await?
            .converted
            .map(|asset| asset.format)
            .ok_or_else(|| {
                CoreError::Conflict(format!("Image {id} has no converted asset yet"))
            })?,
    };
    let view = state.orchestrator.srcset(id, format).await?;
    Ok(Json(DataResponse { data: view }))
}

/// GET /api/v1/images/{id}/score
pub async fn score(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> AppResult<Json<DataResponse<PerformanceReport>>> {
    let report = state.orchestrator.score(id).await?;
    Ok(Json(DataResponse { data: report }))
}

/// POST /api/v1/images/{id}/variants/regenerate
pub async fn regenerate_variants(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> AppResult<Json<DataResponse<RegenerateResponse>>> {
    let outcome = state.orchestrator.regenerate_variants(id).await?;
    Ok(Json(DataResponse {
        data: RegenerateResponse {
            image_id: id,
            created: outcome.created,
            updated: outcome.updated,
            failures: outcome
                .failures
                .into_iter()
                .map(|f| VariantFailureView {
                    size_name: f.key.size_name,
                    format: f.key.format,
                    error: f.error.to_string(),
                })
                .collect(),
        },
    }))
}

/// DELETE /api/v1/images/{id}/variants
pub async fn invalidate_variants(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> AppResult<Json<DataResponse<InvalidateResponse>>> {
    let removed = state.orchestrator.invalidate_variants(id).await?;
    Ok(Json(DataResponse {
        data: InvalidateResponse {
            image_id: id,
            removed,
        },
    }))
}
