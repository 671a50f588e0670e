//! Handlers for the `/batches` resource.
//!
//! A batch is submitted as `multipart/form-data`: one or more `files` parts
//! plus optional text parts for the conversion settings. Processing happens
//! in the background; clients poll the progress endpoint.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use webopt_core::formats::TargetFormat;
use webopt_core::lifecycle::BatchStatus;
use webopt_core::quota::Tier;
use webopt_core::settings::ConversionSettings;
use webopt_core::types::EntityId;
use webopt_pipeline::orchestrator::BatchProgress;
use webopt_pipeline::{BatchSubmission, SourceFile};

use crate::error::{AppError, AppResult};
use crate::middleware::caller::ResolvedCaller;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SubmittedImage {
    pub id: EntityId,
    pub filename: String,
}

/// Response body for an accepted batch.
#[derive(Debug, Serialize)]
pub struct SubmitBatchResponse {
    pub batch_id: EntityId,
    pub status: BatchStatus,
    pub total_images: u32,
    pub images: Vec<SubmittedImage>,
    pub tier: Tier,
    /// Units left after this batch; `null` for unlimited tiers.
    pub remaining: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CancelBatchResponse {
    pub batch_id: EntityId,
    /// `false` when the batch had already finished.
    pub cancelled: bool,
}

/// POST /api/v1/batches
///
/// Multipart fields:
///
/// - `files` (repeatable; `files[]` also accepted): the images.
/// - `format`: `webp`, `avif` or `both` (default `webp`).
/// - `quality`: 1-100.
/// - `max_width`, `max_height`: optional bounding box.
/// - `maintain_aspect_ratio`: `true`/`false` (default `true`).
/// - `keywords`: comma-separated list or JSON array of strings.
pub async fn submit(
    State(state): State<AppState>,
    ResolvedCaller(caller): ResolvedCaller,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<SubmitBatchResponse>>)> {
    let mut files = Vec::new();
    let mut settings = state.orchestrator.config().default_settings.clone();
    let mut keywords = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" | "files[]" | "file" => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("upload-{}", files.len() + 1));
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read '{filename}': {e}")))?;
                files.push(SourceFile {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            other => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                apply_setting(&mut settings, &mut keywords, other, value.trim())?;
            }
        }
    }

    let submitted = state
        .orchestrator
        .submit(
            caller,
            BatchSubmission {
                files,
                settings,
                keywords,
            },
        )
        .await?;

    let response = SubmitBatchResponse {
        batch_id: submitted.batch.id,
        status: submitted.batch.status,
        total_images: submitted.batch.total_images,
        images: submitted
            .images
            .into_iter()
            .map(|img| SubmittedImage {
                id: img.id,
                filename: img.original_filename,
            })
            .collect(),
        tier: submitted.authorization.tier,
        remaining: submitted.authorization.remaining,
    };
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: response })))
}

/// GET /api/v1/batches/{id}
pub async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> AppResult<Json<DataResponse<BatchProgress>>> {
    let progress = state.orchestrator.progress(id).await?;
    Ok(Json(DataResponse { data: progress }))
}

/// POST /api/v1/batches/{id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> AppResult<Json<DataResponse<CancelBatchResponse>>> {
    let cancelled = state.orchestrator.cancel(id).await?;
    Ok(Json(DataResponse {
        data: CancelBatchResponse {
            batch_id: id,
            cancelled,
        },
    }))
}

// ---------------------------------------------------------------------------
// Form parsing
// ---------------------------------------------------------------------------

fn apply_setting(
    settings: &mut ConversionSettings,
    keywords: &mut Vec<String>,
    name: &str,
    value: &str,
) -> AppResult<()> {
    match name {
        "format" | "target_format" => {
            settings.target_format = TargetFormat::from_name(value)?;
        }
        "quality" => settings.quality = parse_number(name, value)?,
        "max_width" => settings.max_width = parse_optional(name, value)?,
        "max_height" => settings.max_height = parse_optional(name, value)?,
        "maintain_aspect_ratio" => settings.maintain_aspect_ratio = parse_bool(name, value)?,
        "keywords" => *keywords = parse_keywords(value)?,
        other => tracing::debug!(field = %other, "Ignoring unknown multipart field"),
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> AppResult<T> {
    value
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Field '{name}' must be a number, got '{value}'")))
}

fn parse_optional(name: &str, value: &str) -> AppResult<Option<u32>> {
    if value.is_empty() {
        Ok(None)
    } else {
        parse_number(name, value).map(Some)
    }
}

fn parse_bool(name: &str, value: &str) -> AppResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(AppError::BadRequest(format!(
            "Field '{name}' must be a boolean, got '{value}'"
        ))),
    }
}

/// Accept either a JSON array of strings or a comma-separated list.
fn parse_keywords(value: &str) -> AppResult<Vec<String>> {
    let raw: Vec<String> = if value.starts_with('[') {
        serde_json::from_str(value)
            .map_err(|e| AppError::BadRequest(format!("Invalid keywords JSON: {e}")))?
    } else {
        value.split(',').map(str::to_string).collect()
    };
    Ok(raw
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect())
}
