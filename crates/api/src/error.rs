use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use webopt_core::error::CoreError;
use webopt_pipeline::PipelineError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`PipelineError`] and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `webopt_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A failure raised by the optimization pipeline.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

fn internal(msg: &str, context: &'static str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %msg, "{context}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core(core: &CoreError) -> (StatusCode, &'static str, String) {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        CoreError::QuotaExceeded(msg) => {
            (StatusCode::TOO_MANY_REQUESTS, "QUOTA_EXCEEDED", msg.clone())
        }
        CoreError::Internal(msg) => internal(msg, "Internal core error"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut extra = serde_json::Map::new();

        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) | AppError::Pipeline(PipelineError::Core(core)) => {
                classify_core(core)
            }

            // --- Pipeline failures ---
            AppError::Pipeline(err) => match err {
                PipelineError::QuotaExceeded {
                    requested,
                    remaining,
                } => {
                    extra.insert("requested".into(), json!(requested));
                    extra.insert("remaining".into(), json!(remaining));
                    (
                        StatusCode::TOO_MANY_REQUESTS,
                        "QUOTA_EXCEEDED",
                        err.to_string(),
                    )
                }
                PipelineError::UnsupportedFormat { fallback, .. } => {
                    extra.insert("fallback_format".into(), json!(fallback));
                    (
                        StatusCode::UNSUPPORTED_MEDIA_TYPE,
                        "UNSUPPORTED_FORMAT",
                        err.to_string(),
                    )
                }
                PipelineError::SourceUnreadable(_) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "SOURCE_UNREADABLE",
                    err.to_string(),
                ),
                PipelineError::Storage(msg) => {
                    tracing::error!(error = %msg, "Storage failure");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "STORAGE_UNAVAILABLE",
                        "Storage is temporarily unavailable".to_string(),
                    )
                }
                PipelineError::Cancelled => (StatusCode::CONFLICT, "CANCELLED", err.to_string()),
                PipelineError::Core(core) => classify_core(core),
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg, "Internal error"),
        };

        let mut body = serde_json::Map::new();
        body.insert("error".into(), json!(message));
        body.insert("code".into(), json!(code));
        body.extend(extra);

        (status, axum::Json(serde_json::Value::Object(body))).into_response()
    }
}
