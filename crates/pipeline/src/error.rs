use webopt_core::error::CoreError;
use webopt_core::formats::ImageFormat;

/// Failures raised while running the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The upload is missing, truncated, or not decodable.
    #[error("Source image unreadable: {0}")]
    SourceUnreadable(String),

    /// The active codec backend cannot produce `format`.
    #[error("Target format '{format}' is not supported by the active codec backend")]
    UnsupportedFormat {
        format: ImageFormat,
        fallback: Option<ImageFormat>,
    },

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Quota exceeded: requested {requested}, remaining {remaining}")]
    QuotaExceeded { requested: u32, remaining: u32 },

    #[error("Cancelled")]
    Cancelled,

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl PipelineError {
    /// Whether re-invoking the same idempotent stage may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Core(CoreError::Internal(message.into()))
    }
}
