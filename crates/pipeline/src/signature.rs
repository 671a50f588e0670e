//! Visual-signature extraction on the blocking pool.

use std::sync::Arc;

use image::DynamicImage;
use webopt_core::formats::ImageFormat;
use webopt_core::signature::{self, VisualSignature};

use crate::error::PipelineError;

/// Extract every signature field from a decoded source raster.
///
/// `source_format` decides whether transparency is evaluated at all.
pub async fn extract_signature(
    source: Arc<DynamicImage>,
    source_format: ImageFormat,
) -> Result<VisualSignature, PipelineError> {
    let signature = tokio::task::spawn_blocking(move || signature::extract(&source, source_format))
        .await
        .map_err(|e| PipelineError::internal(format!("Signature task failed: {e}")))??;
    Ok(signature)
}
