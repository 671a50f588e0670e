//! ConversionEngine: resize and re-encode a source raster, then store it.

use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use webopt_core::formats::ImageFormat;
use webopt_core::settings::ConversionSettings;
use webopt_core::types::EntityId;
use webopt_core::variants::converted_path;
use webopt_db::models::image::AssetDescriptor;

use crate::codec::CodecBackend;
use crate::error::PipelineError;
use crate::storage::StorageProvider;

/// Output dimensions for `settings` applied to a `width` x `height` source.
///
/// With aspect ratio maintained the raster is scaled down to fit the bounding
/// box and never upscaled. Without it, the configured bounds are forced
/// exactly and a missing bound keeps the source dimension.
pub fn target_dimensions(width: u32, height: u32, settings: &ConversionSettings) -> (u32, u32) {
    if !settings.has_bounds() || width == 0 || height == 0 {
        return (width, height);
    }
    if !settings.maintain_aspect_ratio {
        return (
            settings.max_width.unwrap_or(width),
            settings.max_height.unwrap_or(height),
        );
    }
    let scale_w = settings
        .max_width
        .map_or(1.0, |max| max as f64 / width as f64);
    let scale_h = settings
        .max_height
        .map_or(1.0, |max| max as f64 / height as f64);
    let scale = scale_w.min(scale_h).min(1.0);
    if scale >= 1.0 {
        return (width, height);
    }
    (
        ((width as f64 * scale).round() as u32).max(1),
        ((height as f64 * scale).round() as u32).max(1),
    )
}

/// An encoded raster ready to be stored.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

pub struct ConversionEngine {
    backend: Arc<dyn CodecBackend>,
    storage: Arc<dyn StorageProvider>,
}

impl ConversionEngine {
    pub fn new(backend: Arc<dyn CodecBackend>, storage: Arc<dyn StorageProvider>) -> Self {
        Self { backend, storage }
    }

    pub fn backend(&self) -> &Arc<dyn CodecBackend> {
        &self.backend
    }

    pub fn storage(&self) -> &Arc<dyn StorageProvider> {
        &self.storage
    }

    /// Apply the resize rules. Returns the input unchanged when no resize is
    /// needed.
    pub fn prepare(&self, source: &DynamicImage, settings: &ConversionSettings) -> DynamicImage {
        let (width, height) = source.dimensions();
        let (target_w, target_h) = target_dimensions(width, height, settings);
        if (target_w, target_h) == (width, height) {
            source.clone()
        } else {
            self.backend.resize(source, target_w, target_h)
        }
    }

    /// Resize to `width` x `height` if needed, then encode. CPU-bound.
    pub fn encode_at(
        &self,
        source: &DynamicImage,
        width: u32,
        height: u32,
        format: ImageFormat,
        quality: u8,
    ) -> Result<EncodedImage, PipelineError> {
        let resized;
        let raster = if source.dimensions() == (width, height) {
            source
        } else {
            resized = self.backend.resize(source, width, height);
            &resized
        };
        let bytes = self.backend.encode(raster, format, quality)?;
        Ok(EncodedImage {
            bytes,
            format,
            width,
            height,
        })
    }

    /// Encode on the blocking pool and atomically store at `path`.
    pub async fn encode_and_store(
        self: &Arc<Self>,
        source: Arc<DynamicImage>,
        width: u32,
        height: u32,
        format: ImageFormat,
        quality: u8,
        path: String,
    ) -> Result<AssetDescriptor, PipelineError> {
        let engine = Arc::clone(self);
        let encoded = tokio::task::spawn_blocking(move || {
            engine.encode_at(&source, width, height, format, quality)
        })
        .await
        .map_err(|e| PipelineError::internal(format!("Encode task failed: {e}")))??;

        self.storage.replace(&path, &encoded.bytes).await?;
        Ok(AssetDescriptor {
            path,
            byte_size: encoded.bytes.len() as u64,
            format,
            width: Some(encoded.width),
            height: Some(encoded.height),
        })
    }

    /// Produce the converted asset(s) for an image.
    ///
    /// `prepared` must already have the resize rules applied. One asset is
    /// produced per target format, primary first; every format is checked
    /// against the backend before anything is encoded.
    pub async fn convert(
        self: &Arc<Self>,
        image_id: EntityId,
        prepared: Arc<DynamicImage>,
        settings: &ConversionSettings,
    ) -> Result<Vec<AssetDescriptor>, PipelineError> {
        let formats = settings.target_format.formats();
        if let Some(format) = formats.iter().find(|f| !self.backend.can_encode(**f)) {
            return Err(PipelineError::UnsupportedFormat {
                format: *format,
                fallback: self.backend.fallback_for(*format),
            });
        }

        let (width, height) = prepared.dimensions();
        let mut assets = Vec::with_capacity(formats.len());
        for format in formats {
            let asset = self
                .encode_and_store(
                    Arc::clone(&prepared),
                    width,
                    height,
                    *format,
                    settings.quality,
                    converted_path(image_id, *format),
                )
                .await?;
            assets.push(asset);
        }
        Ok(assets)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
