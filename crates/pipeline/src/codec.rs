//! Codec backends.
//!
//! The rest of the pipeline depends only on [`CodecBackend`]. Two
//! implementations exist: [`BasicBackend`] covers what the `image` crate can
//! encode on its own, and [`FullBackend`] adds AVIF through `ravif`. The
//! backend is chosen once at startup by [`select_backend`], which probes the
//! full backend with a real encode before trusting it.

use std::io::Cursor;
use std::sync::Arc;

use image::imageops::FilterType;
use image::DynamicImage;
use webopt_core::formats::ImageFormat;

use crate::error::PipelineError;

/// AVIF encoder speed (1 slowest .. 10 fastest).
const AVIF_SPEED: u8 = 8;

/// Formats considered, in order, when suggesting a fallback target.
const FALLBACK_ORDER: &[ImageFormat] = &[ImageFormat::Webp, ImageFormat::Avif, ImageFormat::Jpeg];

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A decoded source raster and the format it was stored in.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    pub format: ImageFormat,
}

/// Capability interface over an imaging library.
pub trait CodecBackend: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn can_decode(&self, format: ImageFormat) -> bool;

    fn can_encode(&self, format: ImageFormat) -> bool;

    /// Decode an upload. Failures are always [`PipelineError::SourceUnreadable`].
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, PipelineError>;

    /// Resize to exactly `width` x `height`.
    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage;

    /// Encode at `quality` (1-100). Formats this backend cannot produce fail
    /// with [`PipelineError::UnsupportedFormat`].
    fn encode(
        &self,
        image: &DynamicImage,
        format: ImageFormat,
        quality: u8,
    ) -> Result<Vec<u8>, PipelineError>;

    /// A format this backend can encode instead of `format`.
    fn fallback_for(&self, format: ImageFormat) -> Option<ImageFormat> {
        FALLBACK_ORDER
            .iter()
            .copied()
            .find(|f| *f != format && self.can_encode(*f))
    }
}

fn decode_with_image_crate(
    bytes: &[u8],
    can_decode: impl Fn(ImageFormat) -> bool,
) -> Result<DecodedImage, PipelineError> {
    let format = ImageFormat::detect(bytes)
        .ok_or_else(|| PipelineError::SourceUnreadable("Unrecognised image data".to_string()))?;
    if !can_decode(format) {
        return Err(PipelineError::SourceUnreadable(format!(
            "Cannot decode {format} sources"
        )));
    }
    let image = image::load_from_memory(bytes)
        .map_err(|e| PipelineError::SourceUnreadable(e.to_string()))?;
    Ok(DecodedImage { image, format })
}

fn encode_with_image_crate(
    image: &DynamicImage,
    format: ImageFormat,
    quality: u8,
) -> Result<Vec<u8>, PipelineError> {
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);
    let result = match format {
        ImageFormat::Jpeg => {
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality.clamp(1, 100));
            image.to_rgb8().write_with_encoder(encoder)
        }
        // The `image` WebP encoder is lossless; quality has no effect.
        ImageFormat::Webp => {
            let encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut cursor);
            if image.color().has_alpha() {
                image.to_rgba8().write_with_encoder(encoder)
            } else {
                image.to_rgb8().write_with_encoder(encoder)
            }
        }
        ImageFormat::Png => {
            let encoder = image::codecs::png::PngEncoder::new(&mut cursor);
            image.to_rgba8().write_with_encoder(encoder)
        }
        ImageFormat::Avif | ImageFormat::Gif => {
            return Err(PipelineError::UnsupportedFormat {
                format,
                fallback: Some(ImageFormat::Webp),
            })
        }
    };
    result.map_err(|e| PipelineError::internal(format!("Encode to {format} failed: {e}")))?;
    Ok(buffer)
}

// ---------------------------------------------------------------------------
// BasicBackend
// ---------------------------------------------------------------------------

/// `image`-crate only: decodes JPEG/PNG/WebP, encodes WebP/JPEG/PNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicBackend;

impl CodecBackend for BasicBackend {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn can_decode(&self, format: ImageFormat) -> bool {
        matches!(format, ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Webp)
    }

    fn can_encode(&self, format: ImageFormat) -> bool {
        matches!(format, ImageFormat::Webp | ImageFormat::Jpeg | ImageFormat::Png)
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, PipelineError> {
        decode_with_image_crate(bytes, |f| self.can_decode(f))
    }

    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        image.resize_exact(width, height, FilterType::Lanczos3)
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: ImageFormat,
        quality: u8,
    ) -> Result<Vec<u8>, PipelineError> {
        if !self.can_encode(format) {
            return Err(PipelineError::UnsupportedFormat {
                format,
                fallback: self.fallback_for(format),
            });
        }
        encode_with_image_crate(image, format, quality)
    }
}

// ---------------------------------------------------------------------------
// FullBackend
// ---------------------------------------------------------------------------

/// [`BasicBackend`] plus AVIF encoding via `ravif`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FullBackend;

impl FullBackend {
    fn encode_avif(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, PipelineError> {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let pixels: Vec<ravif::RGBA8> = rgba
            .pixels()
            .map(|p| ravif::RGBA8::new(p[0], p[1], p[2], p[3]))
            .collect();
        let encoded = ravif::Encoder::new()
            .with_quality(quality.clamp(1, 100) as f32)
            .with_speed(AVIF_SPEED)
            .encode_rgba(ravif::Img::new(&pixels[..], width as usize, height as usize))
            .map_err(|e| PipelineError::internal(format!("AVIF encode failed: {e}")))?;
        Ok(encoded.avif_file)
    }
}

impl CodecBackend for FullBackend {
    fn name(&self) -> &'static str {
        "full"
    }

    fn can_decode(&self, format: ImageFormat) -> bool {
        BasicBackend.can_decode(format)
    }

    fn can_encode(&self, format: ImageFormat) -> bool {
        format == ImageFormat::Avif || BasicBackend.can_encode(format)
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, PipelineError> {
        BasicBackend.decode(bytes)
    }

    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        BasicBackend.resize(image, width, height)
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: ImageFormat,
        quality: u8,
    ) -> Result<Vec<u8>, PipelineError> {
        match format {
            ImageFormat::Avif => Self::encode_avif(image, quality),
            other => BasicBackend.encode(image, other, quality),
        }
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Which backend to run, from the `CODEC_BACKEND` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendPreference {
    /// Use the full backend if its probe succeeds, else the basic one.
    Auto,
    /// Require the full backend.
    Full,
    Basic,
}

impl BackendPreference {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "full" => Some(Self::Full),
            "basic" => Some(Self::Basic),
            _ => None,
        }
    }
}

/// Encode a 1x1 raster in every format the backend claims.
pub fn probe(backend: &dyn CodecBackend) -> Result<(), PipelineError> {
    let pixel = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        1,
        1,
        image::Rgba([128, 64, 32, 255]),
    ));
    for format in [ImageFormat::Webp, ImageFormat::Avif, ImageFormat::Jpeg] {
        if backend.can_encode(format) {
            backend.encode(&pixel, format, 50)?;
        }
    }
    Ok(())
}

/// Pick the codec backend for this process.
pub fn select_backend(preference: BackendPreference) -> Result<Arc<dyn CodecBackend>, PipelineError> {
    match preference {
        BackendPreference::Basic => Ok(Arc::new(BasicBackend)),
        BackendPreference::Full => {
            probe(&FullBackend)?;
            Ok(Arc::new(FullBackend))
        }
        BackendPreference::Auto => match probe(&FullBackend) {
            Ok(()) => Ok(Arc::new(FullBackend)),
            Err(e) => {
                tracing::warn!(error = %e, "Full codec backend probe failed, using basic backend");
                Ok(Arc::new(BasicBackend))
            }
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
