//! Visual signature extraction (placeholders, colour, transparency, shape).
//!
//! Every operation downscales the decoded raster to a fixed width first; the
//! widths and sampling strides are part of the observable contract, so they
//! are constants rather than proportions of the source size.

pub mod aspect;
pub mod blurhash;
pub mod color;

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::formats::ImageFormat;

pub use aspect::aspect_ratio_label;
pub use color::{color_palette, dominant_color, quantize_channel, DEFAULT_PALETTE_SIZE};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Downscale width for the perceptual placeholder hash.
pub const PLACEHOLDER_HASH_WIDTH: u32 = 64;
/// Horizontal basis components of the placeholder hash.
pub const PLACEHOLDER_COMPONENTS_X: u32 = 4;
/// Vertical basis components of the placeholder hash.
pub const PLACEHOLDER_COMPONENTS_Y: u32 = 3;

/// Downscale width for the low-quality placeholder.
pub const LQIP_WIDTH: u32 = 20;
/// JPEG quality of the low-quality placeholder.
pub const LQIP_QUALITY: u8 = 30;

/// Downscale width for transparency sampling.
pub const TRANSPARENCY_SAMPLE_WIDTH: u32 = 100;
/// Pixel stride for transparency sampling, both axes.
pub const TRANSPARENCY_STRIDE: u32 = 5;
/// Alpha values below this count as transparent.
pub const TRANSPARENCY_ALPHA_THRESHOLD: u8 = 127;

// ---------------------------------------------------------------------------
// Downscaling
// ---------------------------------------------------------------------------

/// Resize to `target_width`, preserving aspect ratio. Never upscales.
pub fn downscale_to_width(image: &DynamicImage, target_width: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= target_width || width == 0 || height == 0 {
        return image.clone();
    }
    let target_height = ((height as f64 * target_width as f64 / width as f64).round() as u32).max(1);
    image.resize_exact(target_width, target_height, FilterType::Triangle)
}

// ---------------------------------------------------------------------------
// Individual extractors
// ---------------------------------------------------------------------------

/// Perceptual placeholder hash (4x3 BlurHash over a 64px-wide raster).
pub fn placeholder_hash(image: &DynamicImage) -> Result<String, CoreError> {
    let small = downscale_to_width(image, PLACEHOLDER_HASH_WIDTH);
    blurhash::encode(
        &small.to_rgba8(),
        PLACEHOLDER_COMPONENTS_X,
        PLACEHOLDER_COMPONENTS_Y,
    )
}

/// Tiny JPEG preview embedded as a `data:` URI.
pub fn low_quality_placeholder(image: &DynamicImage) -> Result<String, CoreError> {
    let small = downscale_to_width(image, LQIP_WIDTH).to_rgb8();
    let mut buffer = Vec::new();
    small
        .write_with_encoder(JpegEncoder::new_with_quality(
            &mut Cursor::new(&mut buffer),
            LQIP_QUALITY,
        ))
        .map_err(|e| CoreError::Internal(format!("Placeholder encode failed: {e}")))?;
    Ok(format!(
        "data:{};base64,{}",
        ImageFormat::Jpeg.mime_type(),
        STANDARD.encode(&buffer)
    ))
}

/// Whether any sampled pixel is meaningfully transparent.
///
/// Only evaluated for alpha-capable source formats; everything else is
/// reported opaque without sampling.
pub fn has_transparency(image: &DynamicImage, source_format: ImageFormat) -> bool {
    if !source_format.supports_alpha() || !image.color().has_alpha() {
        return false;
    }
    let small = downscale_to_width(image, TRANSPARENCY_SAMPLE_WIDTH);
    let (width, height) = small.dimensions();
    for y in (0..height).step_by(TRANSPARENCY_STRIDE as usize) {
        for x in (0..width).step_by(TRANSPARENCY_STRIDE as usize) {
            if small.get_pixel(x, y)[3] < TRANSPARENCY_ALPHA_THRESHOLD {
                return true;
            }
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Combined signature
// ---------------------------------------------------------------------------

/// All visual-signature fields persisted on an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualSignature {
    pub placeholder_hash: String,
    pub lqip: String,
    pub dominant_color: Option<String>,
    pub color_palette: Vec<String>,
    pub has_transparency: bool,
    pub aspect_ratio: Option<String>,
}

/// Compute every signature field from a decoded source raster.
pub fn extract(image: &DynamicImage, source_format: ImageFormat) -> Result<VisualSignature, CoreError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(CoreError::Validation(
            "Cannot extract a signature from an empty image".to_string(),
        ));
    }
    Ok(VisualSignature {
        placeholder_hash: placeholder_hash(image)?,
        lqip: low_quality_placeholder(image)?,
        dominant_color: dominant_color(image),
        color_palette: color_palette(image, DEFAULT_PALETTE_SIZE),
        has_transparency: has_transparency(image, source_format),
        aspect_ratio: aspect_ratio_label(width, height),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
