//! Dominant colour and palette extraction by quantised histogram.

use image::{DynamicImage, GenericImageView};
use indexmap::IndexMap;

use super::downscale_to_width;

/// Downscale width for dominant colour sampling.
pub const DOMINANT_SAMPLE_WIDTH: u32 = 50;
/// Pixel stride for dominant colour sampling, both axes.
pub const DOMINANT_STRIDE: u32 = 2;
/// Channel quantisation step for dominant colour.
pub const DOMINANT_QUANT_STEP: u8 = 32;

/// Downscale width for palette sampling.
pub const PALETTE_SAMPLE_WIDTH: u32 = 100;
/// Pixel stride for palette sampling, both axes.
pub const PALETTE_STRIDE: u32 = 3;
/// Channel quantisation step for the palette.
pub const PALETTE_QUANT_STEP: u8 = 24;
/// Candidates closer than this to the last accepted colour are skipped.
pub const PALETTE_MIN_DISTANCE: f64 = 50.0;
/// Palette size when the caller does not ask for one.
pub const DEFAULT_PALETTE_SIZE: usize = 5;

/// Round a channel to the nearest multiple of `step`, capped at 255.
///
/// Idempotent: quantising an already-quantised value returns it unchanged.
pub fn quantize_channel(value: u8, step: u8) -> u8 {
    let step = step.max(1) as f64;
    let rounded = (value as f64 / step).round() * step;
    rounded.min(255.0) as u8
}

/// Format an RGB triple as lowercase `#rrggbb`.
pub fn to_hex(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

/// Euclidean distance between two RGB triples.
pub fn rgb_distance(a: [u8; 3], b: [u8; 3]) -> f64 {
    let dr = a[0] as f64 - b[0] as f64;
    let dg = a[1] as f64 - b[1] as f64;
    let db = a[2] as f64 - b[2] as f64;
    (dr * dr + dg * dg + db * db).sqrt()
}

/// Build a histogram of quantised colours over a strided row-major scan.
///
/// Insertion order is first-seen order, which decides frequency ties.
fn quantized_histogram(image: &DynamicImage, stride: u32, step: u8) -> IndexMap<[u8; 3], usize> {
    let (width, height) = image.dimensions();
    let mut histogram: IndexMap<[u8; 3], usize> = IndexMap::new();
    for y in (0..height).step_by(stride as usize) {
        for x in (0..width).step_by(stride as usize) {
            let pixel = image.get_pixel(x, y);
            let key = [
                quantize_channel(pixel[0], step),
                quantize_channel(pixel[1], step),
                quantize_channel(pixel[2], step),
            ];
            *histogram.entry(key).or_insert(0) += 1;
        }
    }
    histogram
}

/// The most frequent quantised colour as `#rrggbb`.
///
/// Ties go to the colour encountered first in the scan. Returns `None` for an
/// empty raster.
pub fn dominant_color(image: &DynamicImage) -> Option<String> {
    let small = downscale_to_width(image, DOMINANT_SAMPLE_WIDTH);
    let histogram = quantized_histogram(&small, DOMINANT_STRIDE, DOMINANT_QUANT_STEP);

    let mut best: Option<([u8; 3], usize)> = None;
    for (color, count) in &histogram {
        if best.map_or(true, |(_, best_count)| *count > best_count) {
            best = Some((*color, *count));
        }
    }
    best.map(|(color, _)| to_hex(color))
}

/// Up to `count` representative colours, most frequent first.
///
/// A candidate is skipped when it sits within [`PALETTE_MIN_DISTANCE`] of the
/// most recently accepted colour.
pub fn color_palette(image: &DynamicImage, count: usize) -> Vec<String> {
    if count == 0 {
        return Vec::new();
    }
    let small = downscale_to_width(image, PALETTE_SAMPLE_WIDTH);
    let histogram = quantized_histogram(&small, PALETTE_STRIDE, PALETTE_QUANT_STEP);

    let mut ranked: Vec<([u8; 3], usize)> = histogram.into_iter().collect();
    // Stable: equal counts keep first-seen order.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let mut accepted: Vec<[u8; 3]> = Vec::with_capacity(count);
    for (color, _) in ranked {
        if accepted.len() >= count {
            break;
        }
        if let Some(last) = accepted.last() {
            if rgb_distance(*last, color) < PALETTE_MIN_DISTANCE {
                continue;
            }
        }
        accepted.push(color);
    }
    accepted.into_iter().map(to_hex).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
