//! Responsive variant rules: breakpoint selection, dimensions, idempotency
//! keys, storage paths, and `srcset` construction.

use serde::{Deserialize, Serialize};

use crate::config::Breakpoint;
use crate::formats::ImageFormat;
use crate::types::EntityId;

// ---------------------------------------------------------------------------
// Keys and paths
// ---------------------------------------------------------------------------

/// Idempotency key of a variant row: `(image id, size name, format)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantKey {
    pub image_id: EntityId,
    pub size_name: String,
    pub format: ImageFormat,
}

impl VariantKey {
    pub fn new(image_id: EntityId, size_name: impl Into<String>, format: ImageFormat) -> Self {
        Self {
            image_id,
            size_name: size_name.into(),
            format,
        }
    }
}

/// Storage path of an uploaded original.
pub fn original_path(batch_id: EntityId, image_id: EntityId, ext: &str) -> String {
    format!("originals/{batch_id}/{image_id}.{ext}")
}

/// Storage path of a converted asset.
pub fn converted_path(image_id: EntityId, format: ImageFormat) -> String {
    format!("converted/{image_id}.{}", format.extension())
}

/// Storage path of a variant. Stable per key so regeneration overwrites.
pub fn variant_path(key: &VariantKey) -> String {
    format!(
        "variants/{}/{}.{}",
        key.image_id,
        key.size_name,
        key.format.extension()
    )
}

// ---------------------------------------------------------------------------
// Breakpoint selection
// ---------------------------------------------------------------------------

/// Breakpoints strictly narrower than `effective_width`, ascending.
///
/// Breakpoints at or above the source width are skipped so no variant is ever
/// an upscale.
pub fn eligible_breakpoints(breakpoints: &[Breakpoint], effective_width: u32) -> Vec<Breakpoint> {
    let mut eligible: Vec<Breakpoint> = breakpoints
        .iter()
        .filter(|bp| bp.width < effective_width)
        .cloned()
        .collect();
    eligible.sort_by_key(|bp| bp.width);
    eligible
}

/// Scale `(width, height)` down to `target_width`, preserving aspect ratio.
///
/// Never upscales; the height is rounded and kept at least 1.
pub fn scaled_dimensions(width: u32, height: u32, target_width: u32) -> (u32, u32) {
    if width == 0 || height == 0 || target_width >= width {
        return (width, height);
    }
    let scaled_h = (height as f64 * target_width as f64 / width as f64).round() as u32;
    (target_width, scaled_h.max(1))
}

// ---------------------------------------------------------------------------
// srcset
// ---------------------------------------------------------------------------

/// One responsive candidate as produced by the variant matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcsetCandidate {
    pub url: String,
    pub breakpoint: u32,
    pub width: u32,
}

/// One rendered `srcset` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SrcsetEntry {
    pub url: String,
    pub width: u32,
}

impl SrcsetEntry {
    /// Render as `"url 640w"`.
    pub fn render(&self) -> String {
        format!("{} {}w", self.url, self.width)
    }
}

/// Build an ordered candidate list for one format.
///
/// Variants are sorted by ascending breakpoint and the primary converted
/// asset is appended last as the largest candidate. Entries whose width does
/// not strictly increase are dropped so the list is strictly ascending.
pub fn build_srcset(
    mut candidates: Vec<SrcsetCandidate>,
    primary_url: &str,
    primary_width: u32,
) -> Vec<SrcsetEntry> {
    candidates.sort_by_key(|c| (c.breakpoint, c.width));

    let mut entries: Vec<SrcsetEntry> = Vec::with_capacity(candidates.len() + 1);
    for candidate in candidates {
        if candidate.width >= primary_width {
            continue;
        }
        if entries.last().is_some_and(|last| last.width >= candidate.width) {
            continue;
        }
        entries.push(SrcsetEntry {
            url: candidate.url,
            width: candidate.width,
        });
    }
    entries.push(SrcsetEntry {
        url: primary_url.to_string(),
        width: primary_width,
    });
    entries
}

/// Join entries into the attribute value form.
pub fn render_srcset(entries: &[SrcsetEntry]) -> String {
    entries
        .iter()
        .map(SrcsetEntry::render)
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
