//! Performance scoring heuristic for a converted image.
//!
//! The score starts at 100, receives fixed additive adjustments, and is
//! clamped to `0..=100`. Recommendations are advisory and never feed back
//! into the score.

use serde::Serialize;

use crate::formats::ImageFormat;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Files above this size take the full size penalty.
pub const SIZE_HIGH_THRESHOLD_BYTES: u64 = 500 * 1024;
/// Files above this size start taking a proportional penalty.
pub const SIZE_LOW_THRESHOLD_BYTES: u64 = 100 * 1024;

const PENALTY_OVERSIZED: f64 = 30.0;
const PENALTY_SIZE_RANGE_MAX: f64 = 20.0;
const BONUS_MODERN_FORMAT: f64 = 5.0;
const PENALTY_LEGACY_FORMAT: f64 = 10.0;
const PENALTY_MISSING_DIMENSIONS: f64 = 15.0;
const PENALTY_MISSING_ALT: f64 = 5.0;
const PENALTY_NO_VARIANTS: f64 = 10.0;
const PENALTY_NO_SIGNATURE: f64 = 5.0;
const BONUS_COMPRESSION: f64 = 5.0;
/// Compression ratio (percent saved) above which the bonus applies.
const COMPRESSION_BONUS_THRESHOLD_PCT: f64 = 50.0;

/// Fixed render overhead added to the 4G load estimate for LCP.
pub const LCP_RENDER_OVERHEAD_MS: f64 = 100.0;
pub const LCP_GOOD_MS: f64 = 2500.0;
pub const LCP_NEEDS_IMPROVEMENT_MS: f64 = 4000.0;

/// CLS estimate when the renderer cannot reserve layout space.
pub const CLS_UNSIZED: f64 = 0.25;

// ---------------------------------------------------------------------------
// Network profiles
// ---------------------------------------------------------------------------

/// A reference connection for load-time estimates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkProfile {
    pub name: &'static str,
    pub bytes_per_second: f64,
    pub latency_ms: f64,
}

/// Reference profiles, slowest first.
pub const NETWORK_PROFILES: &[NetworkProfile] = &[
    NetworkProfile {
        name: "3g",
        bytes_per_second: 200_000.0,
        latency_ms: 300.0,
    },
    NetworkProfile {
        name: "4g",
        bytes_per_second: 1_500_000.0,
        latency_ms: 100.0,
    },
    NetworkProfile {
        name: "wifi",
        bytes_per_second: 6_000_000.0,
        latency_ms: 20.0,
    },
];

/// Profile used for the LCP estimate.
pub const LCP_REFERENCE_PROFILE: &str = "4g";

pub fn network_profile(name: &str) -> Option<&'static NetworkProfile> {
    NETWORK_PROFILES.iter().find(|p| p.name == name)
}

/// Estimated transfer time in milliseconds.
pub fn estimate_load_time_ms(file_size_bytes: u64, profile: &NetworkProfile) -> f64 {
    file_size_bytes as f64 / profile.bytes_per_second * 1000.0 + profile.latency_ms
}

// ---------------------------------------------------------------------------
// Input / output types
// ---------------------------------------------------------------------------

/// Facts about an image the scorer reads. Everything else is ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreInput {
    pub file_size_bytes: u64,
    pub original_size_bytes: Option<u64>,
    pub format: Option<ImageFormat>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub alt_text: Option<String>,
    pub variant_count: usize,
    pub placeholder_hash: Option<String>,
    pub aspect_ratio: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Excellent,
    Good,
    NeedsImprovement,
    Poor,
}

impl Rating {
    /// Rating band for a score; a pure function of the score.
    pub fn from_score(score: u8) -> Self {
        match score {
            90.. => Self::Excellent,
            70..=89 => Self::Good,
            50..=69 => Self::NeedsImprovement,
            _ => Self::Poor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub code: &'static str,
    pub priority: Priority,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LcpImpact {
    pub estimated_ms: f64,
    pub rating: Rating,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClsImpact {
    pub value: f64,
    pub rating: Rating,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadTime {
    pub network: &'static str,
    pub milliseconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub score: u8,
    pub rating: Rating,
    pub lcp_impact: LcpImpact,
    pub cls_impact: ClsImpact,
    pub load_times: Vec<LoadTime>,
    pub recommendations: Vec<Recommendation>,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

fn compression_ratio_pct(input: &ScoreInput) -> f64 {
    match input.original_size_bytes {
        Some(original) if original > 0 => {
            (original as f64 - input.file_size_bytes as f64) / original as f64 * 100.0
        }
        _ => 0.0,
    }
}

fn has_dimensions(input: &ScoreInput) -> bool {
    input.width.is_some() && input.height.is_some()
}

fn has_alt_text(input: &ScoreInput) -> bool {
    input.alt_text.as_deref().is_some_and(|a| !a.trim().is_empty())
}

/// Size penalty: flat above the high threshold, linear between thresholds.
fn size_penalty(file_size_bytes: u64) -> f64 {
    if file_size_bytes > SIZE_HIGH_THRESHOLD_BYTES {
        PENALTY_OVERSIZED
    } else if file_size_bytes > SIZE_LOW_THRESHOLD_BYTES {
        let span = (SIZE_HIGH_THRESHOLD_BYTES - SIZE_LOW_THRESHOLD_BYTES) as f64;
        let position = (file_size_bytes - SIZE_LOW_THRESHOLD_BYTES) as f64 / span;
        position * PENALTY_SIZE_RANGE_MAX
    } else {
        0.0
    }
}

/// Compute the clamped 0-100 score.
pub fn compute_score(input: &ScoreInput) -> u8 {
    let mut score = 100.0;

    score -= size_penalty(input.file_size_bytes);

    if input.format.is_some_and(ImageFormat::is_modern) {
        score += BONUS_MODERN_FORMAT;
    } else {
        score -= PENALTY_LEGACY_FORMAT;
    }
    if !has_dimensions(input) {
        score -= PENALTY_MISSING_DIMENSIONS;
    }
    if !has_alt_text(input) {
        score -= PENALTY_MISSING_ALT;
    }
    if input.variant_count == 0 {
        score -= PENALTY_NO_VARIANTS;
    }
    if input.placeholder_hash.is_none() {
        score -= PENALTY_NO_SIGNATURE;
    }
    if compression_ratio_pct(input) > COMPRESSION_BONUS_THRESHOLD_PCT {
        score += BONUS_COMPRESSION;
    }

    f64::clamp(score, 0.0, 100.0).round() as u8
}

fn lcp_impact(file_size_bytes: u64) -> LcpImpact {
    let estimated_ms = network_profile(LCP_REFERENCE_PROFILE)
        .map(|p| estimate_load_time_ms(file_size_bytes, p))
        .unwrap_or(0.0)
        + LCP_RENDER_OVERHEAD_MS;
    let rating = if estimated_ms <= LCP_GOOD_MS {
        Rating::Good
    } else if estimated_ms <= LCP_NEEDS_IMPROVEMENT_MS {
        Rating::NeedsImprovement
    } else {
        Rating::Poor
    };
    LcpImpact {
        estimated_ms,
        rating,
    }
}

fn cls_impact(input: &ScoreInput) -> ClsImpact {
    if has_dimensions(input) || input.aspect_ratio.is_some() {
        ClsImpact {
            value: 0.0,
            rating: Rating::Good,
            reason: None,
        }
    } else {
        ClsImpact {
            value: CLS_UNSIZED,
            rating: Rating::Poor,
            reason: Some(
                "No dimensions or aspect ratio recorded; the browser cannot reserve layout space"
                    .to_string(),
            ),
        }
    }
}

fn recommendations(input: &ScoreInput) -> Vec<Recommendation> {
    let mut recs = Vec::new();
    let size_kb = input.file_size_bytes / 1024;

    if input.file_size_bytes > SIZE_HIGH_THRESHOLD_BYTES {
        recs.push(Recommendation {
            code: "oversized_file",
            priority: Priority::High,
            message: format!("File is {size_kb} KB; reduce dimensions or quality to stay under 500 KB"),
        });
    } else if input.file_size_bytes > SIZE_LOW_THRESHOLD_BYTES {
        recs.push(Recommendation {
            code: "oversized_file",
            priority: Priority::Medium,
            message: format!("File is {size_kb} KB; aim for under 100 KB"),
        });
    }
    if !input.format.is_some_and(ImageFormat::is_modern) {
        recs.push(Recommendation {
            code: "legacy_format",
            priority: Priority::High,
            message: "Serve WebP or AVIF instead of a legacy format".to_string(),
        });
    }
    if !has_dimensions(input) {
        recs.push(Recommendation {
            code: "missing_dimensions",
            priority: Priority::High,
            message: "Record width and height to prevent layout shift".to_string(),
        });
    }
    if !has_alt_text(input) {
        recs.push(Recommendation {
            code: "missing_alt_text",
            priority: Priority::Medium,
            message: "Add descriptive alt text".to_string(),
        });
    }
    if input.variant_count == 0 {
        recs.push(Recommendation {
            code: "no_responsive_variants",
            priority: Priority::Medium,
            message: "Generate responsive variants and serve them via srcset".to_string(),
        });
    }
    if input.placeholder_hash.is_none() {
        recs.push(Recommendation {
            code: "missing_placeholder",
            priority: Priority::Low,
            message: "Extract a placeholder hash for progressive loading".to_string(),
        });
    }

    // Stable: same-priority items keep discovery order.
    recs.sort_by_key(|r| r.priority);
    recs
}

/// Produce the full performance report for one image.
pub fn score(input: &ScoreInput) -> PerformanceReport {
    let score = compute_score(input);
    PerformanceReport {
        score,
        rating: Rating::from_score(score),
        lcp_impact: lcp_impact(input.file_size_bytes),
        cls_impact: cls_impact(input),
        load_times: NETWORK_PROFILES
            .iter()
            .map(|p| LoadTime {
                network: p.name,
                milliseconds: estimate_load_time_ms(input.file_size_bytes, p),
            })
            .collect(),
        recommendations: recommendations(input),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
