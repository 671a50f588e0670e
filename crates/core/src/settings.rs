//! Per-batch conversion settings and submission limits.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::formats::TargetFormat;

/// Default encode quality when a submission does not specify one.
pub const DEFAULT_QUALITY: u8 = 80;

/// Maximum number of keywords accepted with a batch.
const MAX_KEYWORDS: usize = 50;

/// Maximum length of a single keyword.
const MAX_KEYWORD_LEN: usize = 100;

/// Conversion settings shared by every image in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ConversionSettings {
    pub target_format: TargetFormat,
    #[validate(range(min = 1, max = 100))]
    pub quality: u8,
    #[validate(range(min = 1, max = 16384))]
    pub max_width: Option<u32>,
    #[validate(range(min = 1, max = 16384))]
    pub max_height: Option<u32>,
    pub maintain_aspect_ratio: bool,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            target_format: TargetFormat::Webp,
            quality: DEFAULT_QUALITY,
            max_width: None,
            max_height: None,
            maintain_aspect_ratio: true,
        }
    }
}

impl ConversionSettings {
    /// Validate field ranges, mapping failures into [`CoreError::Validation`].
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(format!("Invalid conversion settings: {e}")))
    }

    /// Whether any bounding box is configured.
    pub fn has_bounds(&self) -> bool {
        self.max_width.is_some() || self.max_height.is_some()
    }
}

/// Validate the keyword list attached to a batch.
///
/// Keywords are opaque to the pipeline; only count and length are bounded.
pub fn validate_keywords(keywords: &[String]) -> Result<(), CoreError> {
    if keywords.len() > MAX_KEYWORDS {
        return Err(CoreError::Validation(format!(
            "A batch may carry at most {MAX_KEYWORDS} keywords"
        )));
    }
    for (i, kw) in keywords.iter().enumerate() {
        if kw.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "Keyword at index {i} must not be empty"
            )));
        }
        if kw.len() > MAX_KEYWORD_LEN {
            return Err(CoreError::Validation(format!(
                "Keyword at index {i} exceeds {MAX_KEYWORD_LEN} characters"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
