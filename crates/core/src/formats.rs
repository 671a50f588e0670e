//! Image format identifiers and the batch target-format selector.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// ImageFormat
// ---------------------------------------------------------------------------

/// An encoded raster format known to the pipeline.
///
/// Ordering follows declaration order; `Jpeg` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Avif,
    Gif,
}

impl ImageFormat {
    /// Canonical lowercase name, also used as the `format` field value.
    pub fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Gif => "gif",
        }
    }

    /// File extension used for stored assets.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Gif => "gif",
        }
    }

    /// MIME type for data URIs and HTTP responses.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Avif => "image/avif",
            Self::Gif => "image/gif",
        }
    }

    /// Whether the format can carry an alpha channel.
    pub fn supports_alpha(self) -> bool {
        matches!(self, Self::Png | Self::Webp | Self::Avif | Self::Gif)
    }

    /// Whether this is one of the two optimized delivery formats.
    pub fn is_modern(self) -> bool {
        matches!(self, Self::Webp | Self::Avif)
    }

    /// Parse a user-supplied name or extension (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::Webp),
            "avif" => Ok(Self::Avif),
            "gif" => Ok(Self::Gif),
            other => Err(CoreError::Validation(format!(
                "Unknown image format '{other}'"
            ))),
        }
    }

    /// Map from the `image` crate's format detection.
    pub fn from_detected(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::WebP => Some(Self::Webp),
            image::ImageFormat::Avif => Some(Self::Avif),
            image::ImageFormat::Gif => Some(Self::Gif),
            _ => None,
        }
    }

    /// Sniff the format from the leading bytes of an upload.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        image::guess_format(bytes).ok().and_then(Self::from_detected)
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// TargetFormat
// ---------------------------------------------------------------------------

/// Requested output for a batch: one of the two optimized formats, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Webp,
    Avif,
    Both,
}

impl TargetFormat {
    /// Concrete formats to encode, primary first.
    ///
    /// With `Both`, WebP is the primary converted asset and AVIF its sibling.
    pub fn formats(self) -> &'static [ImageFormat] {
        match self {
            Self::Webp => &[ImageFormat::Webp],
            Self::Avif => &[ImageFormat::Avif],
            Self::Both => &[ImageFormat::Webp, ImageFormat::Avif],
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "webp" => Ok(Self::Webp),
            "avif" => Ok(Self::Avif),
            "both" => Ok(Self::Both),
            other => Err(CoreError::Validation(format!(
                "Unknown target format '{other}'. Must be one of: webp, avif, both"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
