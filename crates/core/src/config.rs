//! Immutable pipeline configuration.
//!
//! Built once at startup and handed to every component constructor behind an
//! `Arc`. Nothing in the pipeline reads configuration from ambient state.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::settings::ConversionSettings;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Quality used for every responsive variant.
pub const DEFAULT_VARIANT_QUALITY: u8 = 80;

/// Images processed concurrently per batch.
pub const DEFAULT_MAX_CONCURRENT_IMAGES: usize = 4;

/// Images an anonymous caller may convert per day.
pub const DEFAULT_ANONYMOUS_DAILY_LIMIT: u32 = 10;

/// Length of a subscriber billing cycle, counted from account creation.
pub const DEFAULT_CYCLE_DAYS: i64 = 30;

/// Files accepted per batch submission.
pub const DEFAULT_MAX_FILES_PER_BATCH: usize = 50;

/// Per-file upload size limit (20 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Breakpoints
// ---------------------------------------------------------------------------

/// A named responsive width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub name: String,
    pub width: u32,
}

impl Breakpoint {
    pub fn new(name: impl Into<String>, width: u32) -> Self {
        Self {
            name: name.into(),
            width,
        }
    }
}

/// The default breakpoint ladder.
pub fn default_breakpoints() -> Vec<Breakpoint> {
    vec![
        Breakpoint::new("thumbnail", 320),
        Breakpoint::new("small", 640),
        Breakpoint::new("medium", 768),
        Breakpoint::new("large", 1024),
        Breakpoint::new("xlarge", 1280),
    ]
}

/// Parse a `name:width,name:width` list.
pub fn parse_breakpoints(spec: &str) -> Result<Vec<Breakpoint>, CoreError> {
    let mut out = Vec::new();
    for entry in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, width) = entry.split_once(':').ok_or_else(|| {
            CoreError::Validation(format!("Breakpoint '{entry}' must be written as name:width"))
        })?;
        let width: u32 = width.trim().parse().map_err(|_| {
            CoreError::Validation(format!("Breakpoint '{entry}' has a non-numeric width"))
        })?;
        out.push(Breakpoint::new(name.trim(), width));
    }
    validate_breakpoints(&out)?;
    Ok(out)
}

/// Breakpoints must be non-empty, uniquely named, and have positive widths.
pub fn validate_breakpoints(breakpoints: &[Breakpoint]) -> Result<(), CoreError> {
    if breakpoints.is_empty() {
        return Err(CoreError::Validation(
            "At least one breakpoint must be configured".to_string(),
        ));
    }
    let mut seen = std::collections::HashSet::with_capacity(breakpoints.len());
    for bp in breakpoints {
        if bp.name.is_empty() {
            return Err(CoreError::Validation(
                "Breakpoint name must not be empty".to_string(),
            ));
        }
        if bp.width == 0 {
            return Err(CoreError::Validation(format!(
                "Breakpoint '{}' must have a positive width",
                bp.name
            )));
        }
        if !seen.insert(bp.name.as_str()) {
            return Err(CoreError::Validation(format!(
                "Duplicate breakpoint name: \"{}\"",
                bp.name
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Quota plans
// ---------------------------------------------------------------------------

/// A subscriber plan: included monthly units plus per-unit overage price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanConfig {
    pub name: String,
    pub monthly_limit: u32,
    pub overage_rate_cents: u32,
}

/// Quota settings for every tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaConfig {
    pub anonymous_daily_limit: u32,
    pub cycle_days: i64,
    pub plans: Vec<PlanConfig>,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            anonymous_daily_limit: DEFAULT_ANONYMOUS_DAILY_LIMIT,
            cycle_days: DEFAULT_CYCLE_DAYS,
            plans: vec![
                PlanConfig {
                    name: "starter".to_string(),
                    monthly_limit: 500,
                    overage_rate_cents: 2,
                },
                PlanConfig {
                    name: "pro".to_string(),
                    monthly_limit: 2500,
                    overage_rate_cents: 1,
                },
            ],
        }
    }
}

impl QuotaConfig {
    pub fn plan(&self, name: &str) -> Option<&PlanConfig> {
        self.plans.iter().find(|p| p.name == name)
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Everything the pipeline components need, in one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub breakpoints: Vec<Breakpoint>,
    pub variant_quality: u8,
    pub max_concurrent_images: usize,
    pub max_files_per_batch: usize,
    pub max_upload_bytes: usize,
    pub default_settings: ConversionSettings,
    pub quota: QuotaConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            breakpoints: default_breakpoints(),
            variant_quality: DEFAULT_VARIANT_QUALITY,
            max_concurrent_images: DEFAULT_MAX_CONCURRENT_IMAGES,
            max_files_per_batch: DEFAULT_MAX_FILES_PER_BATCH,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            default_settings: ConversionSettings::default(),
            quota: QuotaConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Check cross-field consistency before the value is shared.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_breakpoints(&self.breakpoints)?;
        if !(1..=100).contains(&self.variant_quality) {
            return Err(CoreError::Validation(format!(
                "Variant quality must be between 1 and 100, got {}",
                self.variant_quality
            )));
        }
        if self.max_concurrent_images == 0 {
            return Err(CoreError::Validation(
                "max_concurrent_images must be at least 1".to_string(),
            ));
        }
        if self.quota.cycle_days <= 0 {
            return Err(CoreError::Validation(
                "Billing cycle length must be positive".to_string(),
            ));
        }
        self.default_settings.check()
    }

    /// Breakpoints sorted ascending by width.
    pub fn sorted_breakpoints(&self) -> Vec<Breakpoint> {
        let mut sorted = self.breakpoints.clone();
        sorted.sort_by_key(|bp| bp.width);
        sorted
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
