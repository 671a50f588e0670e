//! Batch and image processing lifecycle.
//!
//! Images move `pending -> processing -> {completed | failed}`; a batch's
//! status is always derived from the statuses of the images it owns.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Failure message recorded on images that were cancelled mid-flight.
pub const CANCELLED_REASON: &str = "cancelled";

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Per-image conversion status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ImageStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Aggregate batch status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Check that an image may move from `from` to `to`.
///
/// No transition skips `processing`, and terminal states never change.
pub fn validate_image_transition(from: ImageStatus, to: ImageStatus) -> Result<(), CoreError> {
    let allowed = matches!(
        (from, to),
        (ImageStatus::Pending, ImageStatus::Processing)
            | (ImageStatus::Processing, ImageStatus::Completed)
            | (ImageStatus::Processing, ImageStatus::Failed)
    );
    if allowed {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "Invalid image status transition: {} -> {}",
            from.name(),
            to.name()
        )))
    }
}

/// Pending images may be settled as cancelled without entering `processing`.
///
/// They pass through `processing` first so the transition rules still hold;
/// this helper returns the sequence of statuses to apply.
pub fn cancellation_path(current: ImageStatus) -> &'static [ImageStatus] {
    match current {
        ImageStatus::Pending => &[ImageStatus::Processing, ImageStatus::Failed],
        ImageStatus::Processing => &[ImageStatus::Failed],
        ImageStatus::Completed | ImageStatus::Failed => &[],
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Derive a batch status from its images.
///
/// - no images touched yet: `pending`
/// - any image pending/processing (and at least one started): `processing`
/// - all terminal with at least one completed: `completed`
/// - all terminal with none completed: `failed`
pub fn derive_batch_status(statuses: &[ImageStatus]) -> BatchStatus {
    if statuses.is_empty() {
        return BatchStatus::Pending;
    }
    if statuses.iter().all(|s| *s == ImageStatus::Pending) {
        return BatchStatus::Pending;
    }
    if statuses.iter().any(|s| !s.is_terminal()) {
        return BatchStatus::Processing;
    }
    if statuses.iter().any(|s| *s == ImageStatus::Completed) {
        BatchStatus::Completed
    } else {
        BatchStatus::Failed
    }
}

/// Summary counts used by progress queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn from_statuses(statuses: &[ImageStatus]) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            match status {
                ImageStatus::Pending => counts.pending += 1,
                ImageStatus::Processing => counts.processing += 1,
                ImageStatus::Completed => counts.completed += 1,
                ImageStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn terminal(&self) -> usize {
        self.completed + self.failed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
