//! Domain rules for the web image optimization pipeline.
//!
//! This crate has no internal dependencies and no I/O. It holds:
//!
//! - [`error::CoreError`] and the shared id/timestamp aliases in [`types`].
//! - [`formats`] and [`settings`]: source/target formats and validated
//!   per-batch conversion settings.
//! - [`lifecycle`]: the Image/Batch state machine and aggregate derivation.
//! - [`variants`]: breakpoint eligibility, variant keys, storage path layout
//!   and `srcset` construction.
//! - [`signature`]: visual-signature algorithms over a decoded raster.
//! - [`scoring`]: the performance-scoring heuristic.
//! - [`quota`]: caller identities, tiers and usage-window math.
//! - [`config`]: the immutable [`config::PipelineConfig`] value.

pub mod config;
pub mod error;
pub mod formats;
pub mod hashing;
pub mod lifecycle;
pub mod quota;
pub mod scoring;
pub mod settings;
pub mod signature;
pub mod types;
pub mod variants;
