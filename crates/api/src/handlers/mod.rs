//! Request handlers.
//!
//! Each submodule provides async handler functions for one resource.
//! Handlers delegate to the [`BatchOrchestrator`](webopt_pipeline::BatchOrchestrator)
//! or the quota ledger and map errors via [`AppError`](crate::error::AppError).

pub mod batch;
pub mod image;
pub mod quota;
