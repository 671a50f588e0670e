use std::sync::Arc;

use webopt_events::EventBus;
use webopt_pipeline::BatchOrchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (JWT settings, limits).
    pub config: Arc<ServerConfig>,
    /// Batch orchestrator; also owns the quota ledger and conversion engine.
    pub orchestrator: Arc<BatchOrchestrator>,
    /// Event bus the pipeline publishes progress to.
    pub event_bus: Arc<EventBus>,
}
