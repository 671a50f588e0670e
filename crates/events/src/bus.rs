//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the orchestrator, which
//! publishes, and any number of listeners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use webopt_core::types::EntityId;

/// Event names published by the pipeline.
pub mod event_types {
    pub const IMAGE_PROCESSING: &str = "image.processing";
    pub const IMAGE_COMPLETED: &str = "image.completed";
    pub const IMAGE_FAILED: &str = "image.failed";
    pub const BATCH_COMPLETED: &str = "batch.completed";
    pub const BATCH_FAILED: &str = "batch.failed";
    pub const VARIANT_FAILED: &str = "variant.failed";
}

// ---------------------------------------------------------------------------
// PipelineEvent
// ---------------------------------------------------------------------------

/// Something that happened while processing a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Dot-separated event name, e.g. `"image.completed"`.
    pub event_type: String,
    pub batch_id: Option<EntityId>,
    pub image_id: Option<EntityId>,
    /// Event-specific data.
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl PipelineEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            batch_id: None,
            image_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_batch(mut self, batch_id: EntityId) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn with_image(mut self, image_id: EntityId) -> Self {
        self.image_id = Some(image_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out bus: every subscriber receives every event published after it
/// subscribed.
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest unread events are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped if there are none.
    pub fn publish(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
