//! Pipeline progress events.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PipelineEvent`]: the event envelope, with the event names in
//!   [`event_types`].
//! - [`EventLogger`]: background task that writes every event to the log.

pub mod bus;
pub mod logger;

pub use bus::{event_types, EventBus, PipelineEvent};
pub use logger::EventLogger;
