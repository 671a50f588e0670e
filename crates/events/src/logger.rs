//! Structured logging of pipeline events.
//!
//! [`EventLogger`] subscribes to the [`EventBus`](crate::bus::EventBus) and
//! emits one `tracing` event per [`PipelineEvent`]. It runs as a background
//! task and stops when the bus is dropped.

use tokio::sync::broadcast;

use crate::bus::{event_types, PipelineEvent};

pub struct EventLogger;

impl EventLogger {
    /// Run until the channel closes.
    pub async fn run(mut receiver: broadcast::Receiver<PipelineEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => Self::log(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event logger lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, event logger shutting down");
                    break;
                }
            }
        }
    }

    fn log(event: &PipelineEvent) {
        let batch_id = event.batch_id.map(|id| id.to_string()).unwrap_or_default();
        let image_id = event.image_id.map(|id| id.to_string()).unwrap_or_default();
        match event.event_type.as_str() {
            event_types::IMAGE_FAILED | event_types::BATCH_FAILED | event_types::VARIANT_FAILED => {
                tracing::warn!(
                    event_type = %event.event_type,
                    batch_id = %batch_id,
                    image_id = %image_id,
                    payload = %event.payload,
                    "Pipeline event"
                );
            }
            _ => {
                tracing::info!(
                    event_type = %event.event_type,
                    batch_id = %batch_id,
                    image_id = %image_id,
                    payload = %event.payload,
                    "Pipeline event"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;

    #[tokio::test]
    async fn stops_when_bus_dropped() {
        let bus = EventBus::default();
        let rx = bus.subscribe();
        let handle = tokio::spawn(EventLogger::run(rx));

        bus.publish(PipelineEvent::new(event_types::IMAGE_PROCESSING));
        drop(bus);

        handle.await.expect("logger task should exit cleanly");
    }
}
