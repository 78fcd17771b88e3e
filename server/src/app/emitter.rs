//! Event bus emitter.
//!
//! Flattens a typed payload into a [`NotificationMessage`] and publishes it
//! on the payload's topic. Delivery to mailboxes happens later, in the
//! notification service.

use event_hub_core::event_bus::{EventBus, EventBusError};
use event_hub_core::notification::{NotificationMessage, PayloadError, TopicPayload};
use std::sync::Arc;
use thiserror::Error;

/// Why a notification was not published.
#[derive(Debug, Error)]
pub enum EmitError {
    /// The payload did not encode to a JSON object.
    #[error("Failed to encode notification: {0}")]
    Encode(#[from] PayloadError),

    /// The bus rejected the message.
    #[error("Failed to publish notification: {0}")]
    Publish(#[from] EventBusError),
}

/// Publishes notification payloads.
#[derive(Clone)]
pub struct Emitter {
    bus: Arc<dyn EventBus>,
}

impl Emitter {
    /// Emit on `bus`.
    #[must_use]
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self { bus }
    }

    /// Publish `payload` on its topic.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError`] if encoding or publishing fails.
    pub async fn emit<P: TopicPayload>(&self, payload: &P) -> Result<(), EmitError> {
        let message = NotificationMessage::from_payload(payload)?;
        self.bus.publish(&message).await.inspect_err(|e| {
            tracing::warn!(topic = %message.topic, error = %e, "Publish failed");
        })?;

        tracing::info!(topic = %message.topic, "Notification emitted");
        Ok(())
    }
}
