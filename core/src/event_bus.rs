//! Event bus abstraction for notification fan-out.
//!
//! The event service publishes [`NotificationMessage`]s after a state change
//! has been persisted; the notification service subscribes to every
//! [`Topic`] and turns messages into emails.
//!
//! ```text
//! ┌───────────────┐   publish    ┌───────────┐  subscribe  ┌──────────────────┐
//! │ Event service │ ───────────► │ Event bus │ ──────────► │ Notification svc │
//! └───────────────┘              └───────────┘             └──────────────────┘
//! ```
//!
//! Delivery is at-least-once. Consumers must tolerate duplicates and must not
//! assume ordering across topics.
//!
//! # Implementations
//!
//! - `InMemoryEventBus` (testing crate): records published messages, broadcasts to subscribers
//! - `RedpandaEventBus` (redpanda crate): Kafka-compatible production transport

use crate::notification::{NotificationMessage, Topic};
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to connect to the broker
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish a message to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe to topics
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// A received message could not be decoded
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Network or transport error
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// Stream of messages from a subscription.
pub type MessageStream =
    Pin<Box<dyn Stream<Item = Result<NotificationMessage, EventBusError>> + Send>>;

/// Publish/subscribe transport for notification messages.
///
/// Methods return `Pin<Box<dyn Future>>` so the bus can be shared as
/// `Arc<dyn EventBus>` and captured by effects.
pub trait EventBus: Send + Sync {
    /// Publish a message on its topic.
    ///
    /// Resolves once the broker has acknowledged the message.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the publish operation fails.
    fn publish(
        &self,
        message: &NotificationMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to one or more topics.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if the subscription
    /// cannot be established.
    fn subscribe(
        &self,
        topics: &[Topic],
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, EventBusError>> + Send + '_>>;
}
