//! Event bus consumer with automatic reconnection.
//!
//! `EventConsumer` owns the subscribe/process/reconnect loop so handlers only
//! deal with one decoded [`NotificationMessage`] at a time:
//!
//! ```text
//! loop {
//!     subscribe(topics)
//!     for each message:
//!         spawn handler(message)     // receipt never waits on dispatch
//!     stream ended or failed:
//!         sleep(retry_delay), resubscribe
//! }
//! ```
//!
//! Shutdown is signalled through a `broadcast::Receiver<()>` and checked while
//! subscribing and between messages.

use crate::background::spawn_guarded;
use async_trait::async_trait;
use event_hub_core::event_bus::{EventBus, MessageStream};
use event_hub_core::notification::{NotificationMessage, Topic};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Processes one message taken off the bus.
///
/// Errors are logged by the consumer and never stop the loop.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle a decoded message.
    ///
    /// # Errors
    ///
    /// Returns an error when the message could not be processed.
    async fn handle(
        &self,
        message: NotificationMessage,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Long-running bus consumer.
pub struct EventConsumer {
    name: String,
    topics: Vec<Topic>,
    event_bus: Arc<dyn EventBus>,
    handler: Arc<dyn MessageHandler>,
    shutdown: broadcast::Receiver<()>,
    retry_delay: Duration,
}

impl EventConsumer {
    /// Create a consumer with the default retry delay (5 seconds).
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        topics: Vec<Topic>,
        event_bus: Arc<dyn EventBus>,
        handler: Arc<dyn MessageHandler>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            name: name.into(),
            topics,
            event_bus,
            handler,
            shutdown,
            retry_delay: Duration::from_secs(5),
        }
    }

    /// Create a builder for configuring a consumer.
    #[must_use]
    pub fn builder() -> EventConsumerBuilder {
        EventConsumerBuilder::default()
    }

    /// Set custom retry delay.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Spawn the consumer as a background task.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&mut self) {
        info!(consumer = %self.name, "Event consumer started");

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Event consumer received shutdown signal");
                    break;
                }
                subscribe_result = self.event_bus.subscribe(&self.topics) => {
                    match subscribe_result {
                        Ok(stream) => {
                            info!(consumer = %self.name, topics = ?self.topics, "Subscribed to event bus");

                            if self.process_stream(stream).await {
                                break;
                            }

                            warn!(consumer = %self.name, "Event stream ended, reconnecting in {:?}", self.retry_delay);
                            tokio::time::sleep(self.retry_delay).await;
                        }
                        Err(e) => {
                            error!(
                                consumer = %self.name,
                                error = %e,
                                "Failed to subscribe to event bus, retrying in {:?}",
                                self.retry_delay
                            );
                            tokio::time::sleep(self.retry_delay).await;
                        }
                    }
                }
            }
        }

        info!(consumer = %self.name, "Event consumer stopped");
    }

    /// Returns true when shutdown was requested, false when the stream ended.
    async fn process_stream(&mut self, mut stream: MessageStream) -> bool {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Event consumer received shutdown signal during processing");
                    return true;
                }
                next = stream.next() => {
                    match next {
                        Some(Ok(message)) => {
                            metrics::counter!("bus.messages.received", "topic" => message.topic.as_str())
                                .increment(1);
                            let handler = Arc::clone(&self.handler);
                            spawn_guarded("message handler", async move {
                                handler.handle(message).await
                            });
                        }
                        Some(Err(e)) => {
                            error!(consumer = %self.name, error = %e, "Error receiving message from stream");
                        }
                        None => {
                            warn!(consumer = %self.name, "Event stream ended");
                            return false;
                        }
                    }
                }
            }
        }
    }
}

/// Missing required field when building an [`EventConsumer`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("EventConsumer is missing required field '{0}'")]
pub struct ConsumerBuildError(pub &'static str);

/// Builder for configuring an `EventConsumer`.
#[derive(Default)]
pub struct EventConsumerBuilder {
    name: Option<String>,
    topics: Option<Vec<Topic>>,
    event_bus: Option<Arc<dyn EventBus>>,
    handler: Option<Arc<dyn MessageHandler>>,
    shutdown: Option<broadcast::Receiver<()>>,
    retry_delay: Option<Duration>,
}

impl EventConsumerBuilder {
    /// Set consumer name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set topics to subscribe to.
    #[must_use]
    pub fn topics(mut self, topics: Vec<Topic>) -> Self {
        self.topics = Some(topics);
        self
    }

    /// Set event bus instance.
    #[must_use]
    pub fn event_bus(mut self, event_bus: Arc<dyn EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Set message handler.
    #[must_use]
    pub fn handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Set shutdown signal receiver.
    #[must_use]
    pub fn shutdown(mut self, shutdown: broadcast::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Set custom retry delay (default: 5 seconds).
    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Build the `EventConsumer`.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerBuildError`] naming the first unset required field.
    pub fn build(self) -> Result<EventConsumer, ConsumerBuildError> {
        Ok(EventConsumer {
            name: self.name.ok_or(ConsumerBuildError("name"))?,
            topics: self.topics.ok_or(ConsumerBuildError("topics"))?,
            event_bus: self.event_bus.ok_or(ConsumerBuildError("event_bus"))?,
            handler: self.handler.ok_or(ConsumerBuildError("handler"))?,
            shutdown: self.shutdown.ok_or(ConsumerBuildError("shutdown"))?,
            retry_delay: self.retry_delay.unwrap_or(Duration::from_secs(5)),
        })
    }
}
