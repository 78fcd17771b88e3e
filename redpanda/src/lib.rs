//! Redpanda event bus for Event Hub.
//!
//! Implements [`EventBus`] over the Kafka protocol with rdkafka, so it works
//! against Redpanda, Apache Kafka or any compatible broker.
//!
//! # Topics and payloads
//!
//! Each notification [`Topic`] maps to one Kafka topic named
//! `<prefix><wire name>`, e.g. `notify.event_add` with the default prefix.
//! Message bodies are the JSON encoding of [`NotificationMessage`], keyed by
//! the wire name so every message of a topic lands on the same partition.
//!
//! # Delivery Semantics
//!
//! **At-least-once delivery** with manual offset commits:
//! - Offsets are committed AFTER the message is handed to the subscriber's channel
//! - If the process crashes before commit, the message is redelivered
//! - A redelivered notification may send a duplicate mail
//!
//! # Example
//!
//! ```no_run
//! use event_hub_redpanda::RedpandaEventBus;
//! use event_hub_core::event_bus::EventBus;
//! use event_hub_core::notification::Topic;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = RedpandaEventBus::builder()
//!     .brokers("localhost:9092")
//!     .consumer_group("event-hub-notifications")
//!     .build()?;
//!
//! let mut stream = bus.subscribe(&[Topic::EventAdded]).await?;
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(message) => println!("Received: {}", message.topic),
//!         Err(e) => eprintln!("Error: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use event_hub_core::event_bus::{EventBus, EventBusError, MessageStream};
use event_hub_core::notification::{NotificationMessage, Topic};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Topic prefix used when none is configured.
pub const DEFAULT_TOPIC_PREFIX: &str = "notify.";

/// Kafka topic name for a notification topic.
#[must_use]
pub fn kafka_topic(prefix: &str, topic: Topic) -> String {
    format!("{prefix}{}", topic.as_str())
}

/// Redpanda event bus.
///
/// The producer is created eagerly; consumers are created per
/// [`subscribe`](EventBus::subscribe) call and owned by a forwarding task.
///
/// ```no_run
/// use event_hub_redpanda::RedpandaEventBus;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = RedpandaEventBus::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .topic_prefix("staging.notify.")
///     .producer_acks("all")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaEventBus {
    producer: FutureProducer,
    brokers: String,
    topic_prefix: String,
    timeout: Duration,
    consumer_group: Option<String>,
    buffer_size: usize,
    auto_offset_reset: String,
}

impl RedpandaEventBus {
    /// Create a bus with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if the producer cannot be created.
    pub fn new(brokers: &str) -> Result<Self, EventBusError> {
        Self::builder().brokers(brokers).build()
    }

    /// Start configuring a bus.
    #[must_use]
    pub fn builder() -> RedpandaEventBusBuilder {
        RedpandaEventBusBuilder::default()
    }

    /// Configured broker list.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    /// Kafka topic name this bus uses for `topic`.
    #[must_use]
    pub fn topic_name(&self, topic: Topic) -> String {
        kafka_topic(&self.topic_prefix, topic)
    }

    /// Fetch cluster metadata, bounded by the configured timeout.
    ///
    /// Building the producer never dials a broker; this does.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if no broker answers in time.
    pub async fn ping(&self) -> Result<(), EventBusError> {
        let producer = self.producer.clone();
        let timeout = self.timeout;

        let metadata = tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(None, timeout)
                .map(|metadata| metadata.brokers().len())
        })
        .await
        .map_err(|e| EventBusError::ConnectionFailed(format!("Metadata request aborted: {e}")))?;

        match metadata {
            Ok(brokers) => {
                tracing::debug!(brokers, "Redpanda metadata fetched");
                Ok(())
            },
            Err(e) => Err(EventBusError::ConnectionFailed(format!(
                "Brokers {} unreachable: {e}",
                self.brokers
            ))),
        }
    }
}

/// Builder for [`RedpandaEventBus`].
#[derive(Default)]
pub struct RedpandaEventBusBuilder {
    brokers: Option<String>,
    topic_prefix: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
    consumer_group: Option<String>,
    buffer_size: Option<usize>,
    auto_offset_reset: Option<String>,
}

impl RedpandaEventBusBuilder {
    /// Comma-separated broker addresses (required).
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Prefix prepended to every wire topic name. Default: `notify.`
    #[must_use]
    pub fn topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = Some(prefix.into());
        self
    }

    /// Producer acknowledgment mode: "0", "1" or "all". Default: "1"
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Compression codec. Default: "none"
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Producer send and metadata timeout. Default: 5 seconds
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Consumer group for subscriptions.
    ///
    /// Instances sharing a group split the partitions between them. When
    /// unset, the group is derived from the subscribed topics.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Messages buffered between the Kafka consumer and the subscriber. Default: 1000
    #[must_use]
    pub const fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }

    /// Where new consumer groups start reading: "earliest" or "latest". Default: "latest"
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Build the [`RedpandaEventBus`].
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if brokers are not set, the
    /// buffer size is zero, or the producer cannot be created.
    pub fn build(self) -> Result<RedpandaEventBus, EventBusError> {
        let brokers = self
            .brokers
            .ok_or_else(|| EventBusError::ConnectionFailed("Brokers not configured".to_string()))?;

        let buffer_size = self.buffer_size.unwrap_or(1000);
        if buffer_size == 0 {
            return Err(EventBusError::ConnectionFailed(
                "buffer_size must be greater than 0".to_string(),
            ));
        }

        let mut producer_config = ClientConfig::new();
        producer_config
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", self.producer_acks.as_deref().unwrap_or("1"))
            .set("compression.type", self.compression.as_deref().unwrap_or("none"));

        let producer: FutureProducer = producer_config.create().map_err(|e| {
            EventBusError::ConnectionFailed(format!("Failed to create producer: {e}"))
        })?;

        let topic_prefix = self
            .topic_prefix
            .unwrap_or_else(|| DEFAULT_TOPIC_PREFIX.to_string());

        tracing::info!(
            brokers = %brokers,
            topic_prefix = %topic_prefix,
            acks = self.producer_acks.as_deref().unwrap_or("1"),
            buffer_size,
            "RedpandaEventBus created"
        );

        Ok(RedpandaEventBus {
            producer,
            brokers,
            topic_prefix,
            timeout: self.timeout.unwrap_or(Duration::from_secs(5)),
            consumer_group: self.consumer_group,
            buffer_size,
            auto_offset_reset: self
                .auto_offset_reset
                .unwrap_or_else(|| "latest".to_string()),
        })
    }
}

impl EventBus for RedpandaEventBus {
    fn publish(
        &self,
        message: &NotificationMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = self.topic_name(message.topic);
        let key = message.topic.as_str();
        let payload = message.to_bytes();
        let timeout = self.timeout;

        Box::pin(async move {
            let payload = payload.map_err(|e| EventBusError::PublishFailed {
                topic: topic.clone(),
                reason: format!("Failed to serialize message: {e}"),
            })?;

            let record = FutureRecord::to(&topic).payload(&payload).key(key);

            match self.producer.send(record, Timeout::After(timeout)).await {
                Ok((partition, offset)) => {
                    metrics::counter!("bus.messages.published", "topic" => key).increment(1);
                    tracing::debug!(
                        topic = %topic,
                        partition,
                        offset,
                        "Notification published"
                    );
                    Ok(())
                },
                Err((kafka_error, _)) => {
                    tracing::error!(topic = %topic, error = %kafka_error, "Failed to publish notification");
                    Err(EventBusError::PublishFailed {
                        topic,
                        reason: kafka_error.to_string(),
                    })
                },
            }
        })
    }

    #[allow(clippy::too_many_lines)] // Consumer task with manual commits
    fn subscribe(
        &self,
        topics: &[Topic],
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, EventBusError>> + Send + '_>> {
        let kafka_topics: Vec<String> = topics.iter().map(|t| self.topic_name(*t)).collect();
        let brokers = self.brokers.clone();
        let consumer_group = self.consumer_group.clone();
        let buffer_size = self.buffer_size;
        let auto_offset_reset = self.auto_offset_reset.clone();

        Box::pin(async move {
            let consumer_group_id = consumer_group.unwrap_or_else(|| {
                let mut sorted = kafka_topics.clone();
                sorted.sort();
                format!("event-hub-{}", sorted.join("-"))
            });

            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &brokers)
                .set("group.id", &consumer_group_id)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", &auto_offset_reset)
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topics: kafka_topics.clone(),
                    reason: format!("Failed to create consumer: {e}"),
                })?;

            let topic_refs: Vec<&str> = kafka_topics.iter().map(String::as_str).collect();
            consumer
                .subscribe(&topic_refs)
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topics: kafka_topics.clone(),
                    reason: format!("Failed to subscribe to topics: {e}"),
                })?;

            tracing::info!(
                topics = ?kafka_topics,
                consumer_group = %consumer_group_id,
                auto_offset_reset = %auto_offset_reset,
                "Subscribed to topics"
            );

            let (tx, rx) = tokio::sync::mpsc::channel(buffer_size);

            tokio::spawn(async move {
                use futures::StreamExt;
                use rdkafka::consumer::CommitMode;

                let mut stream = consumer.stream();

                while let Some(received) = stream.next().await {
                    let message = match received {
                        Ok(message) => message,
                        Err(e) => {
                            let err = EventBusError::TransportError(format!(
                                "Failed to receive message: {e}"
                            ));
                            if tx.send(Err(err)).await.is_err() {
                                break;
                            }
                            continue;
                        },
                    };

                    let decoded = match message.payload() {
                        Some(payload) => NotificationMessage::from_slice(payload).map_err(|e| {
                            EventBusError::DeserializationFailed(format!(
                                "{} at offset {}: {e}",
                                message.topic(),
                                message.offset()
                            ))
                        }),
                        None => Err(EventBusError::DeserializationFailed(
                            "Message has no payload".to_string(),
                        )),
                    };

                    if let Ok(notification) = &decoded {
                        tracing::trace!(
                            topic = %notification.topic,
                            partition = message.partition(),
                            offset = message.offset(),
                            "Received notification"
                        );
                    }

                    // Receiver gone: exit without committing so the message is redelivered
                    if tx.send(decoded).await.is_err() {
                        tracing::debug!("Channel receiver dropped, exiting consumer task");
                        break;
                    }

                    // Undecodable messages are committed too; redelivery cannot fix them
                    if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                        tracing::warn!(
                            topic = message.topic(),
                            partition = message.partition(),
                            offset = message.offset(),
                            error = %e,
                            "Failed to commit offset (message may be redelivered)"
                        );
                    }
                }

                tracing::debug!("Consumer task exiting");
            });

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as MessageStream)
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn redpanda_event_bus_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedpandaEventBus>();
        assert_sync::<RedpandaEventBus>();
    }

    #[test]
    fn kafka_topics_carry_prefix_and_wire_name() {
        assert_eq!(kafka_topic(DEFAULT_TOPIC_PREFIX, Topic::EventAdded), "notify.event_add");
        assert_eq!(kafka_topic("", Topic::UserRegistered), "user_registered");
        assert_eq!(
            kafka_topic("staging.", Topic::ApplicationRegistered),
            "staging.event_register"
        );
    }

    #[test]
    fn build_requires_brokers() {
        let result = RedpandaEventBus::builder().build();
        assert!(matches!(result, Err(EventBusError::ConnectionFailed(_))));
    }

    #[test]
    fn build_rejects_zero_buffer() {
        let result = RedpandaEventBus::builder()
            .brokers("localhost:9092")
            .buffer_size(0)
            .build();
        assert!(matches!(result, Err(EventBusError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn ping_fails_when_no_broker_listens() {
        let bus = RedpandaEventBus::builder()
            .brokers("127.0.0.1:1")
            .timeout(Duration::from_millis(500))
            .build()
            .expect("build");

        let result = bus.ping().await;

        assert!(matches!(result, Err(EventBusError::ConnectionFailed(_))));
    }

    #[test]
    fn topic_name_uses_configured_prefix() {
        // Producer creation does not contact the broker
        let bus = RedpandaEventBus::builder()
            .brokers("localhost:9092")
            .topic_prefix("test.")
            .build()
            .expect("build");
        assert_eq!(bus.topic_name(Topic::EventRemoved), "test.event_remove");
        assert_eq!(bus.brokers(), "localhost:9092");
    }
}
