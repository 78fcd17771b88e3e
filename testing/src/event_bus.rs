//! In-memory event bus.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use event_hub_core::event_bus::{EventBus, EventBusError, MessageStream};
use event_hub_core::notification::{NotificationMessage, Topic};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// In-memory event bus for fast, deterministic tests.
///
/// Every published message is recorded (inspect with [`published`](Self::published))
/// and broadcast to live subscribers whose topic list matches.
///
/// # Example
///
/// ```
/// use event_hub_testing::mocks::InMemoryEventBus;
/// use event_hub_core::event_bus::EventBus;
/// use event_hub_core::notification::{NotificationMessage, UserRegisteredPayload};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = InMemoryEventBus::new();
/// let message = NotificationMessage::from_payload(&UserRegisteredPayload {
///     emails: vec!["a@x.io".to_string()],
///     name: None,
/// })?;
/// bus.publish(&message).await?;
/// assert_eq!(bus.published().len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryEventBus {
    published: Arc<RwLock<Vec<NotificationMessage>>>,
    sender: broadcast::Sender<NotificationMessage>,
    fail_publish: Arc<AtomicBool>,
}

impl InMemoryEventBus {
    /// Create a new bus with no recorded messages
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            published: Arc::new(RwLock::new(Vec::new())),
            sender,
            fail_publish: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// All messages published so far, in publish order
    #[must_use]
    pub fn published(&self) -> Vec<NotificationMessage> {
        self.published.read().unwrap().clone()
    }

    /// Messages published on `topic`
    #[must_use]
    pub fn published_on(&self, topic: Topic) -> Vec<NotificationMessage> {
        self.published
            .read()
            .unwrap()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Forget recorded messages
    pub fn clear(&self) {
        self.published.write().unwrap().clear();
    }

    /// Make every subsequent publish fail (broker outage)
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        message: &NotificationMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let result = if self.fail_publish.load(Ordering::SeqCst) {
            Err(EventBusError::PublishFailed {
                topic: message.topic.to_string(),
                reason: "in-memory bus is set to fail".to_string(),
            })
        } else {
            self.published.write().unwrap().push(message.clone());
            // No subscribers is not an error
            let _ = self.sender.send(message.clone());
            Ok(())
        };
        Box::pin(std::future::ready(result))
    }

    fn subscribe(
        &self,
        topics: &[Topic],
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, EventBusError>> + Send + '_>> {
        let mut receiver = self.sender.subscribe();
        let topics = topics.to_vec();

        let stream = async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(message) => {
                        if topics.contains(&message.topic) {
                            yield Ok(message);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        yield Err(EventBusError::TransportError(format!(
                            "subscriber lagged, {skipped} messages skipped"
                        )));
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };

        let stream: MessageStream = Box::pin(stream);
        Box::pin(std::future::ready(Ok(stream)))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use event_hub_core::notification::{EventRemovedPayload, UserRegisteredPayload};
    use futures::StreamExt;

    fn welcome(email: &str) -> NotificationMessage {
        NotificationMessage::from_payload(&UserRegisteredPayload {
            emails: vec![email.to_string()],
            name: None,
        })
        .expect("encode")
    }

    #[tokio::test]
    async fn records_published_messages() {
        let bus = InMemoryEventBus::new();
        bus.publish(&welcome("a@x.io")).await.expect("publish");
        bus.publish(&welcome("b@x.io")).await.expect("publish");

        assert_eq!(bus.published().len(), 2);
        assert_eq!(bus.published_on(Topic::UserRegistered).len(), 2);
        assert!(bus.published_on(Topic::EventAdded).is_empty());

        bus.clear();
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn subscribers_only_see_their_topics() {
        let bus = InMemoryEventBus::new();
        let mut stream = bus
            .subscribe(&[Topic::EventRemoved])
            .await
            .expect("subscribe");

        bus.publish(&welcome("a@x.io")).await.expect("publish");
        let removed = NotificationMessage::from_payload(&EventRemovedPayload {
            emails: vec!["a@x.io".to_string()],
            event_name: "Meetup".to_string(),
            event_date: chrono::Utc::now(),
        })
        .expect("encode");
        bus.publish(&removed).await.expect("publish");

        let received = stream.next().await.expect("item").expect("message");
        assert_eq!(received, removed);
    }

    #[tokio::test]
    async fn failing_mode_rejects_publish_without_recording() {
        let bus = InMemoryEventBus::new();
        bus.set_fail_publish(true);
        let err = bus.publish(&welcome("a@x.io")).await.expect_err("should fail");
        assert!(matches!(err, EventBusError::PublishFailed { .. }));
        assert!(bus.published().is_empty());
    }
}
