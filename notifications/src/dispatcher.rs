//! Turns bus messages into mail.
//!
//! receive → branch on topic → decode typed payload → resolve recipients →
//! render template → send on a guarded background task.
//!
//! Malformed payloads are dropped with a warning (no retry, no dead-letter)
//! and an empty recipient list is skipped. Mail failures are logged per
//! recipient and never reach the caller.

use crate::mailer::{Mail, Mailer};
use crate::templates::{self, Rendered};
use async_trait::async_trait;
use event_hub_core::event::GENERAL_CATEGORY;
use event_hub_core::event_store::{StoreError, SubscriptionStore};
use event_hub_core::notification::{
    ApplicationRegisteredPayload, EventAddedPayload, EventRemovedPayload, EventUpdatedPayload,
    NotificationMessage, PayloadError, Topic, UserRegisteredPayload,
};
use event_hub_runtime::{MessageHandler, spawn_guarded};
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Why a message produced no mail.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Payload missing keys or carrying wrong types.
    #[error("Malformed notification: {0}")]
    Malformed(#[from] PayloadError),

    /// Mailing-list lookup failed.
    #[error("Failed to resolve subscribers: {0}")]
    Subscriptions(#[from] StoreError),
}

/// What [`NotificationDispatcher::dispatch`] did with a message.
#[derive(Debug)]
pub enum Dispatch {
    /// Mail is being sent in the background.
    Scheduled {
        /// Distinct recipients
        recipients: usize,
        /// The background send; awaiting it is optional
        task: JoinHandle<()>,
    },
    /// Nobody to mail.
    NoRecipients,
}

/// Routes notifications to the mail transport.
#[derive(Clone)]
pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
    subscriptions: Arc<dyn SubscriptionStore>,
}

impl NotificationDispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub fn new(mailer: Arc<dyn Mailer>, subscriptions: Arc<dyn SubscriptionStore>) -> Self {
        Self {
            mailer,
            subscriptions,
        }
    }

    /// Decode, resolve and hand `message` to the mailer.
    ///
    /// Returns once sending has been scheduled, not once it has finished.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Malformed`] if the payload does not match its topic,
    /// [`DispatchError::Subscriptions`] if mailing-list lookup fails.
    pub async fn dispatch(&self, message: &NotificationMessage) -> Result<Dispatch, DispatchError> {
        let topic = message.topic;
        let (recipients, rendered) = self.prepare(message).await?;

        if recipients.is_empty() {
            tracing::info!(topic = %topic, "No recipients, skipping notification");
            return Ok(Dispatch::NoRecipients);
        }

        let count = recipients.len();
        tracing::info!(topic = %topic, recipients = count, "Dispatching notification");

        let mailer = Arc::clone(&self.mailer);
        let task = spawn_guarded("notification mail", async move {
            send_all(mailer.as_ref(), topic, recipients, &rendered).await;
            Ok::<(), Infallible>(())
        });

        Ok(Dispatch::Scheduled {
            recipients: count,
            task,
        })
    }

    async fn prepare(
        &self,
        message: &NotificationMessage,
    ) -> Result<(BTreeSet<String>, Rendered), DispatchError> {
        Ok(match message.topic {
            Topic::EventAdded => {
                let payload: EventAddedPayload = message.payload()?;
                let mut recipients: BTreeSet<String> = self
                    .subscriptions
                    .subscribers(GENERAL_CATEGORY)
                    .await?
                    .into_iter()
                    .collect();
                recipients.extend(
                    self.subscriptions
                        .subscribers(payload.event_type.category())
                        .await?,
                );
                (recipients, templates::event_added(&payload))
            },
            Topic::EventUpdated => {
                let payload: EventUpdatedPayload = message.payload()?;
                (unique(&payload.emails), templates::event_updated(&payload))
            },
            Topic::EventRemoved => {
                let payload: EventRemovedPayload = message.payload()?;
                (unique(&payload.emails), templates::event_removed(&payload))
            },
            Topic::ApplicationRegistered => {
                let payload: ApplicationRegisteredPayload = message.payload()?;
                (
                    unique(&payload.emails),
                    templates::application_registered(&payload),
                )
            },
            Topic::UserRegistered => {
                let payload: UserRegisteredPayload = message.payload()?;
                (unique(&payload.emails), templates::user_registered(&payload))
            },
        })
    }
}

fn unique(emails: &[String]) -> BTreeSet<String> {
    emails
        .iter()
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect()
}

async fn send_all(mailer: &dyn Mailer, topic: Topic, recipients: BTreeSet<String>, rendered: &Rendered) {
    for to in recipients {
        let mail = Mail {
            to,
            subject: rendered.subject.clone(),
            text: rendered.text.clone(),
            html: rendered.html.clone(),
        };

        match mailer.send(&mail).await {
            Ok(()) => {
                metrics::counter!("notifications.dispatched", "topic" => topic.as_str()).increment(1);
            },
            Err(e) => {
                metrics::counter!("notifications.mail_failed", "topic" => topic.as_str()).increment(1);
                tracing::warn!(topic = %topic, to = %mail.to, error = %e, "Failed to send mail");
            },
        }
    }
}

#[async_trait]
impl MessageHandler for NotificationDispatcher {
    async fn handle(
        &self,
        message: NotificationMessage,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match self.dispatch(&message).await {
            Ok(_) => Ok(()),
            Err(DispatchError::Malformed(e)) => {
                metrics::counter!("notifications.dropped", "topic" => message.topic.as_str())
                    .increment(1);
                tracing::warn!(
                    topic = %message.topic,
                    missing = ?message.missing_keys(),
                    error = %e,
                    "Dropping malformed notification"
                );
                Ok(())
            },
            Err(e) => Err(Box::new(e)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::mailer::MockMailer;
    use chrono::Utc;
    use event_hub_core::event::EventType;
    use event_hub_testing::mocks::InMemorySubscriptionStore;
    use serde_json::json;

    fn setup() -> (NotificationDispatcher, MockMailer, InMemorySubscriptionStore) {
        let mailer = MockMailer::new();
        let lists = InMemorySubscriptionStore::new();
        let dispatcher = NotificationDispatcher::new(Arc::new(mailer.clone()), Arc::new(lists.clone()));
        (dispatcher, mailer, lists)
    }

    async fn finish(dispatch: Dispatch) -> usize {
        match dispatch {
            Dispatch::Scheduled { recipients, task } => {
                task.await.expect("mail task");
                recipients
            },
            Dispatch::NoRecipients => 0,
        }
    }

    #[tokio::test]
    async fn event_added_mails_union_of_general_and_type_subscribers_once() {
        let (dispatcher, mailer, lists) = setup();
        lists.subscribe("general", "a@giu.edu").await.expect("subscribe");
        lists.subscribe("general", "both@giu.edu").await.expect("subscribe");
        lists.subscribe("workshop", "both@giu.edu").await.expect("subscribe");
        lists.subscribe("workshop", "w@giu.edu").await.expect("subscribe");
        lists.subscribe("meetup", "m@giu.edu").await.expect("subscribe");

        let message = NotificationMessage::from_payload(&EventAddedPayload {
            event_type: EventType::Workshop,
            event_name: "Rust 101".to_string(),
            event_date: Utc::now(),
            event_description: "Ownership".to_string(),
            event_location: "1 Main St,\nCairo,\nCairo,\nEgypt".to_string(),
        })
        .expect("encode");

        let sent = finish(dispatcher.dispatch(&message).await.expect("dispatch")).await;

        assert_eq!(sent, 3);
        assert_eq!(
            mailer.recipients(),
            vec!["a@giu.edu", "both@giu.edu", "w@giu.edu"]
        );
    }

    #[tokio::test]
    async fn removed_event_mails_each_attendee() {
        let (dispatcher, mailer, _) = setup();
        let message = NotificationMessage::from_payload(&EventRemovedPayload {
            emails: vec!["b@giu.edu".to_string(), "a@giu.edu".to_string(), "a@giu.edu".to_string()],
            event_name: "Meetup".to_string(),
            event_date: Utc::now(),
        })
        .expect("encode");

        finish(dispatcher.dispatch(&message).await.expect("dispatch")).await;

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|m| m.subject == "Event cancelled: Meetup"));
    }

    #[tokio::test]
    async fn malformed_payload_sends_nothing() {
        let (dispatcher, mailer, _) = setup();
        let message: NotificationMessage = serde_json::from_value(json!({
            "topic": "event_remove",
            "data": { "emails": ["a@giu.edu"], "event_name": 42 }
        }))
        .expect("envelope");

        let result = dispatcher.dispatch(&message).await;
        assert!(matches!(result, Err(DispatchError::Malformed(_))));
        assert_eq!(message.missing_keys(), vec!["event_date"]);

        // The handler drops it without failing the consumer
        dispatcher.handle(message).await.expect("handled");
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn empty_recipient_list_is_skipped() {
        let (dispatcher, mailer, _) = setup();
        let message = NotificationMessage::from_payload(&EventUpdatedPayload {
            emails: vec![],
            event_name: "Meetup".to_string(),
            event_date: Utc::now(),
            event_description: "Moved".to_string(),
        })
        .expect("encode");

        let dispatch = dispatcher.dispatch(&message).await.expect("dispatch");
        assert!(matches!(dispatch, Dispatch::NoRecipients));
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn one_failing_recipient_does_not_stop_the_rest() {
        let (dispatcher, mailer, _) = setup();
        mailer.fail_for("bad@giu.edu");
        let message = NotificationMessage::from_payload(&UserRegisteredPayload {
            emails: vec!["bad@giu.edu".to_string(), "good@giu.edu".to_string()],
            name: None,
        })
        .expect("encode");

        finish(dispatcher.dispatch(&message).await.expect("dispatch")).await;
        assert_eq!(mailer.recipients(), vec!["good@giu.edu"]);
    }

    #[tokio::test]
    async fn subscription_outage_is_reported() {
        let (dispatcher, _, lists) = setup();
        lists.set_unavailable(true);
        let message = NotificationMessage::from_payload(&EventAddedPayload {
            event_type: EventType::Social,
            event_name: "Party".to_string(),
            event_date: Utc::now(),
            event_description: "Fun".to_string(),
            event_location: "Campus".to_string(),
        })
        .expect("encode");

        let result = dispatcher.dispatch(&message).await;
        assert!(matches!(result, Err(DispatchError::Subscriptions(_))));
        assert!(dispatcher.handle(message).await.is_err());
    }
}
