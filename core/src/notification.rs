//! Notification topics and payloads.
//!
//! Every message that crosses the bus is a [`NotificationMessage`]: a
//! [`Topic`] plus a flat JSON object. Producers build messages from the typed
//! payload structs below and consumers decode them back, so the required keys
//! for each topic live in exactly one place.
//!
//! | Topic             | Required keys                                                                     |
//! |-------------------|-----------------------------------------------------------------------------------|
//! | `event_add`       | `event_type`, `event_name`, `event_date`, `event_description`, `event_location`   |
//! | `event_update`    | `emails`, `event_name`, `event_date`, `event_description`                         |
//! | `event_remove`    | `emails`, `event_name`, `event_date`                                              |
//! | `event_register`  | `emails`, `event_name`, `event_date`, `event_location`                            |
//! | `user_registered` | `emails`                                                                          |

use crate::event::{Event, EventType};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Notification topic, serialized by its wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Topic {
    /// A new event was created
    #[serde(rename = "event_add")]
    EventAdded,
    /// An event with attendees was modified
    #[serde(rename = "event_update")]
    EventUpdated,
    /// An upcoming event with attendees was deleted
    #[serde(rename = "event_remove")]
    EventRemoved,
    /// Someone applied to an event
    #[serde(rename = "event_register")]
    ApplicationRegistered,
    /// An account was created
    #[serde(rename = "user_registered")]
    UserRegistered,
}

impl Topic {
    /// Every topic the notification service consumes.
    pub const ALL: [Self; 5] = [
        Self::EventAdded,
        Self::EventUpdated,
        Self::EventRemoved,
        Self::ApplicationRegistered,
        Self::UserRegistered,
    ];

    /// Wire name of the topic.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EventAdded => "event_add",
            Self::EventUpdated => "event_update",
            Self::EventRemoved => "event_remove",
            Self::ApplicationRegistered => "event_register",
            Self::UserRegistered => "user_registered",
        }
    }

    /// Keys a payload for this topic must carry.
    #[must_use]
    pub const fn required_keys(&self) -> &'static [&'static str] {
        match self {
            Self::EventAdded => &[
                "event_type",
                "event_name",
                "event_date",
                "event_description",
                "event_location",
            ],
            Self::EventUpdated => &["emails", "event_name", "event_date", "event_description"],
            Self::EventRemoved => &["emails", "event_name", "event_date"],
            Self::ApplicationRegistered => {
                &["emails", "event_name", "event_date", "event_location"]
            },
            Self::UserRegistered => &["emails"],
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|topic| topic.as_str() == s)
            .ok_or_else(|| PayloadError::UnknownTopic(s.to_string()))
    }
}

/// Errors building or decoding notification payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Topic name is not one of [`Topic::ALL`]
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    /// Payload was decoded as the wrong topic
    #[error("Expected topic '{expected}', got '{actual}'")]
    TopicMismatch {
        /// Topic the caller asked for
        expected: Topic,
        /// Topic the message carries
        actual: Topic,
    },

    /// Payload is missing keys or has the wrong shape
    #[error("Malformed payload for topic '{topic}': {reason}")]
    Malformed {
        /// Topic of the message
        topic: Topic,
        /// Decoder message
        reason: String,
    },

    /// Payload could not be encoded
    #[error("Failed to encode payload: {0}")]
    Encode(String),
}

/// Typed payload bound to one topic.
pub trait TopicPayload: Serialize + DeserializeOwned {
    /// The topic this payload travels on.
    const TOPIC: Topic;
}

/// Envelope published on the bus: `{"topic": ..., "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Topic
    pub topic: Topic,
    /// Flat key/value payload
    pub data: Map<String, Value>,
}

impl NotificationMessage {
    /// Wraps a typed payload.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Encode`] if the payload does not serialize to a
    /// JSON object.
    pub fn from_payload<P: TopicPayload>(payload: &P) -> Result<Self, PayloadError> {
        match serde_json::to_value(payload) {
            Ok(Value::Object(data)) => Ok(Self {
                topic: P::TOPIC,
                data,
            }),
            Ok(other) => Err(PayloadError::Encode(format!(
                "expected a JSON object, got {other}"
            ))),
            Err(e) => Err(PayloadError::Encode(e.to_string())),
        }
    }

    /// Decodes the data as the typed payload for `P::TOPIC`.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::TopicMismatch`] when the message carries a
    /// different topic, or [`PayloadError::Malformed`] when required keys are
    /// missing or mistyped.
    pub fn payload<P: TopicPayload>(&self) -> Result<P, PayloadError> {
        if self.topic != P::TOPIC {
            return Err(PayloadError::TopicMismatch {
                expected: P::TOPIC,
                actual: self.topic,
            });
        }
        serde_json::from_value(Value::Object(self.data.clone())).map_err(|e| {
            PayloadError::Malformed {
                topic: self.topic,
                reason: e.to_string(),
            }
        })
    }

    /// Keys required by the topic that are absent from `data`.
    #[must_use]
    pub fn missing_keys(&self) -> Vec<&'static str> {
        self.topic
            .required_keys()
            .iter()
            .copied()
            .filter(|key| !self.data.contains_key(*key))
            .collect()
    }

    /// JSON bytes for the wire.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Encode`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PayloadError> {
        serde_json::to_vec(self).map_err(|e| PayloadError::Encode(e.to_string()))
    }

    /// Parses a message from wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::UnknownTopic`] for an unrecognised topic and
    /// [`PayloadError::Encode`] for anything that is not an envelope.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PayloadError> {
        let raw: Value =
            serde_json::from_slice(bytes).map_err(|e| PayloadError::Encode(e.to_string()))?;
        if let Some(topic) = raw.get("topic").and_then(Value::as_str) {
            topic.parse::<Topic>()?;
        }
        serde_json::from_value(raw).map_err(|e| PayloadError::Encode(e.to_string()))
    }
}

/// `event_add`: announce a new event to mailing-list subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventAddedPayload {
    /// Type of the new event
    pub event_type: EventType,
    /// Name
    pub event_name: String,
    /// Scheduled date
    pub event_date: DateTime<Utc>,
    /// Description
    pub event_description: String,
    /// Location, one component per line
    pub event_location: String,
}

impl TopicPayload for EventAddedPayload {
    const TOPIC: Topic = Topic::EventAdded;
}

impl From<&Event> for EventAddedPayload {
    fn from(event: &Event) -> Self {
        Self {
            event_type: event.event_type,
            event_name: event.name.clone(),
            event_date: event.date,
            event_description: event.description.clone(),
            event_location: event.location.multi_line(),
        }
    }
}

/// `event_update`: tell attendees an event changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventUpdatedPayload {
    /// Attendees to notify
    pub emails: Vec<String>,
    /// Name after the update
    pub event_name: String,
    /// Date after the update
    pub event_date: DateTime<Utc>,
    /// Description after the update
    pub event_description: String,
}

impl TopicPayload for EventUpdatedPayload {
    const TOPIC: Topic = Topic::EventUpdated;
}

/// `event_remove`: tell attendees an upcoming event was cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRemovedPayload {
    /// Attendees to notify
    pub emails: Vec<String>,
    /// Name of the removed event
    pub event_name: String,
    /// Date the event would have taken place
    pub event_date: DateTime<Utc>,
}

impl TopicPayload for EventRemovedPayload {
    const TOPIC: Topic = Topic::EventRemoved;
}

/// `event_register`: confirm an application to the applicant(s).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRegisteredPayload {
    /// Applicants to notify
    pub emails: Vec<String>,
    /// Name
    pub event_name: String,
    /// Date
    pub event_date: DateTime<Utc>,
    /// Location on a single line
    pub event_location: String,
}

impl TopicPayload for ApplicationRegisteredPayload {
    const TOPIC: Topic = Topic::ApplicationRegistered;
}

impl ApplicationRegisteredPayload {
    /// Registration notice for `emails` about `event`.
    #[must_use]
    pub fn for_event(event: &Event, emails: Vec<String>) -> Self {
        Self {
            emails,
            event_name: event.name.clone(),
            event_date: event.date,
            event_location: event.location.one_line(),
        }
    }
}

/// `user_registered`: welcome a newly created account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegisteredPayload {
    /// New account emails
    pub emails: Vec<String>,
    /// Display name, when the producer knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl TopicPayload for UserRegisteredPayload {
    const TOPIC: Topic = Topic::UserRegistered;
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn removed() -> EventRemovedPayload {
        EventRemovedPayload {
            emails: vec!["a@x.io".to_string()],
            event_name: "Meetup".to_string(),
            event_date: "2030-01-01T10:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn topic_wire_names_round_trip() {
        for topic in Topic::ALL {
            assert_eq!(topic.as_str().parse::<Topic>(), Ok(topic));
            let json = serde_json::to_value(topic).expect("serialize");
            assert_eq!(json, json!(topic.as_str()));
        }
        assert!("event_added".parse::<Topic>().is_err());
    }

    #[test]
    fn envelope_shape_is_topic_and_flat_data() {
        let message = NotificationMessage::from_payload(&removed()).expect("encode");
        let json = serde_json::to_value(&message).expect("serialize");
        assert_eq!(json["topic"], "event_remove");
        assert_eq!(json["data"]["emails"], json!(["a@x.io"]));
        assert_eq!(json["data"]["event_name"], "Meetup");
        assert!(message.missing_keys().is_empty());
    }

    #[test]
    fn decoding_with_wrong_type_is_topic_mismatch() {
        let message = NotificationMessage::from_payload(&removed()).expect("encode");
        let err = message.payload::<EventUpdatedPayload>().unwrap_err();
        assert!(matches!(err, PayloadError::TopicMismatch { .. }));
    }

    #[test]
    fn missing_keys_are_reported_and_malformed() {
        let mut data = Map::new();
        data.insert("event_name".to_string(), json!("Meetup"));
        let message = NotificationMessage {
            topic: Topic::EventRemoved,
            data,
        };
        assert_eq!(message.missing_keys(), vec!["emails", "event_date"]);
        assert!(matches!(
            message.payload::<EventRemovedPayload>(),
            Err(PayloadError::Malformed { .. })
        ));
    }

    #[test]
    fn from_slice_rejects_unknown_topics() {
        let bytes = br#"{"topic":"event_explode","data":{}}"#;
        assert_eq!(
            NotificationMessage::from_slice(bytes),
            Err(PayloadError::UnknownTopic("event_explode".to_string()))
        );

        let message = NotificationMessage::from_payload(&removed()).expect("encode");
        let bytes = message.to_bytes().expect("bytes");
        assert_eq!(NotificationMessage::from_slice(&bytes), Ok(message));
    }
}
