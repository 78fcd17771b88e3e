//! Event domain types.
//!
//! An [`Event`] is the schedulable thing attendees apply to. Its JSON form
//! mirrors the documents stored by the event store (`type`,
//! `number_of_applications`, `min_capacity`, ...), so the same struct is used
//! for persistence and HTTP responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Subscription category that receives every `event_add` notification.
pub const GENERAL_CATEGORY: &str = "general";

/// Unique identifier of an event (and of its roster record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ValidationError::InvalidId(s.to_string()))
    }
}

/// Kind of event. Serialized in upper snake case (`CAREER_FAIR`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Conference
    Conference,
    /// Workshop
    Workshop,
    /// Meetup
    Meetup,
    /// Social gathering
    Social,
    /// Career fair
    CareerFair,
    /// Graduation ceremony
    Graduation,
    /// Anything else
    Other,
}

impl EventType {
    /// Every event type, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Conference,
        Self::Workshop,
        Self::Meetup,
        Self::Social,
        Self::CareerFair,
        Self::Graduation,
        Self::Other,
    ];

    /// Wire name, as used in JSON documents and payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Conference => "CONFERENCE",
            Self::Workshop => "WORKSHOP",
            Self::Meetup => "MEETUP",
            Self::Social => "SOCIAL",
            Self::CareerFair => "CAREER_FAIR",
            Self::Graduation => "GRADUATION",
            Self::Other => "OTHER",
        }
    }

    /// Subscription category for mailing-list fan-out (`career_fair`).
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Conference => "conference",
            Self::Workshop => "workshop",
            Self::Meetup => "meetup",
            Self::Social => "social",
            Self::CareerFair => "career_fair",
            Self::Graduation => "graduation",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true when `category` is `general` or the category of some event type.
#[must_use]
pub fn is_known_category(category: &str) -> bool {
    category == GENERAL_CATEGORY || EventType::ALL.iter().any(|t| t.category() == category)
}

/// Lifecycle status of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    /// Created, awaiting review
    #[default]
    Pending,
    /// Approved and visible
    Approved,
    /// Cancelled by an organizer
    Cancelled,
}

/// Physical location of an event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    /// Street address
    pub address: String,
    /// City
    pub city: String,
    /// State or region
    pub state: String,
    /// Country
    pub country: String,
}

impl Location {
    /// `address,city,state,country` as carried by registration notifications.
    #[must_use]
    pub fn one_line(&self) -> String {
        format!("{},{},{},{}", self.address, self.city, self.state, self.country)
    }

    /// One component per line, as carried by `event_add` notifications.
    #[must_use]
    pub fn multi_line(&self) -> String {
        format!(
            "{},\n{},\n{},\n{}",
            self.address, self.city, self.state, self.country
        )
    }
}

/// Person responsible for running an event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Organizer {
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
    /// Contact phone
    #[serde(default)]
    pub phone: String,
    /// Role within the event (host, speaker, ...)
    #[serde(default)]
    pub role: String,
}

/// Validation failures for event input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Identifier is not a UUID
    #[error("Invalid ID: {0}")]
    InvalidId(String),

    /// A required field is empty
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Capacity bounds are inverted
    #[error("min_capacity ({min}) cannot exceed max_capacity ({max})")]
    CapacityBounds {
        /// Lower bound
        min: u32,
        /// Upper bound
        max: u32,
    },
}

/// Caller-editable fields of an event, used for both create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    /// Event name
    pub name: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Kind of event
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Scheduled date and time
    pub date: DateTime<Utc>,
    /// Where the event takes place
    pub location: Location,
    /// Minimum attendance
    #[serde(default)]
    pub min_capacity: u32,
    /// Maximum attendance
    #[serde(default)]
    pub max_capacity: u32,
    /// Usher emails
    #[serde(default)]
    pub ushers: Vec<String>,
    /// Organizers
    #[serde(default)]
    pub organizers: Vec<Organizer>,
    /// Status override (update only; ignored on create)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
}

impl EventDetails {
    /// Checks the invariants every stored event must satisfy.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the name is blank or the capacity
    /// bounds are inverted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if self.min_capacity > self.max_capacity {
            return Err(ValidationError::CapacityBounds {
                min: self.min_capacity,
                max: self.max_capacity,
            });
        }
        Ok(())
    }
}

/// A scheduled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier
    pub id: EventId,
    /// Event name
    pub name: String,
    /// Free-text description
    pub description: String,
    /// Kind of event
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Scheduled date and time
    pub date: DateTime<Utc>,
    /// Where the event takes place
    pub location: Location,
    /// Minimum attendance
    pub min_capacity: u32,
    /// Maximum attendance (informational, not enforced)
    pub max_capacity: u32,
    /// Denormalized roster size
    pub number_of_applications: u32,
    /// Usher emails
    pub ushers: Vec<String>,
    /// Organizers
    pub organizers: Vec<Organizer>,
    /// Lifecycle status
    pub status: EventStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Builds a new pending event from caller input.
    #[must_use]
    pub fn new(id: EventId, details: EventDetails, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: details.name,
            description: details.description,
            event_type: details.event_type,
            date: details.date,
            location: details.location,
            min_capacity: details.min_capacity,
            max_capacity: details.max_capacity,
            number_of_applications: 0,
            ushers: details.ushers,
            organizers: details.organizers,
            status: EventStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the editable fields, keeping identity, counter and creation time.
    pub fn apply_details(&mut self, details: EventDetails, now: DateTime<Utc>) {
        self.name = details.name;
        self.description = details.description;
        self.event_type = details.event_type;
        self.date = details.date;
        self.location = details.location;
        self.min_capacity = details.min_capacity;
        self.max_capacity = details.max_capacity;
        self.ushers = details.ushers;
        self.organizers = details.organizers;
        if let Some(status) = details.status {
            self.status = status;
        }
        self.updated_at = now;
    }

    /// An event has occurred once its date is not strictly after `now`.
    #[must_use]
    pub fn has_occurred(&self, now: DateTime<Utc>) -> bool {
        self.date <= now
    }
}
