//! Roster records.
//!
//! Each event owns exactly one [`EventApplication`], created alongside the
//! event and removed with it. Attendees are kept in a set so the same email
//! can never appear twice.

use crate::event::EventId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The set of attendee emails registered for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventApplication {
    /// Event this roster belongs to (doubles as the record id)
    pub event_id: EventId,
    /// Registered attendee emails
    #[serde(default)]
    pub attendees: BTreeSet<String>,
}

impl EventApplication {
    /// An empty roster for `event_id`.
    #[must_use]
    pub const fn empty(event_id: EventId) -> Self {
        Self {
            event_id,
            attendees: BTreeSet::new(),
        }
    }

    /// Builds a roster from any list of emails, dropping duplicates.
    #[must_use]
    pub fn with_attendees<I, S>(event_id: EventId, attendees: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            event_id,
            attendees: attendees.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `email` is on the roster.
    #[must_use]
    pub fn contains(&self, email: &str) -> bool {
        self.attendees.contains(email)
    }

    /// Adds `email`; returns false when it was already present.
    pub fn insert(&mut self, email: impl Into<String>) -> bool {
        self.attendees.insert(email.into())
    }

    /// Removes `email`; returns false when it was not present.
    pub fn remove(&mut self, email: &str) -> bool {
        self.attendees.remove(email)
    }

    /// Number of attendees.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attendees.len()
    }

    /// Whether nobody has applied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attendees.is_empty()
    }

    /// Attendee emails in sorted order.
    #[must_use]
    pub fn emails(&self) -> Vec<String> {
        self.attendees.iter().cloned().collect()
    }
}

/// Outcome of a conditional roster mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterWrite {
    /// The roster was modified
    Changed,
    /// The roster already had the requested shape (duplicate add, absent remove)
    Unchanged,
    /// No roster exists for the event
    Missing,
}
