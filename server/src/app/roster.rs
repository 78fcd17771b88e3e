//! Roster tracker: one entry per attendee per event, plus the applicant counter.
//!
//! Every mutation goes through the store's conditional write, so a duplicate
//! add or an absent remove is reported instead of corrupting the roster.

use event_hub_core::event::EventId;
use event_hub_core::event_store::{EventStore, StoreError};
use event_hub_core::roster::RosterWrite;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Membership operations over the rosters held by an [`EventStore`].
#[derive(Clone)]
pub struct RosterTracker {
    store: Arc<dyn EventStore>,
}

impl RosterTracker {
    /// Track rosters in `store`.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Add `email` unless present, incrementing the counter on change.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    pub async fn add_attendee(&self, event_id: EventId, email: &str) -> Result<RosterWrite, StoreError> {
        let outcome = self.store.add_attendee(event_id, email).await?;
        tracing::debug!(event_id = %event_id, attendee = %email, ?outcome, "Roster add");
        Ok(outcome)
    }

    /// Remove `email` if present, decrementing the counter on change.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    pub async fn remove_attendee(
        &self,
        event_id: EventId,
        email: &str,
    ) -> Result<RosterWrite, StoreError> {
        let outcome = self.store.remove_attendee(event_id, email).await?;
        tracing::debug!(event_id = %event_id, attendee = %email, ?outcome, "Roster remove");
        Ok(outcome)
    }

    /// Whether `email` is on the roster. A missing roster contains nobody.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the lookup fails.
    pub async fn contains(&self, event_id: EventId, email: &str) -> Result<bool, StoreError> {
        Ok(self
            .store
            .find_application(event_id)
            .await?
            .is_some_and(|roster| roster.contains(email)))
    }

    /// The attendees of `event_id`, or `None` when the event has no roster.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the lookup fails.
    pub async fn roster_for(&self, event_id: EventId) -> Result<Option<BTreeSet<String>>, StoreError> {
        Ok(self
            .store
            .find_application(event_id)
            .await?
            .map(|roster| roster.attendees))
    }
}
