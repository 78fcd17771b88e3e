//! Persistence traits for events, rosters and mailing-list subscriptions.
//!
//! # Invariants
//!
//! - Every stored event has exactly one roster record, created in the same
//!   write as the event ([`EventStore::insert_event`]) and removed with it
//!   ([`EventStore::delete_event`]).
//! - Roster mutations are conditional and atomic: two concurrent
//!   [`EventStore::add_attendee`] calls for the same email yield exactly one
//!   [`RosterWrite::Changed`].
//! - `number_of_applications` on the event document moves with every changed
//!   roster write and never goes below zero.
//!
//! # Implementations
//!
//! - `PostgresEventStore` (postgres crate): JSONB documents in `PostgreSQL`
//! - `InMemoryEventStore` (testing crate): `HashMap` behind a lock

use crate::event::{Event, EventId};
use crate::roster::{EventApplication, RosterWrite};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by store methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Could not reach the database
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query or transaction failed
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Stored document could not be (de)serialized
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A record with the same key already exists
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Event and roster persistence.
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so the store can be shared as
/// `Arc<dyn EventStore>` and captured by effects.
pub trait EventStore: Send + Sync {
    /// Insert a new event together with its empty roster.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the id is taken, or
    /// [`StoreError::DatabaseError`] if the write fails (nothing is persisted).
    fn insert_event(&self, event: &Event) -> StoreFuture<'_, ()>;

    /// Fetch one event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the lookup fails. A missing event is `Ok(None)`.
    fn find_event(&self, id: EventId) -> StoreFuture<'_, Option<Event>>;

    /// All events, soonest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn list_events(&self) -> StoreFuture<'_, Vec<Event>>;

    /// Replace an existing event document. Returns false if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn update_event(&self, event: &Event) -> StoreFuture<'_, bool>;

    /// Delete an event and its roster. Returns false if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn delete_event(&self, id: EventId) -> StoreFuture<'_, bool>;

    /// Fetch the roster of one event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the lookup fails.
    fn find_application(&self, id: EventId) -> StoreFuture<'_, Option<EventApplication>>;

    /// All rosters.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn list_applications(&self) -> StoreFuture<'_, Vec<EventApplication>>;

    /// Create a roster for an event that has none.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the event already has a roster.
    fn create_application(&self, application: &EventApplication) -> StoreFuture<'_, ()>;

    /// Overwrite an existing roster, syncing the event counter. Returns false
    /// if there is no roster.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn replace_application(&self, application: &EventApplication) -> StoreFuture<'_, bool>;

    /// Delete a roster without touching the event. Returns false if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn delete_application(&self, id: EventId) -> StoreFuture<'_, bool>;

    /// Add `email` to the roster unless already present, incrementing the counter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn add_attendee<'a>(&'a self, id: EventId, email: &'a str) -> StoreFuture<'a, RosterWrite>;

    /// Remove `email` from the roster if present, decrementing the counter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn remove_attendee<'a>(&'a self, id: EventId, email: &'a str)
    -> StoreFuture<'a, RosterWrite>;

    /// Events whose roster contains `email`, soonest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn events_for_attendee<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Vec<Event>>;
}

/// Mailing-list subscriptions, keyed by category (`general` or an event type category).
pub trait SubscriptionStore: Send + Sync {
    /// Add `email` to `category`. Returns false if it was already subscribed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn subscribe<'a>(&'a self, category: &'a str, email: &'a str) -> StoreFuture<'a, bool>;

    /// Remove `email` from `category`. Returns false if it was not subscribed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn unsubscribe<'a>(&'a self, category: &'a str, email: &'a str) -> StoreFuture<'a, bool>;

    /// Subscribers of `category`, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn subscribers<'a>(&'a self, category: &'a str) -> StoreFuture<'a, Vec<String>>;
}
