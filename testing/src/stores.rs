//! In-memory event and subscription stores.
//!
//! Each method does its work under a single lock acquisition, which gives the
//! same atomicity the `PostgreSQL` implementation gets from single statements.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use event_hub_core::event::{Event, EventId};
use event_hub_core::event_store::{EventStore, StoreError, StoreFuture, SubscriptionStore};
use event_hub_core::roster::{EventApplication, RosterWrite};
use std::collections::{BTreeSet, HashMap};
use std::future::ready;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct Tables {
    events: HashMap<EventId, Event>,
    applications: HashMap<EventId, EventApplication>,
}

impl Tables {
    fn sync_counter(&mut self, id: EventId) {
        let size = self
            .applications
            .get(&id)
            .map_or(0, EventApplication::len);
        if let Some(event) = self.events.get_mut(&id) {
            event.number_of_applications = u32::try_from(size).unwrap_or(u32::MAX);
        }
    }

    fn sorted_events<'a>(events: impl Iterator<Item = &'a Event>) -> Vec<Event> {
        let mut events: Vec<Event> = events.cloned().collect();
        events.sort_by_key(|e| (e.date, e.id));
        events
    }
}

/// `HashMap`-backed [`EventStore`] for tests.
///
/// Clones share the same tables.
#[derive(Clone, Debug, Default)]
pub struct InMemoryEventStore {
    tables: Arc<RwLock<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryEventStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a database error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored events
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.tables.read().unwrap().events.len()
    }

    /// Snapshot of one event, bypassing the trait
    #[must_use]
    pub fn event(&self, id: EventId) -> Option<Event> {
        self.tables.read().unwrap().events.get(&id).cloned()
    }

    /// Snapshot of one roster, bypassing the trait
    #[must_use]
    pub fn roster(&self, id: EventId) -> Option<EventApplication> {
        self.tables.read().unwrap().applications.get(&id).cloned()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::DatabaseError(
                "in-memory store is set to fail".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        self.check()?;
        Ok(f(&self.tables.read().unwrap()))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> Result<T, StoreError> {
        self.check()?;
        Ok(f(&mut self.tables.write().unwrap()))
    }
}

impl EventStore for InMemoryEventStore {
    fn insert_event(&self, event: &Event) -> StoreFuture<'_, ()> {
        let result = self
            .write(|t| {
                if t.events.contains_key(&event.id) {
                    return Err(StoreError::Conflict(format!("event {} exists", event.id)));
                }
                t.events.insert(event.id, event.clone());
                t.applications
                    .insert(event.id, EventApplication::empty(event.id));
                t.sync_counter(event.id);
                Ok(())
            })
            .and_then(|r| r);
        Box::pin(ready(result))
    }

    fn find_event(&self, id: EventId) -> StoreFuture<'_, Option<Event>> {
        Box::pin(ready(self.read(|t| t.events.get(&id).cloned())))
    }

    fn list_events(&self) -> StoreFuture<'_, Vec<Event>> {
        Box::pin(ready(self.read(|t| Tables::sorted_events(t.events.values()))))
    }

    fn update_event(&self, event: &Event) -> StoreFuture<'_, bool> {
        let result = self.write(|t| match t.events.get_mut(&event.id) {
            Some(stored) => {
                // The roster owns the counter
                let applicants = stored.number_of_applications;
                *stored = event.clone();
                stored.number_of_applications = applicants;
                true
            },
            None => false,
        });
        Box::pin(ready(result))
    }

    fn delete_event(&self, id: EventId) -> StoreFuture<'_, bool> {
        let result = self.write(|t| {
            t.applications.remove(&id);
            t.events.remove(&id).is_some()
        });
        Box::pin(ready(result))
    }

    fn find_application(&self, id: EventId) -> StoreFuture<'_, Option<EventApplication>> {
        Box::pin(ready(self.read(|t| t.applications.get(&id).cloned())))
    }

    fn list_applications(&self) -> StoreFuture<'_, Vec<EventApplication>> {
        let result = self.read(|t| {
            let mut all: Vec<EventApplication> = t.applications.values().cloned().collect();
            all.sort_by_key(|a| a.event_id);
            all
        });
        Box::pin(ready(result))
    }

    fn create_application(&self, application: &EventApplication) -> StoreFuture<'_, ()> {
        let result = self
            .write(|t| {
                if t.applications.contains_key(&application.event_id) {
                    return Err(StoreError::Conflict(format!(
                        "event {} already has an application record",
                        application.event_id
                    )));
                }
                t.applications
                    .insert(application.event_id, application.clone());
                t.sync_counter(application.event_id);
                Ok(())
            })
            .and_then(|r| r);
        Box::pin(ready(result))
    }

    fn replace_application(&self, application: &EventApplication) -> StoreFuture<'_, bool> {
        let result = self.write(|t| match t.applications.get_mut(&application.event_id) {
            Some(stored) => {
                stored.attendees.clone_from(&application.attendees);
                t.sync_counter(application.event_id);
                true
            },
            None => false,
        });
        Box::pin(ready(result))
    }

    fn delete_application(&self, id: EventId) -> StoreFuture<'_, bool> {
        Box::pin(ready(self.write(|t| t.applications.remove(&id).is_some())))
    }

    fn add_attendee<'a>(&'a self, id: EventId, email: &'a str) -> StoreFuture<'a, RosterWrite> {
        let result = self.write(|t| {
            let Some(roster) = t.applications.get_mut(&id) else {
                return RosterWrite::Missing;
            };
            if !roster.insert(email) {
                return RosterWrite::Unchanged;
            }
            if let Some(event) = t.events.get_mut(&id) {
                event.number_of_applications = event.number_of_applications.saturating_add(1);
            }
            RosterWrite::Changed
        });
        Box::pin(ready(result))
    }

    fn remove_attendee<'a>(
        &'a self,
        id: EventId,
        email: &'a str,
    ) -> StoreFuture<'a, RosterWrite> {
        let result = self.write(|t| {
            let Some(roster) = t.applications.get_mut(&id) else {
                return RosterWrite::Missing;
            };
            if !roster.remove(email) {
                return RosterWrite::Unchanged;
            }
            if let Some(event) = t.events.get_mut(&id) {
                event.number_of_applications = event.number_of_applications.saturating_sub(1);
            }
            RosterWrite::Changed
        });
        Box::pin(ready(result))
    }

    fn events_for_attendee<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Vec<Event>> {
        let result = self.read(|t| {
            Tables::sorted_events(
                t.applications
                    .values()
                    .filter(|a| a.contains(email))
                    .filter_map(|a| t.events.get(&a.event_id)),
            )
        });
        Box::pin(ready(result))
    }
}

/// `HashMap`-backed [`SubscriptionStore`] for tests.
#[derive(Clone, Debug, Default)]
pub struct InMemorySubscriptionStore {
    lists: Arc<RwLock<HashMap<String, BTreeSet<String>>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemorySubscriptionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a database error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::DatabaseError(
                "in-memory subscription store is set to fail".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl SubscriptionStore for InMemorySubscriptionStore {
    fn subscribe<'a>(&'a self, category: &'a str, email: &'a str) -> StoreFuture<'a, bool> {
        let result = self.check().map(|()| {
            self.lists
                .write()
                .unwrap()
                .entry(category.to_string())
                .or_default()
                .insert(email.to_string())
        });
        Box::pin(ready(result))
    }

    fn unsubscribe<'a>(&'a self, category: &'a str, email: &'a str) -> StoreFuture<'a, bool> {
        let result = self.check().map(|()| {
            self.lists
                .write()
                .unwrap()
                .get_mut(category)
                .is_some_and(|list| list.remove(email))
        });
        Box::pin(ready(result))
    }

    fn subscribers<'a>(&'a self, category: &'a str) -> StoreFuture<'a, Vec<String>> {
        let result = self.check().map(|()| {
            self.lists
                .read()
                .unwrap()
                .get(category)
                .map(|list| list.iter().cloned().collect())
                .unwrap_or_default()
        });
        Box::pin(ready(result))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use event_hub_core::event::{EventDetails, EventType, Location};

    fn event(days: i64) -> Event {
        Event::new(
            EventId::new(),
            EventDetails {
                name: format!("Event in {days} days"),
                description: String::new(),
                event_type: EventType::Meetup,
                date: Utc::now() + Duration::days(days),
                location: Location::default(),
                min_capacity: 0,
                max_capacity: 10,
                ushers: vec![],
                organizers: vec![],
                status: None,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn insert_creates_an_empty_roster() {
        let store = InMemoryEventStore::new();
        let e = event(1);
        store.insert_event(&e).await.expect("insert");

        let roster = store.find_application(e.id).await.expect("find");
        assert_eq!(roster, Some(EventApplication::empty(e.id)));
        assert!(matches!(
            store.insert_event(&e).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn add_and_remove_move_the_counter() {
        let store = InMemoryEventStore::new();
        let e = event(1);
        store.insert_event(&e).await.expect("insert");

        assert_eq!(
            store.add_attendee(e.id, "a@x.io").await.expect("add"),
            RosterWrite::Changed
        );
        assert_eq!(
            store.add_attendee(e.id, "a@x.io").await.expect("add"),
            RosterWrite::Unchanged
        );
        assert_eq!(store.event(e.id).expect("event").number_of_applications, 1);

        assert_eq!(
            store.remove_attendee(e.id, "a@x.io").await.expect("remove"),
            RosterWrite::Changed
        );
        assert_eq!(
            store.remove_attendee(e.id, "a@x.io").await.expect("remove"),
            RosterWrite::Unchanged
        );
        assert_eq!(store.event(e.id).expect("event").number_of_applications, 0);
    }

    #[tokio::test]
    async fn roster_writes_without_record_are_missing() {
        let store = InMemoryEventStore::new();
        let e = event(1);
        store.insert_event(&e).await.expect("insert");
        store.delete_application(e.id).await.expect("delete");

        assert_eq!(
            store.add_attendee(e.id, "a@x.io").await.expect("add"),
            RosterWrite::Missing
        );
    }

    #[tokio::test]
    async fn delete_cascades_and_attendee_view_is_sorted() {
        let store = InMemoryEventStore::new();
        let later = event(5);
        let sooner = event(2);
        for e in [&later, &sooner] {
            store.insert_event(e).await.expect("insert");
            store.add_attendee(e.id, "a@x.io").await.expect("add");
        }

        let mine = store.events_for_attendee("a@x.io").await.expect("query");
        assert_eq!(
            mine.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![sooner.id, later.id]
        );

        assert!(store.delete_event(sooner.id).await.expect("delete"));
        assert!(store.roster(sooner.id).is_none());
        assert!(!store.delete_event(sooner.id).await.expect("delete"));
    }

    #[tokio::test]
    async fn replace_application_recomputes_counter() {
        let store = InMemoryEventStore::new();
        let e = event(1);
        store.insert_event(&e).await.expect("insert");

        let replaced = EventApplication::with_attendees(e.id, ["a@x.io", "b@x.io", "c@x.io"]);
        assert!(store.replace_application(&replaced).await.expect("replace"));
        assert_eq!(store.event(e.id).expect("event").number_of_applications, 3);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = InMemoryEventStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.list_events().await,
            Err(StoreError::DatabaseError(_))
        ));
    }

    #[tokio::test]
    async fn subscriptions_are_unique_per_category() {
        let subs = InMemorySubscriptionStore::new();
        assert!(subs.subscribe("general", "a@x.io").await.expect("sub"));
        assert!(!subs.subscribe("general", "a@x.io").await.expect("sub"));
        assert!(subs.subscribe("meetup", "a@x.io").await.expect("sub"));
        assert_eq!(
            subs.subscribers("general").await.expect("list"),
            vec!["a@x.io".to_string()]
        );
        assert!(subs.unsubscribe("general", "a@x.io").await.expect("unsub"));
        assert!(subs.subscribers("general").await.expect("list").is_empty());
    }
}
