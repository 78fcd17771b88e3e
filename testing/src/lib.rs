//! # Event Hub Testing
//!
//! Testing utilities for the Event Hub workspace.
//!
//! This crate provides:
//! - Deterministic clocks (`FixedClock`, `MutableClock`)
//! - In-memory `EventStore`, `SubscriptionStore` and `EventBus`
//! - `ReducerTest` for Given-When-Then reducer tests
//! - proptest strategies for attendee emails
//!
//! ## Example
//!
//! ```ignore
//! use event_hub_testing::mocks::{InMemoryEventBus, InMemoryEventStore, test_clock};
//!
//! #[tokio::test]
//! async fn apply_publishes_registration() {
//!     let store = Arc::new(InMemoryEventStore::new());
//!     let bus = Arc::new(InMemoryEventBus::new());
//!     let service = ApplicationService::new(store.clone(), bus.clone(), Arc::new(test_clock()));
//!
//!     service.apply(event_id, "a@x.com").await?;
//!     assert_eq!(bus.published().len(), 1);
//! }
//! ```

use chrono::{DateTime, Utc};
use event_hub_core::environment::Clock;

mod event_bus;
mod reducer_test;
mod stores;

/// Mock implementations of environment capabilities.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex};

    pub use crate::event_bus::InMemoryEventBus;
    pub use crate::stores::{InMemoryEventStore, InMemorySubscriptionStore};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use event_hub_testing::mocks::FixedClock;
    /// use event_hub_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that tests can move, shared across clones.
    ///
    /// Used to let an event "end" between two requests.
    #[derive(Debug, Clone)]
    pub struct MutableClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl MutableClock {
        /// Create a clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Jump to `time`
        #[allow(clippy::unwrap_used)]
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap() = time;
        }

        /// Move forward by `by`
        #[allow(clippy::unwrap_used)]
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap();
            *time += by;
        }
    }

    impl Clock for MutableClock {
        #[allow(clippy::unwrap_used)]
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap()
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_time())
    }

    /// The instant [`test_clock`] is pinned to
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which cannot happen.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc)
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::collection::btree_set;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    /// Lowercase `local@domain.tld` addresses.
    pub fn email() -> impl Strategy<Value = String> {
        ("[a-z][a-z0-9]{0,11}", "[a-z]{1,8}", "(com|io|de|org)")
            .prop_map(|(local, domain, tld)| format!("{local}@{domain}.{tld}"))
    }

    /// Distinct attendee emails, up to `max` of them.
    pub fn email_set(max: usize) -> impl Strategy<Value = BTreeSet<String>> {
        btree_set(email(), 0..=max)
    }
}

// Re-export commonly used items
pub use mocks::{
    FixedClock, InMemoryEventBus, InMemoryEventStore, InMemorySubscriptionStore, MutableClock,
    test_clock, test_time,
};
pub use reducer_test::{ReducerTest, assertions};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_never_moves() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now(), test_time());
    }

    #[test]
    fn mutable_clock_is_shared_between_clones() {
        let clock = MutableClock::new(test_time());
        let other = clock.clone();
        other.advance(chrono::Duration::hours(2));
        assert_eq!(clock.now(), test_time() + chrono::Duration::hours(2));
    }
}
