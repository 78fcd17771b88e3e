//! Router state for the two services.
//!
//! Both are cheap to clone: every field is an `Arc` or a service holding
//! `Arc`s. Handlers get the pieces they need through `State` and the auth
//! extractors get the verifier through [`FromRef`].

use crate::app::{ApplicationService, EventService};
use axum::extract::FromRef;
use event_hub_auth::TokenVerifier;
use event_hub_core::environment::Clock;
use event_hub_core::event_bus::EventBus;
use event_hub_core::event_store::{EventStore, SubscriptionStore};
use event_hub_notifications::NotificationDispatcher;
use event_hub_web::handlers::health::ReadinessCheck;
use std::sync::Arc;

/// State of the event service router.
#[derive(Clone)]
pub struct AppState {
    /// Event lifecycle and reads
    pub events: EventService,
    /// Apply, unapply and roster records
    pub applications: ApplicationService,
    /// Bearer token verification
    pub verifier: Arc<dyn TokenVerifier>,
    /// Dependencies probed by `/ready`
    pub readiness: Arc<[Arc<dyn ReadinessCheck>]>,
}

impl AppState {
    /// Wire the services over one store, bus and clock.
    #[must_use]
    pub fn new(
        store: Arc<dyn EventStore>,
        bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            events: EventService::new(Arc::clone(&store), Arc::clone(&bus), Arc::clone(&clock)),
            applications: ApplicationService::new(store, bus, clock),
            verifier,
            readiness: Arc::from(Vec::new()),
        }
    }

    /// Probe `checks` on `/ready`.
    #[must_use]
    pub fn with_readiness(mut self, checks: Vec<Arc<dyn ReadinessCheck>>) -> Self {
        self.readiness = Arc::from(checks);
        self
    }
}

impl FromRef<AppState> for Arc<dyn TokenVerifier> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.verifier)
    }
}

/// State of the notification service router.
#[derive(Clone)]
pub struct NotificationState {
    /// Turns envelopes into mail
    pub dispatcher: NotificationDispatcher,
    /// Mailing lists
    pub subscriptions: Arc<dyn SubscriptionStore>,
    /// Bearer token verification
    pub verifier: Arc<dyn TokenVerifier>,
    /// Dependencies probed by `/ready`
    pub readiness: Arc<[Arc<dyn ReadinessCheck>]>,
}

impl NotificationState {
    /// Create the state.
    #[must_use]
    pub fn new(
        dispatcher: NotificationDispatcher,
        subscriptions: Arc<dyn SubscriptionStore>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            dispatcher,
            subscriptions,
            verifier,
            readiness: Arc::from(Vec::new()),
        }
    }

    /// Probe `checks` on `/ready`.
    #[must_use]
    pub fn with_readiness(mut self, checks: Vec<Arc<dyn ReadinessCheck>>) -> Self {
        self.readiness = Arc::from(checks);
        self
    }
}

impl FromRef<NotificationState> for Arc<dyn TokenVerifier> {
    fn from_ref(state: &NotificationState) -> Self {
        Arc::clone(&state.verifier)
    }
}
