//! Application services: the operations behind the HTTP handlers.
//!
//! Services coordinate the store, the roster tracker and the emitter:
//! 1. Validate input
//! 2. Read or write the store
//! 3. Emit the matching notification
//! 4. Return the result
//!
//! Apply and unapply run through the RSVP reducer on a per-request
//! [`Store`]; everything else is a direct store call.

use crate::aggregates::{
    RsvpAction, RsvpEnvironment, RsvpFailure, RsvpOutcome, RsvpReducer, RsvpRejection, RsvpState,
};
use crate::app::emitter::{EmitError, Emitter};
use crate::app::roster::RosterTracker;
use event_hub_core::environment::Clock;
use event_hub_core::event::{Event, EventDetails, EventId, ValidationError};
use event_hub_core::event_bus::EventBus;
use event_hub_core::event_store::{EventStore, StoreError};
use event_hub_core::notification::{
    ApplicationRegisteredPayload, EventAddedPayload, EventRemovedPayload, EventUpdatedPayload,
};
use event_hub_core::roster::EventApplication;
use event_hub_runtime::Store;
use event_hub_web::AppError;
use std::sync::Arc;
use thiserror::Error;

const EVENT_NOT_FOUND: &str = "Event not found";
const APPLICATION_NOT_FOUND: &str = "Event app not found";

/// Errors returned by the services.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Input failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Event or roster record absent
    #[error("{0}")]
    NotFound(&'static str),

    /// An RSVP precondition did not hold
    #[error("{0}")]
    Rejected(RsvpRejection),

    /// Store operation failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Nothing was committed because the notification could not be published
    #[error("Notification error: {0}")]
    Notification(#[from] EmitError),

    /// The change committed but its notification was not published
    #[error("Partial failure for event {event_id}: {reason}")]
    PartialFailure {
        /// The event whose change committed
        event_id: EventId,
        /// Why publishing failed
        reason: String,
    },

    /// The RSVP request failed in the store
    #[error("RSVP failed: {0}")]
    Rsvp(RsvpFailure),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(e) => Self::validation(e.to_string()),
            ServiceError::NotFound(message) => Self::not_found(message),
            ServiceError::Rejected(rejection) => match rejection {
                RsvpRejection::RosterNotFound | RsvpRejection::EventNotFound => {
                    Self::not_found(rejection.message())
                },
                RsvpRejection::AlreadyApplied => {
                    Self::rejected("ALREADY_APPLIED", rejection.message())
                },
                RsvpRejection::NotApplied => Self::rejected("NOT_APPLIED", rejection.message()),
                RsvpRejection::EventEnded => Self::rejected("EVENT_ENDED", rejection.message()),
            },
            ServiceError::Store(StoreError::Conflict(message)) => Self::conflict(message),
            other => Self::internal("An internal error occurred").with_source(anyhow::Error::new(other)),
        }
    }
}

/// Log a publish failure that happened after the store committed.
fn partial_failure(event_id: EventId, error: &EmitError) -> ServiceError {
    tracing::error!(
        event_id = %event_id,
        error = %error,
        "Partial failure: change committed but notification not published"
    );
    ServiceError::PartialFailure {
        event_id,
        reason: error.to_string(),
    }
}

// ============================================================================
// Events
// ============================================================================

/// Event lifecycle: create, update, delete and reads.
#[derive(Clone)]
pub struct EventService {
    store: Arc<dyn EventStore>,
    roster: RosterTracker,
    emitter: Emitter,
    clock: Arc<dyn Clock>,
}

impl EventService {
    /// Create the service.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, bus: Arc<dyn EventBus>, clock: Arc<dyn Clock>) -> Self {
        Self {
            roster: RosterTracker::new(Arc::clone(&store)),
            store,
            emitter: Emitter::new(bus),
            clock,
        }
    }

    /// Create an event with an empty roster and announce it.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] for bad input, [`ServiceError::Store`] if
    /// the insert fails, [`ServiceError::PartialFailure`] if the announcement
    /// could not be published after the insert.
    pub async fn create_event(&self, details: EventDetails) -> Result<Event, ServiceError> {
        details.validate()?;

        let event = Event::new(EventId::new(), details, self.clock.now());
        self.store.insert_event(&event).await?;
        tracing::info!(event_id = %event.id, name = %event.name, "Event created");

        self.emitter
            .emit(&EventAddedPayload::from(&event))
            .await
            .map_err(|e| partial_failure(event.id, &e))?;

        Ok(event)
    }

    /// Replace the mutable fields of an event and tell its attendees.
    ///
    /// Attendees are notified only when the roster exists and is non-empty.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] if the event does not exist, otherwise as
    /// for [`Self::create_event`].
    pub async fn update_event(&self, id: EventId, details: EventDetails) -> Result<Event, ServiceError> {
        details.validate()?;

        let mut event = self
            .store
            .find_event(id)
            .await?
            .ok_or(ServiceError::NotFound(EVENT_NOT_FOUND))?;
        event.apply_details(details, self.clock.now());

        if !self.store.update_event(&event).await? {
            return Err(ServiceError::NotFound(EVENT_NOT_FOUND));
        }
        tracing::info!(event_id = %id, "Event updated");

        let attendees = self.roster.roster_for(id).await?.unwrap_or_default();
        if !attendees.is_empty() {
            let payload = EventUpdatedPayload {
                emails: attendees.into_iter().collect(),
                event_name: event.name.clone(),
                event_date: event.date,
                event_description: event.description.clone(),
            };
            self.emitter
                .emit(&payload)
                .await
                .map_err(|e| partial_failure(id, &e))?;
        }

        Ok(event)
    }

    /// Delete an event and its roster, telling attendees of upcoming events.
    ///
    /// The cancellation is published before anything is removed; if that
    /// fails the event stays in place.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] if the event does not exist,
    /// [`ServiceError::Notification`] if the cancellation could not be
    /// published, [`ServiceError::Store`] if the delete fails.
    pub async fn delete_event(&self, id: EventId) -> Result<(), ServiceError> {
        let event = self
            .store
            .find_event(id)
            .await?
            .ok_or(ServiceError::NotFound(EVENT_NOT_FOUND))?;

        let attendees = self.roster.roster_for(id).await?.unwrap_or_default();
        if !event.has_occurred(self.clock.now()) && !attendees.is_empty() {
            self.emitter
                .emit(&EventRemovedPayload {
                    emails: attendees.into_iter().collect(),
                    event_name: event.name.clone(),
                    event_date: event.date,
                })
                .await?;
        }

        if !self.store.delete_event(id).await? {
            return Err(ServiceError::NotFound(EVENT_NOT_FOUND));
        }
        tracing::info!(event_id = %id, "Event deleted");
        Ok(())
    }

    /// All events, soonest first.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Store`] if the read fails.
    pub async fn list_events(&self) -> Result<Vec<Event>, ServiceError> {
        Ok(self.store.list_events().await?)
    }

    /// One event.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] if absent, [`ServiceError::Store`] if the
    /// read fails.
    pub async fn get_event(&self, id: EventId) -> Result<Event, ServiceError> {
        self.store
            .find_event(id)
            .await?
            .ok_or(ServiceError::NotFound(EVENT_NOT_FOUND))
    }

    /// Events whose roster contains `email`.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Store`] if the read fails.
    pub async fn applied_events(&self, email: &str) -> Result<Vec<Event>, ServiceError> {
        Ok(self.store.events_for_attendee(email).await?)
    }
}

// ============================================================================
// Applications
// ============================================================================

/// RSVP transitions and roster record administration.
#[derive(Clone)]
pub struct ApplicationService {
    env: RsvpEnvironment,
}

impl ApplicationService {
    /// Create the service.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, bus: Arc<dyn EventBus>, clock: Arc<dyn Clock>) -> Self {
        Self {
            env: RsvpEnvironment::new(store, bus, clock),
        }
    }

    async fn run(&self, action: RsvpAction) -> Result<RsvpOutcome, ServiceError> {
        let store = Store::new(RsvpState::default(), RsvpReducer, self.env.clone());
        let mut handle = store.send(action).await;
        handle.wait().await;

        store
            .state(|state| state.outcome.clone())
            .await
            .ok_or_else(|| ServiceError::Rsvp(RsvpFailure::Store("RSVP did not finish".to_string())))
    }

    fn settle(event_id: EventId, outcome: RsvpOutcome) -> Result<(), ServiceError> {
        match outcome {
            RsvpOutcome::Applied | RsvpOutcome::Unapplied => Ok(()),
            RsvpOutcome::Rejected(rejection) => Err(ServiceError::Rejected(rejection)),
            RsvpOutcome::Failed(RsvpFailure::Notification(reason)) => {
                Err(ServiceError::PartialFailure { event_id, reason })
            },
            RsvpOutcome::Failed(failure) => Err(ServiceError::Rsvp(failure)),
        }
    }

    /// Add `attendee` to the roster of `event_id` and confirm by mail.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Rejected`] when a precondition fails,
    /// [`ServiceError::PartialFailure`] if the roster changed but the
    /// confirmation was not published, [`ServiceError::Rsvp`] on store
    /// failure.
    pub async fn apply(&self, event_id: EventId, attendee: &str) -> Result<(), ServiceError> {
        let outcome = self
            .run(RsvpAction::Apply {
                event_id,
                attendee: attendee.to_string(),
            })
            .await?;
        Self::settle(event_id, outcome)
    }

    /// Remove `attendee` from the roster of `event_id`.
    ///
    /// # Errors
    ///
    /// As for [`Self::apply`]; nothing is published.
    pub async fn unapply(&self, event_id: EventId, attendee: &str) -> Result<(), ServiceError> {
        let outcome = self
            .run(RsvpAction::Unapply {
                event_id,
                attendee: attendee.to_string(),
            })
            .await?;
        Self::settle(event_id, outcome)
    }

    /// All roster records.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Store`] if the read fails.
    pub async fn list_applications(&self) -> Result<Vec<EventApplication>, ServiceError> {
        Ok(self.env.store.list_applications().await?)
    }

    /// The roster record of one event.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] if the event has no record.
    pub async fn get_application(&self, event_id: EventId) -> Result<EventApplication, ServiceError> {
        self.env
            .store
            .find_application(event_id)
            .await?
            .ok_or(ServiceError::NotFound(APPLICATION_NOT_FOUND))
    }

    /// Create a roster record directly and confirm every listed attendee.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] if the event does not exist,
    /// [`ServiceError::Store`] with [`StoreError::Conflict`] if a record
    /// exists, [`ServiceError::PartialFailure`] if the confirmation was not
    /// published.
    pub async fn create_application(
        &self,
        application: EventApplication,
    ) -> Result<EventApplication, ServiceError> {
        let event_id = application.event_id;
        let event = self
            .env
            .store
            .find_event(event_id)
            .await?
            .ok_or(ServiceError::NotFound(EVENT_NOT_FOUND))?;

        self.env.store.create_application(&application).await?;
        tracing::info!(event_id = %event_id, attendees = application.len(), "Roster record created");

        if !application.is_empty() {
            let payload = ApplicationRegisteredPayload::for_event(&event, application.emails());
            self.env
                .emitter
                .emit(&payload)
                .await
                .map_err(|e| partial_failure(event_id, &e))?;
        }

        Ok(application)
    }

    /// Overwrite the attendees of an existing roster record.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] if the event has no record.
    pub async fn replace_application(
        &self,
        application: EventApplication,
    ) -> Result<EventApplication, ServiceError> {
        if !self.env.store.replace_application(&application).await? {
            return Err(ServiceError::NotFound(APPLICATION_NOT_FOUND));
        }
        tracing::info!(event_id = %application.event_id, attendees = application.len(), "Roster record replaced");
        Ok(application)
    }

    /// Delete the roster record of one event.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] if the event has no record.
    pub async fn delete_application(&self, event_id: EventId) -> Result<(), ServiceError> {
        if !self.env.store.delete_application(event_id).await? {
            return Err(ServiceError::NotFound(APPLICATION_NOT_FOUND));
        }
        tracing::info!(event_id = %event_id, "Roster record deleted");
        Ok(())
    }
}
