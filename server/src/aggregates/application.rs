//! RSVP state machine.
//!
//! Per (event, attendee) the states are `NotApplied` and `Applied`. A request
//! runs through one short-lived [`Store`](event_hub_runtime::Store):
//!
//! ```text
//! Apply/Unapply ──load──▶ SnapshotLoaded ──check──▶ RosterWritten ──emit──▶ Emitted
//!                              │                         │
//!                              └──── Rejected ◀──────────┘
//! ```
//!
//! The reducer only validates and records the outcome. Store reads, the
//! conditional roster write and the bus publish are effects whose results
//! come back as actions.

use crate::app::emitter::Emitter;
use crate::app::roster::RosterTracker;
use event_hub_core::environment::Clock;
use event_hub_core::event::{Event, EventId};
use event_hub_core::event_bus::EventBus;
use event_hub_core::event_store::EventStore;
use event_hub_core::notification::ApplicationRegisteredPayload;
use event_hub_core::roster::RosterWrite;
use event_hub_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// State
// ============================================================================

/// Which transition was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsvpKind {
    /// `NotApplied → Applied`
    Apply,
    /// `Applied → NotApplied`
    Unapply,
}

/// The request being processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsvpRequest {
    /// Apply or unapply
    pub kind: RsvpKind,
    /// Target event
    pub event_id: EventId,
    /// Attendee email, taken from the verified token
    pub attendee: String,
}

/// A precondition that did not hold. Nothing was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsvpRejection {
    /// The event has no roster record
    RosterNotFound,
    /// The event does not exist
    EventNotFound,
    /// The attendee is already on the roster
    AlreadyApplied,
    /// The attendee is not on the roster
    NotApplied,
    /// The event date is not in the future
    EventEnded,
}

impl RsvpRejection {
    /// Client-facing message.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::RosterNotFound => "Event app not found",
            Self::EventNotFound => "Event not found",
            Self::AlreadyApplied => "You already applied to this event",
            Self::NotApplied => "You have not applied to this event",
            Self::EventEnded => "Event has ended",
        }
    }
}

impl fmt::Display for RsvpRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// An infrastructure failure while processing the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RsvpFailure {
    /// A store read or write failed; nothing was committed by this request
    #[error("Store error: {0}")]
    Store(String),
    /// The roster change committed but the notification was not published
    #[error("Roster updated but registration not published: {0}")]
    Notification(String),
}

/// How the request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RsvpOutcome {
    /// The attendee was added and the registration was published
    Applied,
    /// The attendee was removed
    Unapplied,
    /// A precondition failed
    Rejected(RsvpRejection),
    /// Infrastructure failed
    Failed(RsvpFailure),
}

/// Progress of the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RsvpPhase {
    /// No command received yet
    #[default]
    Idle,
    /// Reading roster and event
    Loading,
    /// Conditional roster write in flight
    Writing,
    /// Publishing the registration
    Emitting,
    /// Outcome recorded
    Done,
}

/// Snapshot and progress of one RSVP request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RsvpState {
    /// The request, once a command arrives
    pub request: Option<RsvpRequest>,
    /// The event as loaded from the store
    pub event: Option<Event>,
    /// Where the request is
    pub phase: RsvpPhase,
    /// Set when the phase reaches [`RsvpPhase::Done`]
    pub outcome: Option<RsvpOutcome>,
}

impl RsvpState {
    fn finish(&mut self, outcome: RsvpOutcome) {
        self.phase = RsvpPhase::Done;
        self.outcome = Some(outcome);
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Commands from the service and results fed back by effects.
#[derive(Debug, Clone, PartialEq)]
pub enum RsvpAction {
    // Commands
    /// Add `attendee` to the roster of `event_id`
    Apply {
        /// Event
        event_id: EventId,
        /// Attendee email
        attendee: String,
    },

    /// Remove `attendee` from the roster of `event_id`
    Unapply {
        /// Event
        event_id: EventId,
        /// Attendee email
        attendee: String,
    },

    // Events
    /// Roster and event read from the store
    SnapshotLoaded {
        /// Roster attendees, `None` without a roster record
        roster: Option<BTreeSet<String>>,
        /// The event, `None` if it does not exist
        event: Option<Event>,
    },

    /// Result of the conditional roster write
    RosterWritten(RosterWrite),

    /// The registration notification was published
    Emitted,

    /// An effect failed
    Failed(RsvpFailure),
}

// ============================================================================
// Environment
// ============================================================================

/// Dependencies of the RSVP reducer.
#[derive(Clone)]
pub struct RsvpEnvironment {
    /// Time source for the lifecycle guard
    pub clock: Arc<dyn Clock>,
    /// Roster reads and conditional writes
    pub roster: RosterTracker,
    /// Event reads
    pub store: Arc<dyn EventStore>,
    /// Registration notifications
    pub emitter: Emitter,
}

impl RsvpEnvironment {
    /// Build the environment over a store, a bus and a clock.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, bus: Arc<dyn EventBus>, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            roster: RosterTracker::new(Arc::clone(&store)),
            store,
            emitter: Emitter::new(bus),
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for apply and unapply.
#[derive(Clone, Copy, Debug, Default)]
pub struct RsvpReducer;

impl RsvpReducer {
    /// Preconditions in the order clients observe them: roster record,
    /// membership, event, lifecycle.
    fn check(
        request: &RsvpRequest,
        roster: Option<&BTreeSet<String>>,
        event: Option<&Event>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), RsvpRejection> {
        let roster = roster.ok_or(RsvpRejection::RosterNotFound)?;

        let applied = roster.contains(&request.attendee);
        match request.kind {
            RsvpKind::Apply if applied => return Err(RsvpRejection::AlreadyApplied),
            RsvpKind::Unapply if !applied => return Err(RsvpRejection::NotApplied),
            _ => {},
        }

        let event = event.ok_or(RsvpRejection::EventNotFound)?;
        if event.has_occurred(now) {
            return Err(RsvpRejection::EventEnded);
        }
        Ok(())
    }

    fn start(
        state: &mut RsvpState,
        request: RsvpRequest,
        env: &RsvpEnvironment,
    ) -> SmallVec<[Effect<RsvpAction>; 4]> {
        if state.phase != RsvpPhase::Idle {
            tracing::warn!(event_id = %request.event_id, "RSVP command ignored, request already running");
            return SmallVec::new();
        }

        let event_id = request.event_id;
        state.request = Some(request);
        state.phase = RsvpPhase::Loading;

        let roster = env.roster.clone();
        let store = Arc::clone(&env.store);
        smallvec![Effect::future(async move {
            let roster = match roster.roster_for(event_id).await {
                Ok(roster) => roster,
                Err(e) => return Some(RsvpAction::Failed(RsvpFailure::Store(e.to_string()))),
            };
            Some(match store.find_event(event_id).await {
                Ok(event) => RsvpAction::SnapshotLoaded { roster, event },
                Err(e) => RsvpAction::Failed(RsvpFailure::Store(e.to_string())),
            })
        })]
    }

    fn write(request: &RsvpRequest, env: &RsvpEnvironment) -> Effect<RsvpAction> {
        let roster = env.roster.clone();
        let RsvpRequest {
            kind,
            event_id,
            attendee,
        } = request.clone();

        Effect::future(async move {
            let written = match kind {
                RsvpKind::Apply => roster.add_attendee(event_id, &attendee).await,
                RsvpKind::Unapply => roster.remove_attendee(event_id, &attendee).await,
            };
            Some(match written {
                Ok(outcome) => RsvpAction::RosterWritten(outcome),
                Err(e) => RsvpAction::Failed(RsvpFailure::Store(e.to_string())),
            })
        })
    }

    fn emit(event: &Event, attendee: &str, env: &RsvpEnvironment) -> Effect<RsvpAction> {
        let emitter = env.emitter.clone();
        let payload = ApplicationRegisteredPayload::for_event(event, vec![attendee.to_string()]);

        Effect::future(async move {
            Some(match emitter.emit(&payload).await {
                Ok(()) => RsvpAction::Emitted,
                Err(e) => RsvpAction::Failed(RsvpFailure::Notification(e.to_string())),
            })
        })
    }

    fn record(state: &mut RsvpState, outcome: RsvpOutcome) {
        let label = match &outcome {
            RsvpOutcome::Applied => "applied",
            RsvpOutcome::Unapplied => "unapplied",
            RsvpOutcome::Rejected(_) => "rejected",
            RsvpOutcome::Failed(_) => "failed",
        };
        metrics::counter!("rsvp.outcomes", "outcome" => label).increment(1);

        if let Some(request) = &state.request {
            match &outcome {
                RsvpOutcome::Failed(RsvpFailure::Notification(reason)) => tracing::error!(
                    event_id = %request.event_id,
                    attendee = %request.attendee,
                    reason = %reason,
                    "Partial failure: roster updated but registration not published"
                ),
                RsvpOutcome::Failed(RsvpFailure::Store(reason)) => tracing::error!(
                    event_id = %request.event_id,
                    attendee = %request.attendee,
                    reason = %reason,
                    "RSVP failed"
                ),
                other => tracing::info!(
                    event_id = %request.event_id,
                    attendee = %request.attendee,
                    outcome = ?other,
                    "RSVP finished"
                ),
            }
        }

        state.finish(outcome);
    }
}

impl Reducer for RsvpReducer {
    type State = RsvpState;
    type Action = RsvpAction;
    type Environment = RsvpEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            RsvpAction::Apply { event_id, attendee } => Self::start(
                state,
                RsvpRequest {
                    kind: RsvpKind::Apply,
                    event_id,
                    attendee,
                },
                env,
            ),

            RsvpAction::Unapply { event_id, attendee } => Self::start(
                state,
                RsvpRequest {
                    kind: RsvpKind::Unapply,
                    event_id,
                    attendee,
                },
                env,
            ),

            RsvpAction::SnapshotLoaded { roster, event } => {
                let Some(request) = state.request.clone() else {
                    return SmallVec::new();
                };

                if let Err(rejection) =
                    Self::check(&request, roster.as_ref(), event.as_ref(), env.clock.now())
                {
                    Self::record(state, RsvpOutcome::Rejected(rejection));
                    return SmallVec::new();
                }

                state.event = event;
                state.phase = RsvpPhase::Writing;
                smallvec![Self::write(&request, env)]
            },

            RsvpAction::RosterWritten(written) => {
                let Some(request) = state.request.clone() else {
                    return SmallVec::new();
                };

                match (request.kind, written) {
                    (_, RosterWrite::Missing) => {
                        Self::record(state, RsvpOutcome::Rejected(RsvpRejection::RosterNotFound));
                        SmallVec::new()
                    },
                    // Lost a race with a concurrent request for the same attendee
                    (RsvpKind::Apply, RosterWrite::Unchanged) => {
                        Self::record(state, RsvpOutcome::Rejected(RsvpRejection::AlreadyApplied));
                        SmallVec::new()
                    },
                    (RsvpKind::Unapply, RosterWrite::Unchanged) => {
                        Self::record(state, RsvpOutcome::Rejected(RsvpRejection::NotApplied));
                        SmallVec::new()
                    },
                    (RsvpKind::Unapply, RosterWrite::Changed) => {
                        Self::record(state, RsvpOutcome::Unapplied);
                        SmallVec::new()
                    },
                    (RsvpKind::Apply, RosterWrite::Changed) => match &state.event {
                        Some(event) => {
                            let effect = Self::emit(event, &request.attendee, env);
                            state.phase = RsvpPhase::Emitting;
                            smallvec![effect]
                        },
                        None => {
                            Self::record(
                                state,
                                RsvpOutcome::Failed(RsvpFailure::Notification(
                                    "event snapshot missing".to_string(),
                                )),
                            );
                            SmallVec::new()
                        },
                    },
                }
            },

            RsvpAction::Emitted => {
                Self::record(state, RsvpOutcome::Applied);
                SmallVec::new()
            },

            RsvpAction::Failed(failure) => {
                Self::record(state, RsvpOutcome::Failed(failure));
                SmallVec::new()
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use event_hub_core::event::{EventDetails, EventType, Location};
    use event_hub_core::notification::Topic;
    use event_hub_runtime::Store;
    use event_hub_testing::mocks::{InMemoryEventBus, InMemoryEventStore, test_clock, test_time};
    use event_hub_testing::{ReducerTest, assertions};

    const ATTENDEE: &str = "a@x.com";

    fn event_in(hours: i64) -> Event {
        Event::new(
            EventId::new(),
            EventDetails {
                name: "Career Fair".to_string(),
                description: "Meet employers".to_string(),
                event_type: EventType::CareerFair,
                date: test_time() + Duration::hours(hours),
                location: Location {
                    address: "1 Main St".to_string(),
                    city: "Cairo".to_string(),
                    state: "Cairo".to_string(),
                    country: "Egypt".to_string(),
                },
                min_capacity: 0,
                max_capacity: 100,
                ushers: vec![],
                organizers: vec![],
                status: None,
            },
            test_time(),
        )
    }

    fn env() -> (RsvpEnvironment, InMemoryEventStore, InMemoryEventBus) {
        let store = InMemoryEventStore::new();
        let bus = InMemoryEventBus::new();
        let env = RsvpEnvironment::new(
            Arc::new(store.clone()),
            Arc::new(bus.clone()),
            Arc::new(test_clock()),
        );
        (env, store, bus)
    }

    fn loading(kind: RsvpKind, event_id: EventId) -> RsvpState {
        RsvpState {
            request: Some(RsvpRequest {
                kind,
                event_id,
                attendee: ATTENDEE.to_string(),
            }),
            event: None,
            phase: RsvpPhase::Loading,
            outcome: None,
        }
    }

    fn roster(emails: &[&str]) -> Option<BTreeSet<String>> {
        Some(emails.iter().map(|e| (*e).to_string()).collect())
    }

    fn rejected(rejection: RsvpRejection) -> impl FnOnce(&RsvpState) {
        move |state| {
            assert_eq!(state.phase, RsvpPhase::Done);
            assert_eq!(state.outcome, Some(RsvpOutcome::Rejected(rejection)));
        }
    }

    // ------------------------------------------------------------------
    // Pure transitions
    // ------------------------------------------------------------------

    #[test]
    fn apply_starts_loading() {
        let event_id = EventId::new();
        ReducerTest::new(RsvpReducer)
            .with_env(env().0)
            .given_state(RsvpState::default())
            .when_action(RsvpAction::Apply {
                event_id,
                attendee: ATTENDEE.to_string(),
            })
            .then_state(move |state| {
                assert_eq!(state.phase, RsvpPhase::Loading);
                assert_eq!(state.request.as_ref().map(|r| r.event_id), Some(event_id));
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn missing_roster_is_checked_first() {
        let event = event_in(-1);
        ReducerTest::new(RsvpReducer)
            .with_env(env().0)
            .given_state(loading(RsvpKind::Apply, event.id))
            .when_action(RsvpAction::SnapshotLoaded {
                roster: None,
                event: Some(event),
            })
            .then_state(rejected(RsvpRejection::RosterNotFound))
            .then_effects(|effects| assertions::assert_no_effects(effects))
            .run();
    }

    #[test]
    fn already_applied_wins_over_ended_event() {
        let event = event_in(-1);
        ReducerTest::new(RsvpReducer)
            .with_env(env().0)
            .given_state(loading(RsvpKind::Apply, event.id))
            .when_action(RsvpAction::SnapshotLoaded {
                roster: roster(&[ATTENDEE]),
                event: Some(event),
            })
            .then_state(rejected(RsvpRejection::AlreadyApplied))
            .run();
    }

    #[test]
    fn missing_event_after_membership() {
        ReducerTest::new(RsvpReducer)
            .with_env(env().0)
            .given_state(loading(RsvpKind::Apply, EventId::new()))
            .when_action(RsvpAction::SnapshotLoaded {
                roster: roster(&[]),
                event: None,
            })
            .then_state(rejected(RsvpRejection::EventNotFound))
            .run();
    }

    #[test]
    fn past_event_has_ended() {
        let event = event_in(-1);
        ReducerTest::new(RsvpReducer)
            .with_env(env().0)
            .given_state(loading(RsvpKind::Apply, event.id))
            .when_action(RsvpAction::SnapshotLoaded {
                roster: roster(&[]),
                event: Some(event),
            })
            .then_state(rejected(RsvpRejection::EventEnded))
            .run();
    }

    #[test]
    fn event_at_exactly_now_has_ended() {
        let event = event_in(0);
        ReducerTest::new(RsvpReducer)
            .with_env(env().0)
            .given_state(loading(RsvpKind::Apply, event.id))
            .when_action(RsvpAction::SnapshotLoaded {
                roster: roster(&[]),
                event: Some(event),
            })
            .then_state(rejected(RsvpRejection::EventEnded))
            .run();
    }

    #[test]
    fn unapply_after_event_has_ended() {
        let event = event_in(-1);
        ReducerTest::new(RsvpReducer)
            .with_env(env().0)
            .given_state(loading(RsvpKind::Unapply, event.id))
            .when_action(RsvpAction::SnapshotLoaded {
                roster: roster(&[ATTENDEE]),
                event: Some(event),
            })
            .then_state(rejected(RsvpRejection::EventEnded))
            .then_effects(|effects| assertions::assert_no_effects(effects))
            .run();
    }

    #[test]
    fn unapply_requires_membership() {
        let event = event_in(1);
        ReducerTest::new(RsvpReducer)
            .with_env(env().0)
            .given_state(loading(RsvpKind::Unapply, event.id))
            .when_action(RsvpAction::SnapshotLoaded {
                roster: roster(&["other@x.com"]),
                event: Some(event),
            })
            .then_state(rejected(RsvpRejection::NotApplied))
            .run();
    }

    #[test]
    fn valid_snapshot_moves_to_write() {
        let event = event_in(1);
        ReducerTest::new(RsvpReducer)
            .with_env(env().0)
            .given_state(loading(RsvpKind::Apply, event.id))
            .when_action(RsvpAction::SnapshotLoaded {
                roster: roster(&[]),
                event: Some(event),
            })
            .then_state(|state| {
                assert_eq!(state.phase, RsvpPhase::Writing);
                assert!(state.event.is_some());
                assert_eq!(state.outcome, None);
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }

    #[test]
    fn lost_race_reports_already_applied() {
        let event = event_in(1);
        let mut state = loading(RsvpKind::Apply, event.id);
        state.event = Some(event);
        state.phase = RsvpPhase::Writing;

        ReducerTest::new(RsvpReducer)
            .with_env(env().0)
            .given_state(state)
            .when_action(RsvpAction::RosterWritten(RosterWrite::Unchanged))
            .then_state(rejected(RsvpRejection::AlreadyApplied))
            .run();
    }

    #[test]
    fn changed_apply_emits() {
        let event = event_in(1);
        let mut state = loading(RsvpKind::Apply, event.id);
        state.event = Some(event);
        state.phase = RsvpPhase::Writing;

        ReducerTest::new(RsvpReducer)
            .with_env(env().0)
            .given_state(state)
            .when_action(RsvpAction::RosterWritten(RosterWrite::Changed))
            .then_state(|state| assert_eq!(state.phase, RsvpPhase::Emitting))
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn second_command_is_ignored() {
        let event_id = EventId::new();
        ReducerTest::new(RsvpReducer)
            .with_env(env().0)
            .given_state(loading(RsvpKind::Apply, event_id))
            .when_action(RsvpAction::Unapply {
                event_id,
                attendee: "b@x.com".to_string(),
            })
            .then_state(|state| {
                assert_eq!(state.request.as_ref().map(|r| r.kind), Some(RsvpKind::Apply));
            })
            .then_effects(|effects| assertions::assert_no_effects(effects))
            .run();
    }

    // ------------------------------------------------------------------
    // Through the runtime Store
    // ------------------------------------------------------------------

    async fn run(env: &RsvpEnvironment, action: RsvpAction) -> Option<RsvpOutcome> {
        let store = Store::new(RsvpState::default(), RsvpReducer, env.clone());
        let mut handle = store.send(action).await;
        tokio::time::timeout(std::time::Duration::from_secs(5), handle.wait())
            .await
            .expect("effects settle");
        store.state(|s| s.outcome.clone()).await
    }

    fn apply(event_id: EventId) -> RsvpAction {
        RsvpAction::Apply {
            event_id,
            attendee: ATTENDEE.to_string(),
        }
    }

    #[tokio::test]
    async fn apply_commits_and_publishes_once() {
        let (env, store, bus) = env();
        let event = event_in(1);
        store.insert_event(&event).await.expect("insert");

        assert_eq!(run(&env, apply(event.id)).await, Some(RsvpOutcome::Applied));

        let roster = store.roster(event.id).expect("roster");
        assert!(roster.contains(ATTENDEE));
        assert_eq!(store.event(event.id).map(|e| e.number_of_applications), Some(1));

        let published = bus.published_on(Topic::ApplicationRegistered);
        assert_eq!(published.len(), 1);
        let payload: ApplicationRegisteredPayload = published[0].payload().expect("payload");
        assert_eq!(payload.emails, vec![ATTENDEE.to_string()]);
        assert_eq!(payload.event_location, "1 Main St,Cairo,Cairo,Egypt");
    }

    #[tokio::test]
    async fn second_apply_is_rejected_without_side_effects() {
        let (env, store, bus) = env();
        let event = event_in(1);
        store.insert_event(&event).await.expect("insert");

        run(&env, apply(event.id)).await;
        let second = run(&env, apply(event.id)).await;

        assert_eq!(second, Some(RsvpOutcome::Rejected(RsvpRejection::AlreadyApplied)));
        assert_eq!(bus.published().len(), 1);
        assert_eq!(store.event(event.id).map(|e| e.number_of_applications), Some(1));
    }

    #[tokio::test]
    async fn unapply_restores_pre_apply_state() {
        let (env, store, bus) = env();
        let event = event_in(1);
        store.insert_event(&event).await.expect("insert");
        let before = (store.roster(event.id), store.event(event.id));

        run(&env, apply(event.id)).await;
        let outcome = run(
            &env,
            RsvpAction::Unapply {
                event_id: event.id,
                attendee: ATTENDEE.to_string(),
            },
        )
        .await;

        assert_eq!(outcome, Some(RsvpOutcome::Unapplied));
        assert_eq!((store.roster(event.id), store.event(event.id)), before);
        // Unapply publishes nothing
        assert_eq!(bus.published().len(), 1);
    }

    #[tokio::test]
    async fn publish_failure_keeps_roster_change() {
        let (env, store, bus) = env();
        let event = event_in(1);
        store.insert_event(&event).await.expect("insert");
        bus.set_fail_publish(true);

        let outcome = run(&env, apply(event.id)).await;

        assert!(matches!(
            outcome,
            Some(RsvpOutcome::Failed(RsvpFailure::Notification(_)))
        ));
        assert!(store.roster(event.id).expect("roster").contains(ATTENDEE));
    }

    #[tokio::test]
    async fn store_outage_fails_the_request() {
        let (env, store, _) = env();
        store.set_unavailable(true);

        let outcome = run(&env, apply(EventId::new())).await;
        assert!(matches!(outcome, Some(RsvpOutcome::Failed(RsvpFailure::Store(_)))));
    }

    #[tokio::test]
    async fn concurrent_applies_succeed_once() {
        let (env, store, bus) = env();
        let event = event_in(1);
        store.insert_event(&event).await.expect("insert");

        let (first, second) = tokio::join!(run(&env, apply(event.id)), run(&env, apply(event.id)));
        let applied = [first, second]
            .into_iter()
            .filter(|o| *o == Some(RsvpOutcome::Applied))
            .count();

        assert_eq!(applied, 1);
        assert_eq!(bus.published().len(), 1);
        assert_eq!(store.event(event.id).map(|e| e.number_of_applications), Some(1));
    }
}
