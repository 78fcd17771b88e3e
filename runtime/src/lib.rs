//! # Event Hub Runtime
//!
//! Runtime pieces shared by the Event Hub services:
//!
//! - [`Store`]: runs a [`Reducer`], executes the returned [`Effect`]s and
//!   feeds produced actions back in
//! - [`EffectHandle`]: lets a caller await the whole effect cascade started
//!   by one action
//! - [`retry`]: quadratic backoff for startup dependencies
//! - [`consumer`]: subscribe/process/reconnect loop over an event bus
//! - [`background`]: spawned tasks with a panic boundary
//!
//! ## Example
//!
//! ```ignore
//! let store = Store::new(RsvpState::default(), RsvpReducer, env);
//! let mut handle = store.send(RsvpAction::Apply { event_id, attendee }).await;
//! handle.wait().await;
//! let outcome = store.state(|s| s.outcome.clone()).await;
//! ```

use event_hub_core::effect::Effect;
use event_hub_core::reducer::Reducer;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{RwLock, watch};

pub mod background;
pub mod consumer;
pub mod retry;

pub use background::spawn_guarded;
pub use consumer::{ConsumerBuildError, EventConsumer, EventConsumerBuilder, MessageHandler};
pub use retry::{RetryPolicy, retry_with_backoff};
pub use store::Store;

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`]. Actions produced by effects are reduced
/// under the same tracking, so [`EffectHandle::wait`] returns only once the
/// entire feedback cascade has settled.
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };

        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Wait until the effect counter reaches zero.
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            // All trackers dropped means every effect has finished
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: tracking context threaded through effect execution
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: decrements the effect counter on drop, including on panic.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Store runtime for coordinating reducer execution and effect handling.
pub mod store {
    use super::{Arc, Effect, EffectHandle, EffectTracking, DecrementGuard, Reducer, RwLock};
    use std::future::Future;
    use std::pin::Pin;

    /// The Store - runtime coordinator for a reducer
    ///
    /// Holds the state behind a `RwLock`, the reducer and its environment.
    /// Every action is reduced under the write lock; the returned effects are
    /// spawned and any action they produce is reduced in turn.
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: Arc<R>,
        environment: Arc<E>,
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
            }
        }
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
            }
        }

        /// Send an action to the store
        ///
        /// Reduces the action, starts its effects and returns a handle that
        /// completes once those effects and every action they feed back have
        /// been processed.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> EffectHandle {
            let (handle, tracking) = EffectHandle::new();
            self.dispatch(action, tracking).await;
            handle
        }

        /// Read state via a closure
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        // Boxed so effect feedback can recurse through spawned tasks.
        fn dispatch(
            &self,
            action: A,
            tracking: EffectTracking,
        ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
            Box::pin(async move {
                metrics::counter!("store.actions.total").increment(1);

                let effects = {
                    let mut state = self.state.write().await;
                    self.reducer.reduce(&mut state, action, &self.environment)
                };

                tracing::trace!("Reducer returned {} effects", effects.len());
                for effect in effects {
                    self.execute_effect(effect, &tracking);
                }
            })
        }

        fn execute_effect(&self, effect: Effect<A>, tracking: &EffectTracking) {
            match effect {
                Effect::None => {},
                Effect::Future(fut) => {
                    tracking.increment();
                    let guard = DecrementGuard(tracking.clone());
                    let store = self.clone();

                    tokio::spawn(async move {
                        if let Some(action) = fut.await {
                            store.dispatch(action, guard.0.clone()).await;
                        }
                        drop(guard);
                    });
                },
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use event_hub_core::{SmallVec, smallvec};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::timeout;

    #[derive(Debug, Clone)]
    enum CountAction {
        Start,
        Step(u32),
        Skip,
    }

    #[derive(Debug, Default)]
    struct CountState {
        steps: u32,
    }

    struct CountReducer;

    struct CountEnv {
        seen: Arc<Mutex<Vec<u32>>>,
    }

    impl Reducer for CountReducer {
        type State = CountState;
        type Action = CountAction;
        type Environment = CountEnv;

        fn reduce(
            &self,
            state: &mut CountState,
            action: CountAction,
            env: &CountEnv,
        ) -> SmallVec<[Effect<CountAction>; 4]> {
            match action {
                CountAction::Start => smallvec![Effect::future(async {
                    Some(CountAction::Step(1))
                })],
                CountAction::Step(n) => {
                    state.steps = n;
                    env.seen.lock().expect("lock").push(n);
                    if n < 3 {
                        smallvec![Effect::future(async move {
                            tokio::task::yield_now().await;
                            Some(CountAction::Step(n + 1))
                        })]
                    } else {
                        SmallVec::new()
                    }
                },
                CountAction::Skip => smallvec![Effect::None, Effect::future(async { None })],
            }
        }
    }

    fn store() -> Store<CountState, CountAction, CountEnv, CountReducer> {
        Store::new(
            CountState::default(),
            CountReducer,
            CountEnv {
                seen: Arc::new(Mutex::new(Vec::new())),
            },
        )
    }

    #[tokio::test]
    async fn wait_covers_the_whole_feedback_cascade() {
        let store = store();
        let mut handle = store.send(CountAction::Start).await;
        timeout(Duration::from_secs(1), handle.wait())
            .await
            .expect("cascade should settle");

        assert_eq!(store.state(|s| s.steps).await, 3);
    }

    #[tokio::test]
    async fn effects_without_feedback_still_settle() {
        let store = store();
        let mut handle = store.send(CountAction::Skip).await;
        timeout(Duration::from_secs(1), handle.wait())
            .await
            .expect("no feedback to wait for");

        assert_eq!(store.state(|s| s.steps).await, 0);
    }
}
