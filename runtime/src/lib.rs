//! # Task Lists Runtime
//!
//! Runtime implementation for the Task Lists architecture.
//!
//! This crate provides the Store runtime that coordinates reducer execution
//! and effect handling.
//!
//! ## Core Concepts
//!
//! - **Store**: The runtime that manages state and executes effects
//! - **Effect Execution**: Spawning the asynchronous work reducers describe
//! - **Action Feedback**: Actions produced by effects are fed back into the reducer
//!
//! ## Example
//!
//! ```ignore
//! use tasklists_runtime::Store;
//!
//! let store = Store::new(initial_state, reducer, environment);
//! let mut handle = store.send(Action::Refresh).await?;
//! handle.wait().await;
//! let snapshot = store.state(|s| s.clone()).await;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tasklists_core::effect::Effect;
use tasklists_core::reducer::Reducer;
use tokio::sync::{RwLock, broadcast, watch};

pub mod retry;

pub use retry::{Exhausted, RetryPolicy, retry_with_predicate};

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur while driving the Store
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// A spawned effect task panicked or was cancelled
        #[error("Task join error: {0}")]
        TaskJoinError(#[from] tokio::task::JoinError),

        /// The store is shutting down and rejects new actions
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out with effects still running
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Waiting for effects timed out
        #[error("Timed out waiting for effects")]
        Timeout,
    }
}

pub use error::StoreError;

/// Handle for waiting on the effects started by one `send`.
///
/// Tracking cascades: effects started by actions that those effects feed
/// back are tracked by the same handle. `wait` therefore returns only once
/// the whole chain has settled.
#[derive(Debug)]
pub struct EffectHandle {
    pending: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new(tracking: &EffectTracking) -> Self {
        Self {
            pending: Arc::clone(&tracking.pending),
            completion: tracking.notifier.subscribe(),
        }
    }

    /// A handle with nothing to wait for.
    #[must_use]
    pub fn completed() -> Self {
        let (notifier, completion) = watch::channel(());
        drop(notifier);
        Self {
            pending: Arc::new(AtomicUsize::new(0)),
            completion,
        }
    }

    /// Effects still running under this handle.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Wait until every tracked effect has completed.
    pub async fn wait(&mut self) {
        while self.pending.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait with a timeout.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if effects are still running after `timeout`.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

/// Shared counter behind an [`EffectHandle`].
#[derive(Clone, Debug)]
struct EffectTracking {
    pending: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    fn new() -> Self {
        let (notifier, _) = watch::channel(());
        Self {
            pending: Arc::new(AtomicUsize::new(0)),
            notifier: Arc::new(notifier),
        }
    }

    fn increment(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notifier.send_replace(());
        }
    }
}

/// Decrements tracking when dropped, even if the effect panics.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Decrements the store-wide pending counter when dropped.
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store configuration.
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    /// Capacity of the action broadcast channel
    pub broadcast_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 64,
        }
    }
}

struct StoreInner<S, A, E, R> {
    state: RwLock<S>,
    reducer: R,
    environment: E,
    shutdown: AtomicBool,
    pending_effects: Arc<AtomicUsize>,
    action_broadcast: broadcast::Sender<A>,
}

/// The Store - runtime for reducers
///
/// Actions are reduced one at a time under a write lock, so every action
/// sees the state left by the previous one. Effects run on spawned tokio
/// tasks; actions they produce are broadcast to observers and then sent
/// back through the reducer.
///
/// Cloning a `Store` is cheap and yields another handle to the same state.
pub struct Store<S, A, E, R> {
    inner: Arc<StoreInner<S, A, E, R>>,
}

impl<S, A, E, R> Clone for Store<S, A, E, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    A: Send + Clone + std::fmt::Debug + 'static,
    S: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Create a new store with initial state, reducer and environment.
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        Self::with_config(initial_state, reducer, environment, StoreConfig::default())
    }

    /// Create a store with an explicit [`StoreConfig`].
    #[must_use]
    pub fn with_config(initial_state: S, reducer: R, environment: E, config: StoreConfig) -> Self {
        let (action_broadcast, _) = broadcast::channel(config.broadcast_capacity.max(1));
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(initial_state),
                reducer,
                environment,
                shutdown: AtomicBool::new(false),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                action_broadcast,
            }),
        }
    }

    /// Send an action to the store.
    ///
    /// The reducer runs before this returns; effects keep running in the
    /// background and can be awaited through the returned handle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] once [`Store::shutdown`] was called.
    pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
        let tracking = EffectTracking::new();
        let handle = EffectHandle::new(&tracking);
        self.send_tracked(action, tracking).await?;
        Ok(handle)
    }

    #[tracing::instrument(skip(self, action, tracking), name = "store_send")]
    async fn send_tracked(&self, action: A, tracking: EffectTracking) -> Result<(), StoreError> {
        if self.inner.shutdown.load(Ordering::SeqCst) {
            tracing::warn!("Rejecting action, store is shutting down");
            return Err(StoreError::ShutdownInProgress);
        }

        metrics::counter!("store.commands.total").increment(1);
        tracing::trace!(?action, "Processing action");

        let effects = {
            let started = Instant::now();
            let mut state = self.inner.state.write().await;
            let effects = self
                .inner
                .reducer
                .reduce(&mut state, action, &self.inner.environment);
            metrics::histogram!("store.reducer.duration_seconds")
                .record(started.elapsed().as_secs_f64());
            effects
        };

        tracing::trace!(count = effects.len(), "Reducer produced effects");
        for effect in effects {
            self.execute_effect(effect, &tracking);
        }
        Ok(())
    }

    fn execute_effect(&self, effect: Effect<A>, tracking: &EffectTracking) {
        match effect {
            Effect::None => {},
            Effect::Parallel(effects) => {
                for effect in effects {
                    self.execute_effect(effect, tracking);
                }
            },
            Effect::Future(future) => {
                metrics::counter!("store.effects.spawned").increment(1);
                tracking.increment();
                self.inner.pending_effects.fetch_add(1, Ordering::SeqCst);

                let store = self.clone();
                let tracking = tracking.clone();
                tokio::spawn(async move {
                    let _guard = DecrementGuard(tracking.clone());
                    let _pending = AtomicCounterGuard(Arc::clone(&store.inner.pending_effects));

                    if let Some(action) = future.await {
                        tracing::trace!(?action, "Effect produced feedback action");
                        // No receivers is not an error.
                        let _ = store.inner.action_broadcast.send(action.clone());
                        if let Err(error) = store.send_tracked(action, tracking).await {
                            tracing::warn!(%error, "Dropping feedback action");
                        }
                    }
                });
            },
        }
    }

    /// Read state through a closure.
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        let state = self.inner.state.read().await;
        f(&state)
    }

    /// Subscribe to actions produced by effects.
    ///
    /// Only feedback actions are broadcast; actions passed to [`Store::send`]
    /// are not.
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
        self.inner.action_broadcast.subscribe()
    }

    /// The environment the reducer runs with.
    #[must_use]
    pub fn environment(&self) -> &E {
        &self.inner.environment
    }

    /// Effects currently running across all handles.
    #[must_use]
    pub fn pending_effects(&self) -> usize {
        self.inner.pending_effects.load(Ordering::SeqCst)
    }

    /// Stop accepting actions and wait for running effects to finish.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] with the number of effects
    /// still running when `timeout` elapses.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        tracing::info!("Initiating store shutdown");
        self.inner.shutdown.store(true, Ordering::SeqCst);

        let deadline = Instant::now() + timeout;
        loop {
            let pending = self.pending_effects();
            if pending == 0 {
                tracing::info!("Store shutdown complete");
                return Ok(());
            }
            if Instant::now() >= deadline {
                tracing::error!(pending, "Store shutdown timed out");
                return Err(StoreError::ShutdownTimeout(pending));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use tasklists_core::reducer::Effects;
    use tasklists_core::smallvec;

    #[derive(Debug, Clone, PartialEq)]
    enum CounterAction {
        Add(i64),
        AddLater(i64),
        Chain(u32),
    }

    struct CounterReducer;

    impl Reducer for CounterReducer {
        type State = i64;
        type Action = CounterAction;
        type Environment = ();

        fn reduce(&self, state: &mut i64, action: CounterAction, _env: &()) -> Effects<CounterAction> {
            match action {
                CounterAction::Add(n) => {
                    *state += n;
                    smallvec![]
                },
                CounterAction::AddLater(n) => smallvec![Effect::future(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Some(CounterAction::Add(n))
                })],
                CounterAction::Chain(0) => smallvec![],
                CounterAction::Chain(depth) => {
                    *state += 1;
                    smallvec![Effect::future(async move {
                        tokio::time::sleep(Duration::from_millis(1)).await;
                        Some(CounterAction::Chain(depth - 1))
                    })]
                },
            }
        }
    }

    fn store() -> Store<i64, CounterAction, (), CounterReducer> {
        Store::new(0, CounterReducer, ())
    }

    #[tokio::test]
    async fn reducer_runs_before_send_returns() {
        let store = store();
        store.send(CounterAction::Add(3)).await.unwrap();
        assert_eq!(store.state(|s| *s).await, 3);
    }

    #[tokio::test]
    async fn feedback_actions_are_reduced_and_broadcast() {
        let store = store();
        let mut actions = store.subscribe_actions();

        let mut handle = store.send(CounterAction::AddLater(5)).await.unwrap();
        handle.wait().await;

        assert_eq!(store.state(|s| *s).await, 5);
        assert_eq!(actions.recv().await.unwrap(), CounterAction::Add(5));
    }

    #[tokio::test]
    async fn handle_waits_for_cascading_effects() {
        let store = store();
        let mut handle = store.send(CounterAction::Chain(4)).await.unwrap();
        handle.wait_with_timeout(Duration::from_secs(1)).await.unwrap();

        assert_eq!(handle.pending(), 0);
        assert_eq!(store.state(|s| *s).await, 4);
    }

    #[tokio::test]
    async fn completed_handle_returns_immediately() {
        let mut handle = EffectHandle::completed();
        handle.wait_with_timeout(Duration::from_millis(10)).await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_rejects_new_actions() {
        let store = store();
        store.send(CounterAction::AddLater(1)).await.unwrap();
        store.shutdown(Duration::from_secs(1)).await.unwrap();

        assert_eq!(store.pending_effects(), 0);
        assert!(matches!(
            store.send(CounterAction::Add(1)).await,
            Err(StoreError::ShutdownInProgress)
        ));
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = store();
        let other = store.clone();
        other.send(CounterAction::Add(2)).await.unwrap();
        assert_eq!(store.state(|s| *s).await, 2);
    }
}
