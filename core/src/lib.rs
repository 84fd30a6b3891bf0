//! # Task Lists Core
//!
//! Entity model, task-tree engine, and dependency seams for Task Lists.
//!
//! ## Modules
//!
//! - [`ids`], [`model`]: lists, tasks, the legacy flat subtask shape
//! - [`tree`]: immutable find / update / remove over a [`tree::Forest`]
//! - [`aggregate`]: total / completed / incomplete counts
//! - [`document`]: persisted document shapes and the [`document::DocumentStore`] trait
//! - [`reducer`], [`effect`], [`environment`]: the functional core and its injected
//!   dependencies (clock, ids, AI collaborator, write queue)
//!
//! ## Architecture
//!
//! Business logic is a reducer: `(State, Action, Environment) → (State, Effects)`.
//! Effects are descriptions of asynchronous work (document writes, AI calls)
//! executed by the Store in `tasklists-runtime`. Everything external is
//! reached through a trait in [`environment`], so tests swap in deterministic
//! implementations from `tasklists-testing`.
//!
//! ## Example
//!
//! ```
//! use tasklists_core::aggregate::TaskCounts;
//! use tasklists_core::ids::{ListId, TaskId, UserId};
//! use tasklists_core::model::Task;
//! use tasklists_core::tree::Forest;
//!
//! let owner = UserId::new("u1");
//! let parent = Task::new(TaskId::new("T1"), ListId::new("L1"), owner, "Trip".to_string());
//! let child = parent.child(TaskId::new("T1a"), "Book flights".to_string()).with_completed(true);
//! let forest: Forest = [parent.with_subtasks([child].into_iter().collect())]
//!     .into_iter()
//!     .collect();
//!
//! let counts = TaskCounts::of(&forest);
//! assert_eq!((counts.total, counts.completed, counts.incomplete), (2, 1, 1));
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use smallvec::{SmallVec, smallvec};

pub mod aggregate;
pub mod document;
pub mod ids;
pub mod model;
pub mod tree;

/// Reducer module - the core trait for business logic
///
/// Reducers are deterministic: given the same state, action, and environment
/// they make the same state change and return the same effect descriptions.
pub mod reducer {
    use super::SmallVec;
    use super::effect::Effect;

    /// Effects returned by one reducer step. Most steps return zero or one.
    pub type Effects<Action> = SmallVec<[Effect<Action>; 4]>;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// Updates `state` in place and returns effect descriptions for the
        /// runtime to execute.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Effects<Self::Action>;
    }
}

/// Effect module - side effect descriptions
///
/// Effects are values, not execution. The Store in `tasklists-runtime`
/// spawns them and feeds any resulting action back into the reducer.
pub mod effect {
    use futures::future::BoxFuture;

    /// Effect type - describes a side effect to be executed
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects concurrently
        Parallel(Vec<Effect<Action>>),

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(BoxFuture<'static, Option<Action>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Wraps an async block.
        #[must_use]
        pub fn future<F>(future: F) -> Self
        where
            F: std::future::Future<Output = Option<Action>> + Send + 'static,
        {
            Self::Future(Box::pin(future))
        }

        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Self>) -> Self {
            Self::Parallel(effects)
        }

        /// Whether this is [`Effect::None`].
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Self::None)
        }
    }
}

/// Environment module - dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the reducer's Environment parameter.
pub mod environment {
    use crate::document::{SyncError, WriteBatch};
    use crate::model::Icon;
    use chrono::{DateTime, Utc};
    use futures::future::{self, BoxFuture};
    use thiserror::Error;

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Source of fresh identifiers, unique within the process.
    pub trait IdGenerator: Send + Sync {
        /// Returns a new identifier.
        fn next_id(&self) -> String;
    }

    /// Random UUID v4 identifiers.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct UuidGenerator;

    impl IdGenerator for UuidGenerator {
        fn next_id(&self) -> String {
            uuid::Uuid::new_v4().to_string()
        }
    }

    /// Errors from the AI text/image collaborator.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum AssistantError {
        /// No assistant is configured (e.g. missing API key).
        #[error("Assistant unavailable: {0}")]
        Unavailable(String),

        /// The request failed (network, quota, server error).
        #[error("Assistant request failed: {0}")]
        RequestFailed(String),

        /// The assistant answered, but not with anything usable.
        #[error("Assistant returned an unusable response: {0}")]
        InvalidResponse(String),
    }

    /// Generates an SVG icon for a short topic (a list name).
    pub trait IconGenerator: Send + Sync {
        /// Returns icon markup for `topic`.
        ///
        /// # Errors
        ///
        /// Any [`AssistantError`]; callers fall back to [`Icon::fallback`].
        fn generate_icon<'a>(&'a self, topic: &'a str) -> BoxFuture<'a, Result<Icon, AssistantError>>;
    }

    /// Suggests additional tasks given the texts of existing ones.
    pub trait TaskSuggester: Send + Sync {
        /// Returns suggested task texts.
        ///
        /// # Errors
        ///
        /// Any [`AssistantError`]; callers fall back to no suggestions.
        fn suggest_tasks<'a>(
            &'a self,
            existing: &'a [String],
        ) -> BoxFuture<'a, Result<Vec<String>, AssistantError>>;
    }

    /// Completion of an enqueued [`WriteBatch`].
    ///
    /// Carries the batch's position in its queue. Sequence numbers start at
    /// 1 and grow in enqueue order; 0 marks a batch that was never queued.
    /// Awaiting the receipt yields the batch outcome.
    pub struct WriteReceipt {
        seq: u64,
        outcome: BoxFuture<'static, Result<(), SyncError>>,
    }

    impl WriteReceipt {
        /// Receipt for batch `seq`, resolved by `outcome`.
        pub fn new(seq: u64, outcome: impl Future<Output = Result<(), SyncError>> + Send + 'static) -> Self {
            Self {
                seq,
                outcome: Box::pin(outcome),
            }
        }

        /// Receipt that is already resolved.
        #[must_use]
        pub fn ready(seq: u64, result: Result<(), SyncError>) -> Self {
            Self::new(seq, future::ready(result))
        }

        /// Queue position of the batch.
        #[must_use]
        pub const fn seq(&self) -> u64 {
            self.seq
        }
    }

    impl std::fmt::Debug for WriteReceipt {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("WriteReceipt").field("seq", &self.seq).finish_non_exhaustive()
        }
    }

    impl IntoFuture for WriteReceipt {
        type Output = Result<(), SyncError>;
        type IntoFuture = BoxFuture<'static, Result<(), SyncError>>;

        fn into_future(self) -> Self::IntoFuture {
            self.outcome
        }
    }

    /// Ordered, non-blocking sink for document writes.
    ///
    /// `enqueue` is synchronous: batches are ordered by the time they are
    /// enqueued, not by the time their receipts are polled, and receipt
    /// sequence numbers follow the same order.
    pub trait WriteQueue: Send + Sync {
        /// Queues `batch` and returns a receipt that resolves once every
        /// write in it has been applied or has failed.
        fn enqueue(&self, batch: WriteBatch) -> WriteReceipt;
    }
}

#[cfg(test)]
mod tests {
    use super::document::SyncError;
    use super::effect::Effect;
    use super::environment::{IdGenerator, UuidGenerator, WriteReceipt};

    #[test]
    fn uuid_generator_is_unique() {
        let ids = UuidGenerator;
        assert_ne!(ids.next_id(), ids.next_id());
    }

    #[test]
    fn effect_debug_hides_futures() {
        let effect: Effect<()> = Effect::future(async { None });
        assert_eq!(format!("{effect:?}"), "Effect::Future(<future>)");
        assert!(Effect::<()>::None.is_none());
    }

    #[test]
    fn receipts_resolve_to_their_outcome() {
        let receipt = WriteReceipt::ready(7, Err(SyncError::QueueClosed));
        assert_eq!(receipt.seq(), 7);
        assert_eq!(format!("{receipt:?}"), "WriteReceipt { seq: 7, .. }");
        assert_eq!(futures::executor::block_on(receipt.into_future()), Err(SyncError::QueueClosed));
    }
}
