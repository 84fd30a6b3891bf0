//! # Task Lists Testing
//!
//! Testing utilities and helpers for Task Lists.
//!
//! This crate provides:
//! - Deterministic implementations of the environment traits
//!   ([`FixedClock`], [`SequentialIds`], [`ScriptedAssistant`])
//! - Write-path doubles ([`RecordingWriteQueue`], [`FlakyDocumentStore`])
//! - The [`ReducerTest`] Given-When-Then harness
//! - proptest strategies for task forests
//!
//! ## Example
//!
//! ```ignore
//! use tasklists_testing::{ReducerTest, test_clock};
//!
//! ReducerTest::new(ListsReducer)
//!     .with_env(test_environment())
//!     .given_state(signed_in_state())
//!     .when_action(ListsAction::CreateList { name: "Groceries".into(), icon })
//!     .then_state(|state| assert_eq!(state.lists.len(), 1))
//!     .run();
//! ```

use chrono::{DateTime, Utc};
use tasklists_core::environment::{Clock, IdGenerator};

pub mod doubles;

pub use doubles::{FlakyDocumentStore, GatedDocumentStore, RecordingWriteQueue, ScriptedAssistant};
pub use reducer_test::{ReducerTest, assertions, collect_actions};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, IdGenerator, Utc};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use tasklists_testing::mocks::FixedClock;
    /// use tasklists_core::environment::Clock;
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

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Predictable ids: `{prefix}-1`, `{prefix}-2`, ...
    ///
    /// ```
    /// use tasklists_testing::mocks::SequentialIds;
    /// use tasklists_core::environment::IdGenerator;
    ///
    /// let ids = SequentialIds::new("id");
    /// assert_eq!(ids.next_id(), "id-1");
    /// assert_eq!(ids.next_id(), "id-2");
    /// ```
    #[derive(Debug)]
    pub struct SequentialIds {
        prefix: String,
        next: AtomicU64,
    }

    impl SequentialIds {
        /// Starts counting at 1.
        #[must_use]
        pub fn new(prefix: impl Into<String>) -> Self {
            Self {
                prefix: prefix.into(),
                next: AtomicU64::new(1),
            }
        }
    }

    impl Default for SequentialIds {
        fn default() -> Self {
            Self::new("id")
        }
    }

    impl IdGenerator for SequentialIds {
        fn next_id(&self) -> String {
            let n = self.next.fetch_add(1, Ordering::SeqCst);
            format!("{}-{n}", self.prefix)
        }
    }
}

/// Property-based testing utilities using proptest.
///
/// Generated forests number their nodes `T1`, `T2`, ... in depth-first
/// order, so the `n`-th node visited by [`Forest::walk`] has id `T{n}`.
///
/// [`Forest::walk`]: tasklists_core::tree::Forest::walk
pub mod properties {
    use proptest::prelude::*;
    use tasklists_core::ids::{ListId, TaskId, UserId};
    use tasklists_core::model::Task;
    use tasklists_core::tree::Forest;

    /// Shape of a generated node before ids are assigned.
    #[derive(Clone, Debug)]
    pub struct NodeShape {
        /// Completion flag
        pub completed: bool,
        /// Child shapes
        pub children: Vec<NodeShape>,
    }

    /// Trees up to four levels deep with up to four children per node.
    pub fn node_shape() -> impl Strategy<Value = NodeShape> {
        let leaf = any::<bool>().prop_map(|completed| NodeShape {
            completed,
            children: Vec::new(),
        });
        leaf.prop_recursive(4, 32, 4, |inner| {
            (any::<bool>(), prop::collection::vec(inner, 0..4))
                .prop_map(|(completed, children)| NodeShape { completed, children })
        })
    }

    /// Forests of up to five roots in list `L1` owned by `u1`.
    pub fn forest() -> impl Strategy<Value = Forest> {
        prop::collection::vec(node_shape(), 0..5).prop_map(|shapes| build_forest(&shapes))
    }

    /// A non-empty forest paired with the id of one of its nodes.
    pub fn forest_with_member() -> impl Strategy<Value = (Forest, TaskId)> {
        prop::collection::vec(node_shape(), 1..5)
            .prop_map(|shapes| build_forest(&shapes))
            .prop_flat_map(|forest| {
                let size = forest.walk().count();
                (Just(forest), 0..size)
            })
            .prop_map(|(forest, index)| (forest, TaskId::new(format!("T{}", index + 1))))
    }

    /// An id no generated forest contains.
    #[must_use]
    pub fn absent_id() -> TaskId {
        TaskId::new("absent")
    }

    /// Builds a forest from shapes, numbering nodes in depth-first order.
    #[must_use]
    pub fn build_forest(shapes: &[NodeShape]) -> Forest {
        let mut next = 0;
        shapes.iter().map(|shape| build_task(shape, &mut next)).collect()
    }

    fn build_task(shape: &NodeShape, next: &mut usize) -> Task {
        *next += 1;
        let id = format!("T{next}");
        let task = Task::new(TaskId::new(id.clone()), ListId::new("L1"), UserId::new("u1"), id)
            .with_completed(shape.completed);
        let children: Forest = shape
            .children
            .iter()
            .map(|child| build_task(child, next))
            .collect();
        task.with_subtasks(children)
    }
}

/// Installs a test-friendly `tracing` subscriber. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, SequentialIds, test_clock};

#[cfg(test)]
mod tests {
    use super::properties::{NodeShape, build_forest};
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn sequential_ids_count_up() {
        let ids = SequentialIds::new("list");
        assert_eq!(ids.next_id(), "list-1");
        assert_eq!(ids.next_id(), "list-2");
    }

    #[test]
    fn generated_ids_follow_walk_order() {
        let leaf = |completed| NodeShape {
            completed,
            children: Vec::new(),
        };
        let forest = build_forest(&[
            NodeShape {
                completed: false,
                children: vec![leaf(true), leaf(false)],
            },
            leaf(true),
        ]);

        let ids: Vec<_> = forest.walk().map(|node| node.id.to_string()).collect();
        assert_eq!(ids, ["T1", "T2", "T3", "T4"]);
    }
}
