//! Completion statistics derived from a forest.
//!
//! Counts are always recomputed from the current forest; nothing here is
//! stored or incrementally maintained.

use crate::tree::Forest;
use serde::{Deserialize, Serialize};

/// Totals over every node of a forest, nested subtasks included.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    /// Number of nodes
    pub total: usize,
    /// Nodes marked completed
    pub completed: usize,
    /// `total - completed`
    pub incomplete: usize,
}

impl TaskCounts {
    /// Counts every node of `forest` exactly once.
    ///
    /// # Examples
    ///
    /// ```
    /// use tasklists_core::aggregate::TaskCounts;
    /// use tasklists_core::tree::Forest;
    ///
    /// assert_eq!(TaskCounts::of(&Forest::new()), TaskCounts::default());
    /// ```
    #[must_use]
    pub fn of(forest: &Forest) -> Self {
        let (total, completed) = forest
            .walk()
            .fold((0, 0), |(total, completed), node| {
                (total + 1, completed + usize::from(node.completed))
            });
        Self {
            total,
            completed,
            incomplete: total - completed,
        }
    }

    /// Share of completed nodes in percent; `0.0` for an empty forest.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Task counts are far below 2^52
    pub fn completion_percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

/// Shorthand for [`TaskCounts::of`].
#[must_use]
pub fn count(forest: &Forest) -> TaskCounts {
    TaskCounts::of(forest)
}

/// Text of every node in depth-first order.
#[must_use]
pub fn collect_texts(forest: &Forest) -> Vec<String> {
    forest.walk().map(|node| node.text.clone()).collect()
}
