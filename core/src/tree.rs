//! Tree mutation engine over a forest of task nodes.
//!
//! A [`Forest`] is an ordered, reference-counted sequence of `Arc<Task>`
//! nodes. Mutations never touch the input: [`update`] and [`remove`] return a
//! new forest in which only the nodes on the path from a root to the target
//! are rebuilt. Every subtree off that path is shared with the input (same
//! `Arc`), so callers can detect change with [`Forest::ptr_eq`] and
//! [`Arc::ptr_eq`] instead of deep comparison.
//!
//! Targeting an id that is not present is a silent no-op: the original
//! forest comes back unchanged, sharing the same allocation.
//!
//! # Example
//!
//! ```
//! use tasklists_core::ids::{ListId, TaskId, UserId};
//! use tasklists_core::model::Task;
//! use tasklists_core::tree::{self, Forest};
//!
//! let task = |id: &str| {
//!     Task::new(TaskId::new(id), ListId::new("L1"), UserId::new("u1"), id.to_string())
//! };
//! let forest: Forest = [task("T1"), task("T2")].into_iter().collect();
//!
//! let toggled = tree::update(&forest, &TaskId::new("T2"), |t| {
//!     t.clone().with_completed(!t.completed)
//! });
//! assert!(toggled.find(&TaskId::new("T2")).is_some_and(|t| t.completed));
//!
//! let untouched = tree::remove(&forest, &TaskId::new("missing"));
//! assert!(untouched.ptr_eq(&forest));
//! ```

use crate::ids::TaskId;
use crate::model::Task;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Ordered sequence of root task nodes. Cloning is O(1).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Forest(Arc<Vec<Arc<Task>>>);

impl Forest {
    /// An empty forest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps already shared nodes.
    #[must_use]
    pub fn from_nodes(nodes: Vec<Arc<Task>>) -> Self {
        Self(Arc::new(nodes))
    }

    /// Number of root nodes (not counting descendants).
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no root nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Root nodes as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Arc<Task>] {
        &self.0
    }

    /// Iterates over root nodes.
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Task>> {
        self.0.iter()
    }

    /// Depth-first, pre-order walk over every node.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![self.0.iter()],
        }
    }

    /// Whether both forests share the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Returns a new forest with `task` appended at the root level.
    #[must_use]
    pub fn push(&self, task: Task) -> Self {
        let mut nodes = self.0.as_ref().clone();
        nodes.push(Arc::new(task));
        Self::from_nodes(nodes)
    }

    /// Returns a new forest with `tasks` appended at the root level.
    #[must_use]
    pub fn extend(&self, tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut nodes = self.0.as_ref().clone();
        nodes.extend(tasks.into_iter().map(Arc::new));
        Self::from_nodes(nodes)
    }

    /// Keeps root nodes matching `keep`. Kept nodes are shared, not copied.
    #[must_use]
    pub fn retain_roots(&self, mut keep: impl FnMut(&Task) -> bool) -> Self {
        Self::from_nodes(self.0.iter().filter(|node| keep(node)).cloned().collect())
    }

    /// See [`find`].
    #[must_use]
    pub fn find(&self, id: &TaskId) -> Option<&Arc<Task>> {
        find(self, id)
    }

    /// Whether any node has the given id.
    #[must_use]
    pub fn contains(&self, id: &TaskId) -> bool {
        find(self, id).is_some()
    }

    /// See [`root_of`].
    #[must_use]
    pub fn root_of(&self, id: &TaskId) -> Option<&Arc<Task>> {
        root_of(self, id)
    }

    /// See [`update`].
    #[must_use]
    pub fn update<F>(&self, id: &TaskId, transform: F) -> Self
    where
        F: FnOnce(&Task) -> Task,
    {
        update(self, id, transform)
    }

    /// See [`remove`].
    #[must_use]
    pub fn remove(&self, id: &TaskId) -> Self {
        remove(self, id)
    }
}

impl PartialEq for Forest {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0 == other.0
    }
}

impl Eq for Forest {}

impl FromIterator<Task> for Forest {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        Self::from_nodes(iter.into_iter().map(Arc::new).collect())
    }
}

impl FromIterator<Arc<Task>> for Forest {
    fn from_iter<I: IntoIterator<Item = Arc<Task>>>(iter: I) -> Self {
        Self::from_nodes(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Forest {
    type Item = &'a Arc<Task>;
    type IntoIter = std::slice::Iter<'a, Arc<Task>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Depth-first iterator returned by [`Forest::walk`].
pub struct Walk<'a> {
    stack: Vec<std::slice::Iter<'a, Arc<Task>>>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Arc<Task>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let siblings = self.stack.last_mut()?;
            if let Some(node) = siblings.next() {
                self.stack.push(node.subtasks.as_slice().iter());
                return Some(node);
            }
            self.stack.pop();
        }
    }
}

/// Finds the node with `id`, searching each node before its children.
#[must_use]
pub fn find<'a>(forest: &'a Forest, id: &TaskId) -> Option<&'a Arc<Task>> {
    forest.walk().find(|node| node.id == *id)
}

/// Returns the root-level node whose subtree contains `id`.
#[must_use]
pub fn root_of<'a>(forest: &'a Forest, id: &TaskId) -> Option<&'a Arc<Task>> {
    forest
        .iter()
        .find(|root| root.id == *id || root.subtasks.contains(id))
}

/// Replaces the node with `id` by `transform(node)`.
///
/// Ancestors of the target are rebuilt; everything else is shared with the
/// input. Returns `forest` itself when `id` is absent.
#[must_use]
pub fn update<F>(forest: &Forest, id: &TaskId, transform: F) -> Forest
where
    F: FnOnce(&Task) -> Task,
{
    match update_nodes(forest.as_slice(), id, transform) {
        Ok(nodes) => Forest::from_nodes(nodes),
        Err(_) => forest.clone(),
    }
}

/// Drops the node with `id` (and its subtree) from its parent's children.
///
/// Returns `forest` itself when `id` is absent.
#[must_use]
pub fn remove(forest: &Forest, id: &TaskId) -> Forest {
    match remove_nodes(forest.as_slice(), id) {
        Some(nodes) => Forest::from_nodes(nodes),
        None => forest.clone(),
    }
}

// Hands the transform back when the id is not in this subtree so the search
// can continue with the next sibling.
fn update_nodes<F>(nodes: &[Arc<Task>], id: &TaskId, transform: F) -> Result<Vec<Arc<Task>>, F>
where
    F: FnOnce(&Task) -> Task,
{
    let mut transform = transform;
    for (index, node) in nodes.iter().enumerate() {
        let replacement = if node.id == *id {
            Arc::new(transform(node))
        } else {
            match update_nodes(node.subtasks.as_slice(), id, transform) {
                Ok(children) => Arc::new(with_children(node, children)),
                Err(unused) => {
                    transform = unused;
                    continue;
                }
            }
        };

        let mut rebuilt = nodes.to_vec();
        rebuilt[index] = replacement;
        return Ok(rebuilt);
    }
    Err(transform)
}

fn remove_nodes(nodes: &[Arc<Task>], id: &TaskId) -> Option<Vec<Arc<Task>>> {
    for (index, node) in nodes.iter().enumerate() {
        if node.id == *id {
            let mut rebuilt = nodes.to_vec();
            rebuilt.remove(index);
            return Some(rebuilt);
        }
        if let Some(children) = remove_nodes(node.subtasks.as_slice(), id) {
            let mut rebuilt = nodes.to_vec();
            rebuilt[index] = Arc::new(with_children(node, children));
            return Some(rebuilt);
        }
    }
    None
}

fn with_children(node: &Task, children: Vec<Arc<Task>>) -> Task {
    let mut parent = node.clone();
    parent.subtasks = Forest::from_nodes(children);
    parent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ListId, UserId};

    fn task(id: &str) -> Task {
        Task::new(
            TaskId::new(id),
            ListId::new("L1"),
            UserId::new("u1"),
            format!("task {id}"),
        )
    }

    fn id(raw: &str) -> TaskId {
        TaskId::new(raw)
    }

    // T1 -> [T1a -> [T1a1], T1b], T2
    fn sample() -> Forest {
        let t1a = task("T1a").with_subtasks([task("T1a1")].into_iter().collect());
        let t1 = task("T1").with_subtasks([t1a, task("T1b")].into_iter().collect());
        [t1, task("T2")].into_iter().collect()
    }

    #[test]
    fn walk_is_preorder() {
        let order: Vec<_> = sample().walk().map(|t| t.id.to_string()).collect();
        assert_eq!(order, ["T1", "T1a", "T1a1", "T1b", "T2"]);
    }

    #[test]
    fn find_locates_nested_nodes() {
        let forest = sample();
        assert_eq!(forest.find(&id("T1a1")).map(|t| t.text.as_str()), Some("task T1a1"));
        assert!(forest.find(&id("nope")).is_none());
    }

    #[test]
    fn root_of_returns_containing_root() {
        let forest = sample();
        assert_eq!(forest.root_of(&id("T1a1")).map(|t| t.id.as_str()), Some("T1"));
        assert_eq!(forest.root_of(&id("T2")).map(|t| t.id.as_str()), Some("T2"));
        assert!(forest.root_of(&id("nope")).is_none());
    }

    #[test]
    fn update_rebuilds_only_the_path() {
        let forest = sample();
        let updated = forest.update(&id("T1a1"), |t| t.clone().with_completed(true));

        assert!(updated.find(&id("T1a1")).is_some_and(|t| t.completed));
        // T2 is off the path and must be shared.
        assert!(Arc::ptr_eq(&forest.as_slice()[1], &updated.as_slice()[1]));
        // T1b is a sibling of the rebuilt T1a.
        let old_t1b = forest.find(&id("T1b")).cloned();
        let new_t1b = updated.find(&id("T1b")).cloned();
        assert!(matches!((old_t1b, new_t1b), (Some(a), Some(b)) if Arc::ptr_eq(&a, &b)));
        // Ancestors are new nodes.
        assert!(!Arc::ptr_eq(&forest.as_slice()[0], &updated.as_slice()[0]));
    }

    #[test]
    fn update_root_level_target() {
        let forest = sample();
        let updated = forest.update(&id("T2"), |t| Task {
            text: "renamed".to_string(),
            ..t.clone()
        });
        assert_eq!(updated.as_slice()[1].text, "renamed");
        assert!(Arc::ptr_eq(&forest.as_slice()[0], &updated.as_slice()[0]));
    }

    #[test]
    fn update_missing_id_returns_same_forest() {
        let forest = sample();
        let updated = forest.update(&id("missing"), |t| t.clone().with_completed(true));
        assert!(updated.ptr_eq(&forest));
    }

    #[test]
    fn remove_nested_node() {
        let forest = sample();
        let pruned = forest.remove(&id("T1a"));
        assert!(!pruned.contains(&id("T1a")));
        assert!(!pruned.contains(&id("T1a1")));
        assert!(pruned.contains(&id("T1b")));
        assert_eq!(pruned.walk().count(), 3);
    }

    #[test]
    fn remove_root_node() {
        let pruned = sample().remove(&id("T1"));
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned.as_slice()[0].id.as_str(), "T2");
    }

    #[test]
    fn remove_missing_id_is_noop() {
        let forest = sample();
        assert!(forest.remove(&id("missing")).ptr_eq(&forest));
    }

    #[test]
    fn push_leaves_input_untouched() {
        let forest = sample();
        let grown = forest.push(task("T3"));
        assert_eq!(forest.len(), 2);
        assert_eq!(grown.len(), 3);
    }

    #[test]
    fn retain_roots_shares_kept_nodes() {
        let forest = sample();
        let only_t2 = forest.retain_roots(|t| t.id.as_str() == "T2");
        assert_eq!(only_t2.len(), 1);
        assert!(Arc::ptr_eq(&only_t2.as_slice()[0], &forest.as_slice()[1]));
    }
}
