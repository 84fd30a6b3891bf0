//! Entity model: lists, tasks, and the legacy flat subtask shape.
//!
//! These are plain data types. Validation happens only at construction
//! boundaries via [`normalize_text`]; everything else is bookkeeping done by
//! the reducer in the `tasklists` crate.

use crate::ids::{ListId, TaskId, UserId};
use crate::tree::Forest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trims user-supplied text, returning `None` when nothing is left.
///
/// Used for list names and task text alike.
///
/// # Examples
///
/// ```
/// use tasklists_core::model::normalize_text;
///
/// assert_eq!(normalize_text("  Buy milk "), Some("Buy milk".to_string()));
/// assert_eq!(normalize_text(" \t "), None);
/// ```
#[must_use]
pub fn normalize_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// SVG markup used as a list icon. Opaque to the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Icon(String);

const LIST_ICON_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><line x1="8" x2="21" y1="6" y2="6"/><line x1="8" x2="21" y1="12" y2="12"/><line x1="8" x2="21" y1="18" y2="18"/><line x1="3" x2="3.01" y1="6" y2="6"/><line x1="3" x2="3.01" y1="12" y2="12"/><line x1="3" x2="3.01" y1="18" y2="18"/></svg>"#;

const WELCOME_ICON_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><path d="M6 12h12M6 12l5-5M6 12l5 5"/></svg>"#;

impl Icon {
    /// Wraps SVG markup.
    #[must_use]
    pub fn new(svg: impl Into<String>) -> Self {
        Self(svg.into())
    }

    /// The bulleted-list icon used for the synthetic view and as the fallback
    /// when icon generation fails.
    #[must_use]
    pub fn fallback() -> Self {
        Self(LIST_ICON_SVG.to_string())
    }

    /// Icon of the seeded "Welcome!" list.
    #[must_use]
    pub fn welcome() -> Self {
        Self(WELCOME_ICON_SVG.to_string())
    }

    /// Returns the SVG markup.
    #[must_use]
    pub fn as_svg(&self) -> &str {
        &self.0
    }
}

impl Default for Icon {
    fn default() -> Self {
        Self::fallback()
    }
}

impl fmt::Display for Icon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named, user-owned grouping of tasks.
///
/// Tasks are not embedded; they live in the owner's forest keyed by
/// [`Task::list_id`]. Use [`ListView`] for the embedded representation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    /// Unique identifier
    pub id: ListId,
    /// Owning user
    pub owner: UserId,
    /// Display name (non-empty, trimmed)
    pub name: String,
    /// SVG icon
    pub icon: Icon,
}

impl TaskList {
    /// Creates a list. Callers are expected to pass an already-normalized name.
    #[must_use]
    pub const fn new(id: ListId, owner: UserId, name: String, icon: Icon) -> Self {
        Self {
            id,
            owner,
            name,
            icon,
        }
    }
}

/// A unit of work. Children are full task nodes of arbitrary depth.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier within the owner's task space
    pub id: TaskId,
    /// List the task (or its root) belongs to
    pub list_id: ListId,
    /// Owning user
    pub owner: UserId,
    /// Task text (non-empty, trimmed)
    pub text: String,
    /// Completion flag
    #[serde(default)]
    pub completed: bool,
    /// Optional due date / reminder
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// Nested subtasks
    #[serde(default)]
    pub subtasks: Forest,
}

impl Task {
    /// Creates an incomplete task with no children and no due date.
    #[must_use]
    pub fn new(id: TaskId, list_id: ListId, owner: UserId, text: String) -> Self {
        Self {
            id,
            list_id,
            owner,
            text,
            completed: false,
            due_date: None,
            subtasks: Forest::new(),
        }
    }

    /// Builder: replaces the children.
    #[must_use]
    pub fn with_subtasks(mut self, subtasks: Forest) -> Self {
        self.subtasks = subtasks;
        self
    }

    /// Builder: sets the completed flag.
    #[must_use]
    pub const fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// Builds a child of this task that inherits its list and owner.
    #[must_use]
    pub fn child(&self, id: TaskId, text: String) -> Self {
        Self::new(id, self.list_id.clone(), self.owner.clone(), text)
    }
}

/// Legacy one-level child shape: no further nesting, no due date.
///
/// Only accepted when reading old documents; it is converted into a canonical
/// [`Task`] with [`Subtask::into_task`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    /// Identifier
    pub id: TaskId,
    /// Text
    pub text: String,
    /// Completion flag
    #[serde(default)]
    pub completed: bool,
}

impl Subtask {
    /// Converts into a canonical task node under `parent`.
    #[must_use]
    pub fn into_task(self, parent: &Task) -> Task {
        parent.child(self.id, self.text).with_completed(self.completed)
    }
}

/// A list together with its tasks (the embedded representation).
///
/// Produced on every read; the synthetic "all" view is one of these with
/// [`ListView::synthetic`] set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListView {
    /// List metadata
    pub list: TaskList,
    /// Root tasks of the list
    pub tasks: Forest,
    /// Whether this is the synthetic "all tasks" view
    pub synthetic: bool,
}

impl ListView {
    /// Builds the synthetic "all tasks" view over `tasks`.
    #[must_use]
    pub fn all(owner: UserId, tasks: Forest) -> Self {
        Self {
            list: TaskList::new(ListId::all(), owner, "All Tasks".to_string(), Icon::fallback()),
            tasks,
            synthetic: true,
        }
    }
}
