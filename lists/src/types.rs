//! Domain types for the list/task store.
//!
//! [`ListsState`] is the committed, in-memory view of one user's lists and
//! tasks. [`ListsAction`] covers user commands, session changes, and the
//! feedback actions produced by effects (AI replies, write failures).

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tasklists_core::aggregate::TaskCounts;
use tasklists_core::document::SyncError;
use tasklists_core::environment::AssistantError;
use tasklists_core::ids::{ListId, TaskId, UserId};
use tasklists_core::model::{Icon, ListView, TaskList};
use tasklists_core::tree::Forest;

/// Where a new list's icon comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IconSource {
    /// Use this icon as-is
    Provided(Icon),
    /// Start with the default icon and ask the AI collaborator for one
    Generate,
}

/// Severity of a [`Notice`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    /// Informational hint
    Info,
    /// Something degraded but the operation stood (AI fallback)
    Warning,
    /// A change could not be saved
    Error,
}

/// A user-facing message recorded in state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Human-readable text
    pub message: String,
    /// When it was recorded
    pub at: DateTime<Utc>,
}

/// State of one signed-in user's task lists.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListsState {
    /// Signed-in user; every command is a no-op while `None`
    pub owner: Option<UserId>,
    /// Lists in insertion order
    pub lists: Vec<TaskList>,
    /// All of the owner's root tasks, across lists
    pub tasks: Forest,
    /// Whether a snapshot has been applied since sign-in
    pub loaded: bool,
    /// Messages for the user, oldest first
    pub notices: Vec<Notice>,
    /// Latest AI task suggestions, for [`ListsState::suggestions_for`]
    pub suggestions: Vec<String>,
    /// List of the newest suggestion request
    pub suggestions_for: Option<ListId>,
    /// Sequence number of the newest batch enqueued from this state;
    /// snapshots that do not reflect it are not applied
    pub last_write_seq: u64,
    /// Lists waiting on a generated icon
    pub pending_icons: HashSet<ListId>,
}

impl ListsState {
    /// Creates an empty, signed-out state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a real list.
    #[must_use]
    pub fn list(&self, id: &ListId) -> Option<&TaskList> {
        self.lists.iter().find(|list| list.id == *id)
    }

    /// Root tasks visible under `id`: every root for `"all"`, the list's own
    /// roots otherwise. Unknown ids yield `None`.
    #[must_use]
    pub fn forest_of(&self, id: &ListId) -> Option<Forest> {
        if id.is_all() {
            return Some(self.tasks.clone());
        }
        self.list(id)?;
        Some(self.tasks.retain_roots(|task| task.list_id == *id))
    }

    /// Suggestions from the newest request, if it was made for `list_id`.
    #[must_use]
    pub fn suggestions_of(&self, list_id: &ListId) -> &[String] {
        if self.suggestions_for.as_ref() == Some(list_id) {
            &self.suggestions
        } else {
            &[]
        }
    }

    /// Whether `task_id` is reachable from the roots visible under `list_id`.
    #[must_use]
    pub fn in_scope(&self, list_id: &ListId, task_id: &TaskId) -> bool {
        self.tasks
            .root_of(task_id)
            .is_some_and(|root| list_id.is_all() || root.list_id == *list_id)
    }

    /// Embedded view of one list, or of the synthetic `"all"` list.
    #[must_use]
    pub fn view(&self, id: &ListId) -> Option<ListView> {
        let owner = self.owner.clone()?;
        if id.is_all() {
            return Some(ListView::all(owner, self.tasks.clone()));
        }
        let list = self.list(id)?.clone();
        let tasks = self.tasks.retain_roots(|task| task.list_id == list.id);
        Some(ListView {
            list,
            tasks,
            synthetic: false,
        })
    }

    /// The synthetic `"all"` view followed by every real list.
    #[must_use]
    pub fn views(&self) -> Vec<ListView> {
        let Some(owner) = self.owner.clone() else {
            return Vec::new();
        };
        let mut views = Vec::with_capacity(self.lists.len() + 1);
        views.push(ListView::all(owner, self.tasks.clone()));
        views.extend(self.lists.iter().filter_map(|list| self.view(&list.id)));
        views
    }

    /// Task counts for a list (or `"all"`).
    #[must_use]
    pub fn counts(&self, id: &ListId) -> Option<TaskCounts> {
        self.forest_of(id).map(|forest| TaskCounts::of(&forest))
    }
}

/// Actions for the list/task store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListsAction {
    // Session
    /// A user signed in; state is reset if it belonged to someone else
    SignedIn {
        /// The user
        user: UserId,
    },
    /// The user signed out; state is cleared
    SignedOut,
    /// Fresh contents of both collections
    SnapshotReceived {
        /// User the snapshot belongs to
        user: UserId,
        /// Lists in document order
        lists: Vec<TaskList>,
        /// Root tasks
        tasks: Forest,
        /// Newest write batch the contents reflect
        synced_through: u64,
    },

    // Commands
    /// Create a list
    CreateList {
        /// Requested name (trimmed)
        name: String,
        /// Icon to use
        icon: IconSource,
    },
    /// Rename a list, optionally regenerating its icon
    RenameList {
        /// List to rename
        list_id: ListId,
        /// New name (trimmed)
        name: String,
        /// Ask the AI collaborator for a fresh icon
        regenerate_icon: bool,
    },
    /// Delete a list and its tasks
    DeleteList {
        /// List to delete
        list_id: ListId,
    },
    /// Add a root task
    AddTask {
        /// Target list, or `"all"` for the first list
        list_id: ListId,
        /// Task text (trimmed)
        text: String,
    },
    /// Add a child under an existing task
    AddSubtask {
        /// Lookup scope
        list_id: ListId,
        /// Parent node
        parent_id: TaskId,
        /// Child text (trimmed)
        text: String,
    },
    /// Flip a task's completed flag
    ToggleComplete {
        /// Lookup scope
        list_id: ListId,
        /// Task to toggle
        task_id: TaskId,
    },
    /// Replace a task's text
    UpdateTaskText {
        /// Lookup scope
        list_id: ListId,
        /// Task to edit
        task_id: TaskId,
        /// New text (trimmed)
        text: String,
    },
    /// Remove a task and its subtree
    DeleteTask {
        /// Lookup scope
        list_id: ListId,
        /// Task to remove
        task_id: TaskId,
    },
    /// Set or clear a task's due date
    SetTaskDueDate {
        /// Lookup scope
        list_id: ListId,
        /// Task to edit
        task_id: TaskId,
        /// New due date; `None` clears it
        due_date: Option<DateTime<Utc>>,
    },
    /// Ask the AI collaborator for related tasks
    SuggestTasks {
        /// List whose task texts are sent
        list_id: ListId,
    },
    /// Add one suggestion as a task and drop it from the suggestions
    AcceptSuggestion {
        /// Target list
        list_id: ListId,
        /// Suggested text
        text: String,
    },
    /// Forget all notices
    DismissNotices,

    // Effect feedback
    /// Result of an icon request
    ListIconGenerated {
        /// List the icon is for
        list_id: ListId,
        /// Generated icon or the failure
        result: Result<Icon, AssistantError>,
    },
    /// Result of a suggestion request
    SuggestionsReceived {
        /// List the suggestions are for
        list_id: ListId,
        /// Suggested texts or the failure
        result: Result<Vec<String>, AssistantError>,
    },
    /// A write batch could not be saved
    SyncFailed {
        /// Operation that produced the batch
        operation: &'static str,
        /// Why
        error: SyncError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasklists_core::model::Task;

    fn state() -> ListsState {
        let owner = UserId::new("u1");
        let work = TaskList::new(ListId::new("L1"), owner.clone(), "Work".into(), Icon::fallback());
        let home = TaskList::new(ListId::new("L2"), owner.clone(), "Home".into(), Icon::fallback());
        let report = Task::new(TaskId::new("T1"), work.id.clone(), owner.clone(), "Report".into());
        let draft = report.child(TaskId::new("T1a"), "Draft".into());
        let dishes = Task::new(TaskId::new("T2"), home.id.clone(), owner.clone(), "Dishes".into());
        ListsState {
            owner: Some(owner),
            lists: vec![work, home],
            tasks: [report.with_subtasks([draft].into_iter().collect()), dishes]
                .into_iter()
                .collect(),
            loaded: true,
            ..ListsState::default()
        }
    }

    #[test]
    fn views_put_all_first() {
        let views = state().views();
        let names: Vec<&str> = views.iter().map(|v| v.list.name.as_str()).collect();
        assert_eq!(names, ["All Tasks", "Work", "Home"]);
        assert!(views[0].synthetic);
        assert_eq!(views[0].tasks.len(), 2);
        assert_eq!(views[1].tasks.len(), 1);
    }

    #[test]
    fn scope_follows_the_root_list() {
        let state = state();
        assert!(state.in_scope(&ListId::new("L1"), &TaskId::new("T1a")));
        assert!(!state.in_scope(&ListId::new("L2"), &TaskId::new("T1a")));
        assert!(state.in_scope(&ListId::all(), &TaskId::new("T1a")));
        assert!(!state.in_scope(&ListId::all(), &TaskId::new("nope")));
    }

    #[test]
    fn counts_cover_nested_tasks() {
        let state = state();
        assert_eq!(state.counts(&ListId::new("L1")).map(|c| c.total), Some(2));
        assert_eq!(state.counts(&ListId::all()).map(|c| c.total), Some(3));
        assert_eq!(state.counts(&ListId::new("missing")), None);
    }

    #[test]
    fn signed_out_state_has_no_views() {
        assert!(ListsState::new().views().is_empty());
        assert!(ListsState::new().view(&ListId::all()).is_none());
    }

    #[test]
    fn suggestions_belong_to_one_list() {
        let state = ListsState {
            suggestions: vec!["Sweep".into()],
            suggestions_for: Some(ListId::new("L2")),
            ..state()
        };
        assert_eq!(state.suggestions_of(&ListId::new("L2")), ["Sweep"]);
        assert!(state.suggestions_of(&ListId::new("L1")).is_empty());
    }
}
