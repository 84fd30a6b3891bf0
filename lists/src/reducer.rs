//! Reducer logic for the list/task store.
//!
//! Every command validates against the committed state, applies its change
//! immediately, and enqueues the matching document writes. Nothing is
//! rolled back when a write later fails; the failure comes back as
//! [`ListsAction::SyncFailed`] and is recorded as a notice.
//!
//! Snapshots are applied only once they include the newest batch enqueued
//! here, so a snapshot read while writes are queued cannot undo them.

use crate::types::{IconSource, ListsAction, ListsState, Notice, NoticeLevel};
use crate::writes;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tasklists_core::aggregate::collect_texts;
use tasklists_core::document::{DocumentError, DocumentWrite, WriteBatch};
use tasklists_core::effect::Effect;
use tasklists_core::environment::{
    AssistantError, Clock, IconGenerator, IdGenerator, TaskSuggester, WriteQueue,
};
use tasklists_core::ids::{ListId, TaskId, UserId};
use tasklists_core::model::{Icon, Task, TaskList, normalize_text};
use tasklists_core::reducer::{Effects, Reducer};
use tasklists_core::tree::Forest;
use tasklists_core::{SmallVec, smallvec};

/// Environment dependencies for the lists reducer
#[derive(Clone)]
pub struct ListsEnvironment {
    /// Clock for notice timestamps
    pub clock: Arc<dyn Clock>,
    /// Fresh list and task ids
    pub ids: Arc<dyn IdGenerator>,
    /// Ordered sink for document writes
    pub writes: Arc<dyn WriteQueue>,
    /// AI icon generation
    pub icons: Arc<dyn IconGenerator>,
    /// AI task suggestions
    pub suggester: Arc<dyn TaskSuggester>,
    /// Add every received suggestion as a task
    pub auto_add_suggestions: bool,
}

impl ListsEnvironment {
    /// Creates an environment; suggestions are not auto-added.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        writes: Arc<dyn WriteQueue>,
        icons: Arc<dyn IconGenerator>,
        suggester: Arc<dyn TaskSuggester>,
    ) -> Self {
        Self {
            clock,
            ids,
            writes,
            icons,
            suggester,
            auto_add_suggestions: false,
        }
    }

    /// Builder: add received suggestions as tasks
    #[must_use]
    pub const fn with_auto_add_suggestions(mut self, enabled: bool) -> Self {
        self.auto_add_suggestions = enabled;
        self
    }
}

/// Reducer for one user's task lists
#[derive(Clone, Copy, Debug, Default)]
pub struct ListsReducer;

impl ListsReducer {
    /// Creates a new `ListsReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn signed_in(state: &ListsState, operation: &str) -> Option<UserId> {
        let owner = state.owner.clone();
        if owner.is_none() {
            tracing::debug!(operation, "Ignored: nobody is signed in");
        }
        owner
    }

    fn notify(state: &mut ListsState, env: &ListsEnvironment, level: NoticeLevel, message: String) {
        state.notices.push(Notice {
            level,
            message,
            at: env.clock.now(),
        });
    }

    /// Enqueues `writes` and returns an effect that reports a failed receipt.
    fn persist(
        state: &mut ListsState,
        env: &ListsEnvironment,
        operation: &'static str,
        writes: Result<Vec<DocumentWrite>, DocumentError>,
    ) -> Effect<ListsAction> {
        let writes = match writes {
            Ok(writes) if writes.is_empty() => return Effect::None,
            Ok(writes) => writes,
            Err(error) => {
                tracing::error!(operation, %error, "Could not encode documents");
                Self::notify(
                    state,
                    env,
                    NoticeLevel::Error,
                    format!("Couldn't save changes ({operation}): {error}"),
                );
                return Effect::None;
            },
        };
        let receipt = env.writes.enqueue(WriteBatch::new(operation, writes));
        state.last_write_seq = state.last_write_seq.max(receipt.seq());
        Effect::future(async move {
            receipt
                .await
                .err()
                .map(|error| ListsAction::SyncFailed { operation, error })
        })
    }

    fn request_icon(env: &ListsEnvironment, list_id: ListId, topic: String) -> Effect<ListsAction> {
        let icons = Arc::clone(&env.icons);
        Effect::future(async move {
            let result = icons.generate_icon(&topic).await;
            Some(ListsAction::ListIconGenerated { list_id, result })
        })
    }

    // ========== Lists ==========

    fn create_list(
        state: &mut ListsState,
        env: &ListsEnvironment,
        name: &str,
        icon: IconSource,
    ) -> Effects<ListsAction> {
        let Some(owner) = Self::signed_in(state, "create_list") else {
            return SmallVec::new();
        };
        let Some(name) = normalize_text(name) else {
            tracing::debug!("Ignored create_list: empty name");
            return SmallVec::new();
        };

        let id = ListId::new(env.ids.next_id());
        let (icon, generate) = match icon {
            IconSource::Provided(icon) => (icon, false),
            IconSource::Generate => (Icon::fallback(), true),
        };
        let list = TaskList::new(id.clone(), owner, name.clone(), icon);
        let write = Self::persist(state, env, "create_list", writes::put_list(&list).map(|w| vec![w]));
        state.lists.push(list);
        tracing::info!(list_id = %id, "List created");

        if generate {
            state.pending_icons.insert(id.clone());
            smallvec![write, Self::request_icon(env, id, name)]
        } else {
            smallvec![write]
        }
    }

    fn rename_list(
        state: &mut ListsState,
        env: &ListsEnvironment,
        list_id: &ListId,
        name: &str,
        regenerate_icon: bool,
    ) -> Effects<ListsAction> {
        if Self::signed_in(state, "rename_list").is_none() {
            return SmallVec::new();
        }
        if list_id.is_all() {
            tracing::debug!("Ignored rename_list: the all-tasks view cannot be renamed");
            return SmallVec::new();
        }
        let Some(name) = normalize_text(name) else {
            tracing::debug!(%list_id, "Ignored rename_list: empty name");
            return SmallVec::new();
        };
        let Some(list) = state.lists.iter_mut().find(|list| list.id == *list_id) else {
            tracing::debug!(%list_id, "Ignored rename_list: no such list");
            return SmallVec::new();
        };
        if list.name == name {
            tracing::debug!(%list_id, "Ignored rename_list: name unchanged");
            return SmallVec::new();
        }

        list.name.clone_from(&name);
        let update = writes::update_list(list, writes::fields([("name", Value::String(name.clone()))]));
        let write = Self::persist(state, env, "rename_list", Ok(vec![update]));
        tracing::info!(%list_id, "List renamed");

        if regenerate_icon {
            state.pending_icons.insert(list_id.clone());
            smallvec![write, Self::request_icon(env, list_id.clone(), name)]
        } else {
            smallvec![write]
        }
    }

    fn icon_generated(
        state: &mut ListsState,
        env: &ListsEnvironment,
        list_id: &ListId,
        result: Result<Icon, AssistantError>,
    ) -> Effects<ListsAction> {
        state.pending_icons.remove(list_id);
        let Some(list) = state.lists.iter_mut().find(|list| list.id == *list_id) else {
            tracing::debug!(%list_id, "Dropped generated icon: list is gone");
            return SmallVec::new();
        };

        match result {
            Ok(icon) => {
                let svg = icon.as_svg().to_string();
                list.icon = icon;
                let update = writes::update_list(list, writes::fields([("icon", Value::String(svg))]));
                tracing::info!(%list_id, "List icon generated");
                smallvec![Self::persist(state, env, "set_list_icon", Ok(vec![update]))]
            },
            Err(error) => {
                tracing::warn!(%list_id, %error, "Icon generation failed, keeping current icon");
                let message = format!("Couldn't generate an icon for \"{}\"; keeping the current one.", list.name);
                Self::notify(state, env, NoticeLevel::Warning, message);
                SmallVec::new()
            },
        }
    }

    fn delete_list(
        state: &mut ListsState,
        env: &ListsEnvironment,
        list_id: &ListId,
    ) -> Effects<ListsAction> {
        if Self::signed_in(state, "delete_list").is_none() {
            return SmallVec::new();
        }
        if list_id.is_all() {
            tracing::debug!("Ignored delete_list: the all-tasks view cannot be deleted");
            return SmallVec::new();
        }
        let Some(position) = state.lists.iter().position(|list| list.id == *list_id) else {
            tracing::debug!(%list_id, "Ignored delete_list: no such list");
            return SmallVec::new();
        };

        let list = state.lists.remove(position);
        let mut batch: Vec<DocumentWrite> = state
            .tasks
            .iter()
            .filter(|task| task.list_id == *list_id)
            .map(|task| writes::delete_task(task))
            .collect();
        let removed_tasks = batch.len();
        batch.push(writes::delete_list(&list));

        state.tasks = state.tasks.retain_roots(|task| task.list_id != *list_id);
        state.pending_icons.remove(list_id);
        tracing::info!(%list_id, removed_tasks, "List deleted");

        smallvec![Self::persist(state, env, "delete_list", Ok(batch))]
    }

    // ========== Tasks ==========

    fn add_task(
        state: &mut ListsState,
        env: &ListsEnvironment,
        list_id: &ListId,
        text: &str,
    ) -> Effect<ListsAction> {
        let Some(owner) = Self::signed_in(state, "add_task") else {
            return Effect::None;
        };
        let Some(text) = normalize_text(text) else {
            tracing::debug!(%list_id, "Ignored add_task: empty text");
            return Effect::None;
        };
        let target = if list_id.is_all() {
            state.lists.first()
        } else {
            state.list(list_id)
        };
        let Some(target) = target.map(|list| list.id.clone()) else {
            tracing::debug!(%list_id, "Ignored add_task: no list to add to");
            return Effect::None;
        };

        let task = Task::new(TaskId::new(env.ids.next_id()), target, owner, text);
        let write = writes::put_task(&task, true).map(|w| vec![w]);
        tracing::info!(task_id = %task.id, list_id = %task.list_id, "Task added");
        state.tasks = state.tasks.push(task);
        Self::persist(state, env, "add_task", write)
    }

    fn add_subtask(
        state: &mut ListsState,
        env: &ListsEnvironment,
        list_id: &ListId,
        parent_id: &TaskId,
        text: &str,
    ) -> Effects<ListsAction> {
        if Self::signed_in(state, "add_subtask").is_none() {
            return SmallVec::new();
        }
        let Some(text) = normalize_text(text) else {
            tracing::debug!(%parent_id, "Ignored add_subtask: empty text");
            return SmallVec::new();
        };
        if !state.in_scope(list_id, parent_id) {
            tracing::debug!(%list_id, %parent_id, "Ignored add_subtask: no such parent");
            return SmallVec::new();
        }

        let child_id = TaskId::new(env.ids.next_id());
        state.tasks = state.tasks.update(parent_id, |parent| {
            let child = parent.child(child_id.clone(), text);
            parent.clone().with_subtasks(parent.subtasks.push(child))
        });
        tracing::info!(%parent_id, task_id = %child_id, "Subtask added");

        let changed = writes::task_changed(&state.tasks, &child_id, serde_json::Map::new());
        smallvec![Self::persist(state, env, "add_subtask", changed)]
    }

    /// Shared path for edits of a single node: scope check, transform, persist.
    fn edit_task(
        state: &mut ListsState,
        env: &ListsEnvironment,
        operation: &'static str,
        list_id: &ListId,
        task_id: &TaskId,
        edit: impl FnOnce(&Task) -> Option<(Task, &'static str, Value)>,
    ) -> Effects<ListsAction> {
        if Self::signed_in(state, operation).is_none() {
            return SmallVec::new();
        }
        if !state.in_scope(list_id, task_id) {
            tracing::debug!(operation, %list_id, %task_id, "Ignored: no such task");
            return SmallVec::new();
        }
        let Some((edited, field, value)) = state.tasks.find(task_id).and_then(|task| edit(&**task)) else {
            tracing::debug!(operation, %task_id, "Ignored: nothing changes");
            return SmallVec::new();
        };

        state.tasks = state.tasks.update(task_id, |_| edited);
        tracing::info!(operation, %task_id, "Task updated");

        let changed = writes::task_changed(&state.tasks, task_id, writes::fields([(field, value)]));
        smallvec![Self::persist(state, env, operation, changed)]
    }

    fn toggle_complete(
        state: &mut ListsState,
        env: &ListsEnvironment,
        list_id: &ListId,
        task_id: &TaskId,
    ) -> Effects<ListsAction> {
        Self::edit_task(state, env, "toggle_complete", list_id, task_id, |task| {
            let completed = !task.completed;
            Some((task.clone().with_completed(completed), "completed", Value::Bool(completed)))
        })
    }

    fn update_task_text(
        state: &mut ListsState,
        env: &ListsEnvironment,
        list_id: &ListId,
        task_id: &TaskId,
        text: &str,
    ) -> Effects<ListsAction> {
        let Some(text) = normalize_text(text) else {
            tracing::debug!(%task_id, "Ignored update_task_text: empty text");
            return SmallVec::new();
        };
        Self::edit_task(state, env, "update_task_text", list_id, task_id, |task| {
            if task.text == text {
                return None;
            }
            let mut edited = task.clone();
            edited.text.clone_from(&text);
            Some((edited, "text", Value::String(text)))
        })
    }

    fn set_task_due_date(
        state: &mut ListsState,
        env: &ListsEnvironment,
        list_id: &ListId,
        task_id: &TaskId,
        due_date: Option<DateTime<Utc>>,
    ) -> Effects<ListsAction> {
        Self::edit_task(state, env, "set_task_due_date", list_id, task_id, |task| {
            if task.due_date == due_date {
                return None;
            }
            let mut edited = task.clone();
            edited.due_date = due_date;
            Some((edited, "dueDate", writes::due_date_value(due_date)))
        })
    }

    fn delete_task(
        state: &mut ListsState,
        env: &ListsEnvironment,
        list_id: &ListId,
        task_id: &TaskId,
    ) -> Effects<ListsAction> {
        if Self::signed_in(state, "delete_task").is_none() {
            return SmallVec::new();
        }
        if !state.in_scope(list_id, task_id) {
            tracing::debug!(%list_id, %task_id, "Ignored delete_task: no such task");
            return SmallVec::new();
        }
        let Some(root) = state.tasks.root_of(task_id).cloned() else {
            return SmallVec::new();
        };

        state.tasks = state.tasks.remove(task_id);
        tracing::info!(%task_id, "Task deleted");

        let batch = if root.id == *task_id {
            Ok(vec![writes::delete_task(&root)])
        } else {
            state
                .tasks
                .find(&root.id)
                .map_or(Ok(Vec::new()), |root| writes::put_task(root, false).map(|w| vec![w]))
        };
        smallvec![Self::persist(state, env, "delete_task", batch)]
    }

    // ========== Suggestions ==========

    fn suggest_tasks(
        state: &mut ListsState,
        env: &ListsEnvironment,
        list_id: ListId,
    ) -> Effects<ListsAction> {
        if Self::signed_in(state, "suggest_tasks").is_none() {
            return SmallVec::new();
        }
        let Some(forest) = state.forest_of(&list_id) else {
            tracing::debug!(%list_id, "Ignored suggest_tasks: no such list");
            return SmallVec::new();
        };
        state.suggestions.clear();
        state.suggestions_for = Some(list_id.clone());
        let texts = collect_texts(&forest);
        if texts.is_empty() {
            Self::notify(
                state,
                env,
                NoticeLevel::Info,
                "Add at least one task to get suggestions.".to_string(),
            );
            return SmallVec::new();
        }

        let suggester = Arc::clone(&env.suggester);
        smallvec![Effect::future(async move {
            let result = suggester.suggest_tasks(&texts).await;
            Some(ListsAction::SuggestionsReceived { list_id, result })
        })]
    }

    fn suggestions_received(
        state: &mut ListsState,
        env: &ListsEnvironment,
        list_id: &ListId,
        result: Result<Vec<String>, AssistantError>,
    ) -> Effects<ListsAction> {
        if state.suggestions_for.as_ref() != Some(list_id) {
            tracing::debug!(%list_id, "Dropped suggestions: a newer request replaced them");
            return SmallVec::new();
        }
        match result {
            Ok(suggestions) if env.auto_add_suggestions => {
                tracing::info!(%list_id, count = suggestions.len(), "Adding suggestions as tasks");
                let effects: Effects<ListsAction> = suggestions
                    .iter()
                    .map(|text| Self::add_task(state, env, list_id, text))
                    .filter(|effect| !effect.is_none())
                    .collect();
                if !effects.is_empty() {
                    let message = format!("Added {} new tasks to your list.", effects.len());
                    Self::notify(state, env, NoticeLevel::Info, message);
                }
                effects
            },
            Ok(suggestions) => {
                tracing::info!(%list_id, count = suggestions.len(), "Suggestions received");
                state.suggestions = suggestions;
                SmallVec::new()
            },
            Err(error) => {
                tracing::warn!(%list_id, %error, "Task suggestions failed");
                state.suggestions.clear();
                Self::notify(
                    state,
                    env,
                    NoticeLevel::Warning,
                    "Couldn't get suggestions right now.".to_string(),
                );
                SmallVec::new()
            },
        }
    }

    fn accept_suggestion(
        state: &mut ListsState,
        env: &ListsEnvironment,
        list_id: &ListId,
        text: &str,
    ) -> Effects<ListsAction> {
        let effect = Self::add_task(state, env, list_id, text);
        if effect.is_none() {
            return SmallVec::new();
        }
        state.suggestions.retain(|suggestion| suggestion != text);
        smallvec![effect]
    }

    // ========== Session ==========

    fn signed_in_as(state: &mut ListsState, user: UserId) {
        if state.owner.as_ref() == Some(&user) {
            return;
        }
        tracing::info!(%user, "Signed in");
        *state = ListsState {
            owner: Some(user),
            ..ListsState::default()
        };
    }

    fn snapshot_received(
        state: &mut ListsState,
        user: &UserId,
        lists: Vec<TaskList>,
        tasks: Forest,
        synced_through: u64,
    ) {
        if state.owner.as_ref() != Some(user) {
            tracing::debug!(%user, "Dropped snapshot for another session");
            return;
        }
        // Older contents would undo local edits whose writes are still queued.
        if synced_through < state.last_write_seq {
            tracing::debug!(
                synced_through,
                last_write_seq = state.last_write_seq,
                "Dropped snapshot: local writes still in flight"
            );
            return;
        }
        let lists: Vec<TaskList> = lists
            .into_iter()
            .filter(|list| {
                if list.id.is_all() {
                    tracing::warn!(name = %list.name, "Dropped list with the reserved id");
                }
                !list.id.is_all()
            })
            .collect();
        tracing::debug!(lists = lists.len(), tasks = tasks.len(), "Snapshot applied");
        state.lists = lists;
        state.tasks = tasks;
        state.loaded = true;
    }
}

impl Reducer for ListsReducer {
    type State = ListsState;
    type Action = ListsAction;
    type Environment = ListsEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects<Self::Action> {
        match action {
            // ========== Session ==========
            ListsAction::SignedIn { user } => {
                Self::signed_in_as(state, user);
                SmallVec::new()
            },
            ListsAction::SignedOut => {
                tracing::info!("Signed out");
                *state = ListsState::default();
                SmallVec::new()
            },
            ListsAction::SnapshotReceived {
                user,
                lists,
                tasks,
                synced_through,
            } => {
                Self::snapshot_received(state, &user, lists, tasks, synced_through);
                SmallVec::new()
            },

            // ========== Commands ==========
            ListsAction::CreateList { name, icon } => Self::create_list(state, env, &name, icon),
            ListsAction::RenameList {
                list_id,
                name,
                regenerate_icon,
            } => Self::rename_list(state, env, &list_id, &name, regenerate_icon),
            ListsAction::DeleteList { list_id } => Self::delete_list(state, env, &list_id),
            ListsAction::AddTask { list_id, text } => {
                match Self::add_task(state, env, &list_id, &text) {
                    Effect::None => SmallVec::new(),
                    effect => smallvec![effect],
                }
            },
            ListsAction::AddSubtask {
                list_id,
                parent_id,
                text,
            } => Self::add_subtask(state, env, &list_id, &parent_id, &text),
            ListsAction::ToggleComplete { list_id, task_id } => {
                Self::toggle_complete(state, env, &list_id, &task_id)
            },
            ListsAction::UpdateTaskText {
                list_id,
                task_id,
                text,
            } => Self::update_task_text(state, env, &list_id, &task_id, &text),
            ListsAction::DeleteTask { list_id, task_id } => {
                Self::delete_task(state, env, &list_id, &task_id)
            },
            ListsAction::SetTaskDueDate {
                list_id,
                task_id,
                due_date,
            } => Self::set_task_due_date(state, env, &list_id, &task_id, due_date),
            ListsAction::SuggestTasks { list_id } => Self::suggest_tasks(state, env, list_id),
            ListsAction::AcceptSuggestion { list_id, text } => {
                Self::accept_suggestion(state, env, &list_id, &text)
            },
            ListsAction::DismissNotices => {
                state.notices.clear();
                SmallVec::new()
            },

            // ========== Effect feedback ==========
            ListsAction::ListIconGenerated { list_id, result } => {
                Self::icon_generated(state, env, &list_id, result)
            },
            ListsAction::SuggestionsReceived { list_id, result } => {
                Self::suggestions_received(state, env, &list_id, result)
            },
            ListsAction::SyncFailed { operation, error } => {
                tracing::error!(operation, %error, "Change was not saved");
                Self::notify(
                    state,
                    env,
                    NoticeLevel::Error,
                    format!("Couldn't save changes ({operation}): {error}"),
                );
                SmallVec::new()
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use tasklists_core::document::{CollectionPath, SyncError};
    use tasklists_testing::{
        RecordingWriteQueue, ReducerTest, ScriptedAssistant, SequentialIds, assertions,
        collect_actions, test_clock,
    };

    fn owner() -> UserId {
        UserId::new("u1")
    }

    fn env_with(writes: Arc<RecordingWriteQueue>, assistant: Arc<ScriptedAssistant>) -> ListsEnvironment {
        ListsEnvironment::new(
            Arc::new(test_clock()),
            Arc::new(SequentialIds::new("id")),
            writes,
            assistant.clone(),
            assistant,
        )
    }

    fn test_env() -> (ListsEnvironment, Arc<RecordingWriteQueue>) {
        let writes = Arc::new(RecordingWriteQueue::new());
        let env = env_with(writes.clone(), Arc::new(ScriptedAssistant::default()));
        (env, writes)
    }

    fn list(id: &str, name: &str) -> TaskList {
        TaskList::new(ListId::new(id), owner(), name.to_string(), Icon::fallback())
    }

    fn task(id: &str, list_id: &str, text: &str) -> Task {
        Task::new(TaskId::new(id), ListId::new(list_id), owner(), text.to_string())
    }

    /// Work: T1 "Plan trip" → T1a "Book flights"; Home: T2 "Dishes"
    fn seeded_state() -> ListsState {
        let trip = task("T1", "L1", "Plan trip");
        let flights = trip.child(TaskId::new("T1a"), "Book flights".into());
        ListsState {
            owner: Some(owner()),
            lists: vec![list("L1", "Work"), list("L2", "Home")],
            tasks: [trip.with_subtasks([flights].into_iter().collect()), task("T2", "L2", "Dishes")]
                .into_iter()
                .collect(),
            loaded: true,
            ..ListsState::default()
        }
    }

    fn signed_in_state() -> ListsState {
        ListsState {
            owner: Some(owner()),
            loaded: true,
            ..ListsState::default()
        }
    }

    #[test]
    fn create_list_appends_and_writes() {
        let (env, writes) = test_env();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(signed_in_state())
            .when_action(ListsAction::CreateList {
                name: "  Groceries ".into(),
                icon: IconSource::Provided(Icon::new("<svg/>")),
            })
            .then_state(|state| {
                assert_eq!(state.lists.len(), 1);
                assert_eq!(state.lists[0].id, ListId::new("id-1"));
                assert_eq!(state.lists[0].name, "Groceries");
                assert_eq!(state.lists[0].icon, Icon::new("<svg/>"));
                assert!(state.pending_icons.is_empty());
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();

        assert_eq!(writes.operations(), ["create_list"]);
    }

    #[test]
    fn blank_names_and_texts_are_ignored() {
        let (env, writes) = test_env();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(seeded_state())
            .when_action(ListsAction::CreateList { name: "   ".into(), icon: IconSource::Generate })
            .when_action(ListsAction::AddTask { list_id: ListId::new("L1"), text: "\t".into() })
            .when_action(ListsAction::AddSubtask {
                list_id: ListId::new("L1"),
                parent_id: TaskId::new("T1"),
                text: String::new(),
            })
            .when_action(ListsAction::UpdateTaskText {
                list_id: ListId::new("L1"),
                task_id: TaskId::new("T1"),
                text: " ".into(),
            })
            .then_state_unchanged()
            .then_effects(assertions::assert_no_effects)
            .run();

        assert!(writes.batches().is_empty());
    }

    #[test]
    fn commands_need_a_signed_in_user() {
        let (env, writes) = test_env();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(ListsState::new())
            .when_action(ListsAction::CreateList {
                name: "Work".into(),
                icon: IconSource::Provided(Icon::fallback()),
            })
            .when_action(ListsAction::AddTask { list_id: ListId::all(), text: "x".into() })
            .then_state_unchanged()
            .then_effects(assertions::assert_no_effects)
            .run();

        assert!(writes.batches().is_empty());
    }

    #[test]
    fn generated_icon_starts_with_fallback() {
        let (env, _writes) = test_env();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(signed_in_state())
            .when_action(ListsAction::CreateList { name: "Travel".into(), icon: IconSource::Generate })
            .then_state(|state| {
                assert_eq!(state.lists[0].icon, Icon::fallback());
                assert!(state.pending_icons.contains(&ListId::new("id-1")));
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 2))
            .run();
    }

    #[tokio::test]
    async fn icon_effect_reports_the_generated_icon() {
        let writes = Arc::new(RecordingWriteQueue::new());
        let assistant = Arc::new(ScriptedAssistant::new(Icon::new("<svg>plane</svg>"), Vec::new()));
        let env = env_with(writes, assistant.clone());
        let mut state = signed_in_state();

        let effects = ListsReducer.reduce(
            &mut state,
            ListsAction::CreateList { name: "Travel".into(), icon: IconSource::Generate },
            &env,
        );
        let actions = collect_actions(effects).await;

        assert_eq!(
            actions,
            [ListsAction::ListIconGenerated {
                list_id: ListId::new("id-1"),
                result: Ok(Icon::new("<svg>plane</svg>")),
            }]
        );
        assert_eq!(assistant.icon_requests(), ["Travel"]);
    }

    #[test]
    fn generated_icon_is_applied_and_saved() {
        let (env, writes) = test_env();
        let mut state = signed_in_state();
        state.lists.push(list("L1", "Travel"));
        state.pending_icons.insert(ListId::new("L1"));

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(state)
            .when_action(ListsAction::ListIconGenerated {
                list_id: ListId::new("L1"),
                result: Ok(Icon::new("<svg>plane</svg>")),
            })
            .then_state(|state| {
                assert_eq!(state.lists[0].icon, Icon::new("<svg>plane</svg>"));
                assert!(state.pending_icons.is_empty());
            })
            .run();

        let batches = writes.batches();
        assert_eq!(batches.len(), 1);
        let DocumentWrite::Update { fields, .. } = &batches[0].writes[0] else {
            unreachable!("icon changes are field updates");
        };
        assert_eq!(fields["icon"], "<svg>plane</svg>");
    }

    #[test]
    fn failed_icon_keeps_the_old_one_and_warns() {
        let (env, writes) = test_env();
        let mut state = signed_in_state();
        state.lists.push(list("L1", "Travel"));

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(state)
            .when_action(ListsAction::ListIconGenerated {
                list_id: ListId::new("L1"),
                result: Err(AssistantError::RequestFailed("quota".into())),
            })
            .then_state(|state| {
                assert_eq!(state.lists[0].icon, Icon::fallback());
                assert_eq!(state.notices.len(), 1);
                assert_eq!(state.notices[0].level, NoticeLevel::Warning);
                assert_eq!(state.notices[0].at, test_clock().now());
            })
            .then_effects(assertions::assert_no_effects)
            .run();

        assert!(writes.batches().is_empty());
    }

    #[test]
    fn rename_applies_immediately() {
        let (env, writes) = test_env();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(seeded_state())
            .when_action(ListsAction::RenameList {
                list_id: ListId::new("L1"),
                name: " Office ".into(),
                regenerate_icon: true,
            })
            .then_state(|state| {
                assert_eq!(state.lists[0].name, "Office");
                assert!(state.pending_icons.contains(&ListId::new("L1")));
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 2))
            .run();

        assert_eq!(writes.operations(), ["rename_list"]);
    }

    #[test]
    fn rename_no_ops() {
        let (env, writes) = test_env();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(seeded_state())
            .when_action(ListsAction::RenameList {
                list_id: ListId::all(),
                name: "Everything".into(),
                regenerate_icon: false,
            })
            .when_action(ListsAction::RenameList {
                list_id: ListId::new("missing"),
                name: "X".into(),
                regenerate_icon: false,
            })
            .when_action(ListsAction::RenameList {
                list_id: ListId::new("L1"),
                name: "Work".into(),
                regenerate_icon: true,
            })
            .then_state_unchanged()
            .then_effects(assertions::assert_no_effects)
            .run();

        assert!(writes.batches().is_empty());
    }

    #[test]
    fn add_task_to_all_goes_to_first_list() {
        let (env, _writes) = test_env();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(seeded_state())
            .when_action(ListsAction::AddTask { list_id: ListId::all(), text: "Call mom".into() })
            .then_state(|state| {
                let added = state.tasks.find(&TaskId::new("id-1")).unwrap();
                assert_eq!(added.list_id, ListId::new("L1"));
                assert_eq!(added.text, "Call mom");
                assert_eq!(state.tasks.len(), 3);
            })
            .run();
    }

    #[test]
    fn add_task_to_all_without_lists_is_a_no_op() {
        let (env, writes) = test_env();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(signed_in_state())
            .when_action(ListsAction::AddTask { list_id: ListId::all(), text: "Orphan".into() })
            .then_state(|state| assert!(state.tasks.is_empty()))
            .then_effects(assertions::assert_no_effects)
            .run();

        assert!(writes.batches().is_empty());
    }

    #[test]
    fn add_task_to_unknown_list_is_a_no_op() {
        let (env, _writes) = test_env();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(seeded_state())
            .when_action(ListsAction::AddTask { list_id: ListId::new("L9"), text: "x".into() })
            .then_state_unchanged()
            .run();
    }

    // Scenario A: nested subtask added, toggled, and counted
    #[test]
    fn subtask_toggle_updates_counts() {
        let (env, writes) = test_env();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(seeded_state())
            .when_action(ListsAction::AddSubtask {
                list_id: ListId::new("L1"),
                parent_id: TaskId::new("T1a"),
                text: "Compare prices".into(),
            })
            .when_action(ListsAction::ToggleComplete {
                list_id: ListId::new("L1"),
                task_id: TaskId::new("id-1"),
            })
            .then_state(|state| {
                let grandchild = state.tasks.find(&TaskId::new("id-1")).unwrap();
                assert!(grandchild.completed);
                assert_eq!(grandchild.list_id, ListId::new("L1"));
                let counts = state.counts(&ListId::new("L1")).unwrap();
                assert_eq!((counts.total, counts.completed, counts.incomplete), (3, 1, 2));
            })
            .run();

        let batches = writes.batches();
        assert_eq!(writes.operations(), ["add_subtask", "toggle_complete"]);
        for batch in &batches {
            let [DocumentWrite::Set { id, merge, .. }] = batch.writes.as_slice() else {
                unreachable!("nested changes rewrite the root");
            };
            assert_eq!(id, "T1");
            assert!(!merge);
        }
    }

    // Scenario B: deleting a list cascades to its tasks
    #[test]
    fn delete_list_cascades() {
        let (env, writes) = test_env();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(seeded_state())
            .when_action(ListsAction::DeleteList { list_id: ListId::new("L1") })
            .then_state(|state| {
                assert_eq!(state.lists.len(), 1);
                assert!(!state.tasks.contains(&TaskId::new("T1")));
                assert!(!state.tasks.contains(&TaskId::new("T1a")));
                assert!(state.tasks.contains(&TaskId::new("T2")));
            })
            .run();

        let batches = writes.batches();
        assert_eq!(batches.len(), 1);
        let targets: Vec<(String, &str)> = batches[0]
            .writes
            .iter()
            .map(|write| (write.path().to_string(), write.id()))
            .collect();
        assert_eq!(
            targets,
            [
                (CollectionPath::tasks(owner()).to_string(), "T1"),
                (CollectionPath::lists(owner()).to_string(), "L1"),
            ]
        );
    }

    #[test]
    fn delete_all_is_a_no_op() {
        let (env, writes) = test_env();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(seeded_state())
            .when_action(ListsAction::DeleteList { list_id: ListId::all() })
            .then_state_unchanged()
            .then_effects(assertions::assert_no_effects)
            .run();

        assert!(writes.batches().is_empty());
    }

    // Scenario C: lookups are scoped to the list
    #[test]
    fn edits_outside_the_list_scope_are_ignored() {
        let (env, writes) = test_env();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(seeded_state())
            .when_action(ListsAction::ToggleComplete {
                list_id: ListId::new("L2"),
                task_id: TaskId::new("T1a"),
            })
            .when_action(ListsAction::DeleteTask {
                list_id: ListId::new("L2"),
                task_id: TaskId::new("T1"),
            })
            .then_state_unchanged()
            .then_effects(assertions::assert_no_effects)
            .run();

        assert!(writes.batches().is_empty());
    }

    #[test]
    fn all_scope_reaches_every_task() {
        let (env, _writes) = test_env();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(seeded_state())
            .when_action(ListsAction::UpdateTaskText {
                list_id: ListId::all(),
                task_id: TaskId::new("T2"),
                text: "Wash dishes".into(),
            })
            .then_state(|state| {
                assert_eq!(state.tasks.find(&TaskId::new("T2")).unwrap().text, "Wash dishes");
            })
            .run();
    }

    // Scenario D: deleting a nested task keeps its root
    #[test]
    fn delete_nested_task_rewrites_root() {
        let (env, writes) = test_env();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(seeded_state())
            .when_action(ListsAction::DeleteTask {
                list_id: ListId::new("L1"),
                task_id: TaskId::new("T1a"),
            })
            .then_state(|state| {
                let root = state.tasks.find(&TaskId::new("T1")).unwrap();
                assert!(root.subtasks.is_empty());
            })
            .run();

        let batches = writes.batches();
        let [DocumentWrite::Set { id, data, .. }] = batches[0].writes.as_slice() else {
            unreachable!("nested deletes rewrite the root");
        };
        assert_eq!(id, "T1");
        assert_eq!(data["subtasks"], serde_json::json!([]));
    }

    #[test]
    fn delete_root_task_deletes_its_document() {
        let (env, writes) = test_env();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(seeded_state())
            .when_action(ListsAction::DeleteTask {
                list_id: ListId::new("L2"),
                task_id: TaskId::new("T2"),
            })
            .then_state(|state| assert_eq!(state.tasks.len(), 1))
            .run();

        assert!(matches!(
            writes.batches()[0].writes.as_slice(),
            [DocumentWrite::Delete { id, .. }] if id == "T2"
        ));
    }

    #[test]
    fn due_dates_set_and_clear() {
        let (env, writes) = test_env();
        let due = test_clock().now();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(seeded_state())
            .when_action(ListsAction::SetTaskDueDate {
                list_id: ListId::new("L2"),
                task_id: TaskId::new("T2"),
                due_date: Some(due),
            })
            .when_action(ListsAction::SetTaskDueDate {
                list_id: ListId::new("L2"),
                task_id: TaskId::new("T2"),
                due_date: None,
            })
            .then_state(|state| {
                assert_eq!(state.tasks.find(&TaskId::new("T2")).unwrap().due_date, None);
            })
            .run();

        let batches = writes.batches();
        assert_eq!(batches.len(), 2);
        let DocumentWrite::Update { fields, .. } = &batches[1].writes[0] else {
            unreachable!("root due dates are field updates");
        };
        assert_eq!(fields["dueDate"], Value::Null);
    }

    // Scenario E: a failed write leaves local state alone
    #[tokio::test]
    async fn failed_write_records_notice_without_rollback() {
        let writes = Arc::new(RecordingWriteQueue::failing_with(SyncError::QueueClosed));
        let env = env_with(writes, Arc::new(ScriptedAssistant::default()));
        let mut state = seeded_state();

        let effects = ListsReducer.reduce(
            &mut state,
            ListsAction::ToggleComplete { list_id: ListId::new("L2"), task_id: TaskId::new("T2") },
            &env,
        );
        let feedback = collect_actions(effects).await;
        assert_eq!(
            feedback,
            [ListsAction::SyncFailed { operation: "toggle_complete", error: SyncError::QueueClosed }]
        );

        for action in feedback {
            let _ = ListsReducer.reduce(&mut state, action, &env);
        }
        assert!(state.tasks.find(&TaskId::new("T2")).unwrap().completed);
        assert_eq!(state.notices.len(), 1);
        assert_eq!(state.notices[0].level, NoticeLevel::Error);
    }

    #[test]
    fn suggest_with_no_tasks_asks_for_one() {
        let (env, _writes) = test_env();
        let mut state = signed_in_state();
        state.lists.push(list("L1", "Empty"));
        state.suggestions = vec!["from before".into()];
        state.suggestions_for = Some(ListId::new("L1"));

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(state)
            .when_action(ListsAction::SuggestTasks { list_id: ListId::new("L1") })
            .then_state(|state| {
                assert_eq!(state.notices.len(), 1);
                assert_eq!(state.notices[0].level, NoticeLevel::Info);
                assert!(state.suggestions.is_empty());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[tokio::test]
    async fn suggestions_send_every_text_depth_first() {
        let writes = Arc::new(RecordingWriteQueue::new());
        let assistant = Arc::new(ScriptedAssistant::new(Icon::fallback(), vec!["Pack bags".into()]));
        let env = env_with(writes, assistant.clone());
        let mut state = seeded_state();

        let effects =
            ListsReducer.reduce(&mut state, ListsAction::SuggestTasks { list_id: ListId::new("L1") }, &env);
        let actions = collect_actions(effects).await;

        assert_eq!(assistant.suggestion_requests(), [vec!["Plan trip".to_string(), "Book flights".to_string()]]);
        assert_eq!(
            actions,
            [ListsAction::SuggestionsReceived {
                list_id: ListId::new("L1"),
                result: Ok(vec!["Pack bags".to_string()]),
            }]
        );
    }

    #[test]
    fn suggestions_are_added_when_configured() {
        let writes = Arc::new(RecordingWriteQueue::new());
        let env = env_with(writes.clone(), Arc::new(ScriptedAssistant::default()))
            .with_auto_add_suggestions(true);

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(ListsState {
                suggestions_for: Some(ListId::new("L2")),
                ..seeded_state()
            })
            .when_action(ListsAction::SuggestionsReceived {
                list_id: ListId::new("L2"),
                result: Ok(vec!["Dry dishes".into(), "Sweep".into()]),
            })
            .then_state(|state| {
                assert!(state.suggestions.is_empty());
                assert_eq!(state.forest_of(&ListId::new("L2")).unwrap().len(), 3);
                assert_eq!(state.notices.len(), 1);
                assert_eq!(state.notices[0].level, NoticeLevel::Info);
                assert_eq!(state.notices[0].message, "Added 2 new tasks to your list.");
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 2))
            .run();

        assert_eq!(writes.operations(), ["add_task", "add_task"]);
    }

    #[test]
    fn failed_suggestions_clear_and_warn() {
        let (env, _writes) = test_env();
        let mut state = seeded_state();
        state.suggestions = vec!["stale".into()];
        state.suggestions_for = Some(ListId::new("L1"));

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(state)
            .when_action(ListsAction::SuggestionsReceived {
                list_id: ListId::new("L1"),
                result: Err(AssistantError::Unavailable("offline".into())),
            })
            .then_state(|state| {
                assert!(state.suggestions.is_empty());
                assert_eq!(state.notices[0].level, NoticeLevel::Warning);
            })
            .run();
    }

    #[test]
    fn sign_in_as_someone_else_resets_state() {
        let (env, _writes) = test_env();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(seeded_state())
            .when_action(ListsAction::SignedIn { user: UserId::new("u2") })
            .then_state(|state| {
                assert_eq!(state.owner, Some(UserId::new("u2")));
                assert!(state.lists.is_empty());
                assert!(state.tasks.is_empty());
                assert!(!state.loaded);
            })
            .run();
    }

    #[test]
    fn snapshots_for_other_users_are_dropped() {
        let (env, _writes) = test_env();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(signed_in_state())
            .when_action(ListsAction::SnapshotReceived {
                user: UserId::new("u2"),
                lists: vec![list("L1", "Theirs")],
                tasks: Forest::new(),
                synced_through: 0,
            })
            .then_state(|state| assert!(state.lists.is_empty()))
            .run();
    }

    #[test]
    fn snapshot_replaces_collections() {
        let (env, _writes) = test_env();
        let snapshot = seeded_state();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(ListsState { loaded: false, ..signed_in_state() })
            .when_action(ListsAction::SnapshotReceived {
                user: owner(),
                lists: snapshot.lists.clone(),
                tasks: snapshot.tasks.clone(),
                synced_through: 0,
            })
            .then_state(move |state| {
                assert!(state.loaded);
                assert_eq!(state.lists, snapshot.lists);
                assert_eq!(state.tasks, snapshot.tasks);
            })
            .run();
    }

    // Scenario F: a snapshot read before a queued write must not undo it
    #[test]
    fn snapshots_older_than_local_writes_are_skipped() {
        let (env, writes) = test_env();
        let remote = seeded_state();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(seeded_state())
            .when_action(ListsAction::ToggleComplete { list_id: ListId::new("L2"), task_id: TaskId::new("T2") })
            .when_action(ListsAction::SnapshotReceived {
                user: owner(),
                lists: remote.lists.clone(),
                tasks: remote.tasks.clone(),
                synced_through: 0,
            })
            .then_state(|state| {
                assert_eq!(state.last_write_seq, 1);
                assert!(state.tasks.find(&TaskId::new("T2")).unwrap().completed);
            })
            .run();

        assert_eq!(writes.operations(), ["toggle_complete"]);
    }

    #[test]
    fn snapshots_that_include_local_writes_apply() {
        let (env, _writes) = test_env();
        let remote = seeded_state();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(ListsState { last_write_seq: 4, ..seeded_state() })
            .when_action(ListsAction::SnapshotReceived {
                user: owner(),
                lists: vec![list("L2", "Home")],
                tasks: remote.tasks.retain_roots(|task| task.list_id == ListId::new("L2")),
                synced_through: 4,
            })
            .then_state(|state| {
                let names: Vec<&str> = state.lists.iter().map(|list| list.name.as_str()).collect();
                assert_eq!(names, ["Home"]);
                assert_eq!(state.tasks.len(), 1);
            })
            .run();
    }

    #[test]
    fn the_all_tasks_view_cannot_be_renamed_or_shadowed() {
        let (env, writes) = test_env();
        let mut state = seeded_state();
        state.lists.push(list(ListId::ALL, "All Tasks"));

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(state)
            .when_action(ListsAction::RenameList {
                list_id: ListId::all(),
                name: "Hacked".into(),
                regenerate_icon: false,
            })
            .then_state(|state| assert_eq!(state.lists[2].name, "All Tasks"))
            .then_effects(assertions::assert_no_effects)
            .run();
        assert!(writes.batches().is_empty());

        let (env, _writes) = test_env();
        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(signed_in_state())
            .when_action(ListsAction::SnapshotReceived {
                user: owner(),
                lists: vec![list(ListId::ALL, "Hacked"), list("L1", "Work")],
                tasks: Forest::new(),
                synced_through: 0,
            })
            .then_state(|state| {
                let views = state.views();
                let names: Vec<&str> = views.iter().map(|view| view.list.name.as_str()).collect();
                assert_eq!(names, ["All Tasks", "Work"]);
            })
            .run();
    }

    #[test]
    fn accepted_suggestions_become_tasks() {
        let (env, writes) = test_env();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(ListsState {
                suggestions: vec!["Sweep".into(), "Dry dishes".into()],
                suggestions_for: Some(ListId::new("L2")),
                ..seeded_state()
            })
            .when_action(ListsAction::AcceptSuggestion {
                list_id: ListId::new("L2"),
                text: "Sweep".into(),
            })
            .then_state(|state| {
                assert_eq!(state.suggestions, ["Dry dishes"]);
                let home = state.forest_of(&ListId::new("L2")).unwrap();
                let texts: Vec<&str> = home.iter().map(|task| task.text.as_str()).collect();
                assert_eq!(texts, ["Dishes", "Sweep"]);
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();

        assert_eq!(writes.operations(), ["add_task"]);
    }

    #[test]
    fn suggestions_for_an_earlier_request_are_dropped() {
        let (env, _writes) = test_env();

        ReducerTest::new(ListsReducer::new())
            .with_env(env)
            .given_state(seeded_state())
            .when_action(ListsAction::SuggestTasks { list_id: ListId::new("L1") })
            .when_action(ListsAction::SuggestTasks { list_id: ListId::new("L2") })
            .when_action(ListsAction::SuggestionsReceived {
                list_id: ListId::new("L1"),
                result: Ok(vec!["Pack bags".into()]),
            })
            .then_state(|state| {
                assert_eq!(state.suggestions_for, Some(ListId::new("L2")));
                assert!(state.suggestions.is_empty());
                assert!(state.suggestions_of(&ListId::new("L1")).is_empty());
            })
            .run();
    }
}
