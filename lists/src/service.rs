//! Async facade over the lists store, and session wiring to the sync layer.

use crate::reducer::{ListsEnvironment, ListsReducer};
use crate::types::{IconSource, ListsAction, ListsState, Notice};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::sync::Arc;
use tasklists_core::aggregate::TaskCounts;
use tasklists_core::ids::{ListId, TaskId, UserId};
use tasklists_core::model::ListView;
use tasklists_core::tree::Forest;
use tasklists_runtime::{EffectHandle, Store, StoreError};
use tasklists_sync::{DocumentSync, Snapshot};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// The store type behind a [`TaskBoard`].
pub type ListsStore = Store<ListsState, ListsAction, ListsEnvironment, ListsReducer>;

/// One user's task lists.
///
/// Every mutation returns once local state has changed; the returned
/// [`EffectHandle`] completes when the matching writes (and any AI
/// follow-ups) have settled. Failures never surface as `Err` here: they are
/// recorded as [`Notice`]s and broadcast as [`ListsAction::SyncFailed`].
#[derive(Clone)]
pub struct TaskBoard {
    store: ListsStore,
}

impl TaskBoard {
    /// Creates a signed-out board.
    #[must_use]
    pub fn new(env: ListsEnvironment) -> Self {
        Self {
            store: Store::new(ListsState::new(), ListsReducer::new(), env),
        }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &ListsStore {
        &self.store
    }

    /// Feedback actions (write failures, AI results) as they happen.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ListsAction> {
        self.store.subscribe_actions()
    }

    async fn dispatch(&self, action: ListsAction) -> Result<EffectHandle, StoreError> {
        self.store.send(action).await
    }

    // ========== Session ==========

    /// Starts a session for `user`.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownInProgress`] once the store is shutting down.
    pub async fn sign_in(&self, user: UserId) -> Result<EffectHandle, StoreError> {
        self.dispatch(ListsAction::SignedIn { user }).await
    }

    /// Ends the session and clears all state.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownInProgress`] once the store is shutting down.
    pub async fn sign_out(&self) -> Result<EffectHandle, StoreError> {
        self.dispatch(ListsAction::SignedOut).await
    }

    /// Replaces the committed collections with a delivered snapshot.
    ///
    /// The snapshot is ignored when it predates a write this board has
    /// enqueued, see [`Snapshot::synced_through`].
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownInProgress`] once the store is shutting down.
    pub async fn apply_snapshot(&self, user: UserId, snapshot: Snapshot) -> Result<EffectHandle, StoreError> {
        self.dispatch(ListsAction::SnapshotReceived {
            user,
            lists: snapshot.lists,
            tasks: snapshot.tasks,
            synced_through: snapshot.synced_through,
        })
        .await
    }

    // ========== Lists ==========

    /// Creates a list.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownInProgress`] once the store is shutting down.
    pub async fn create_list(&self, name: &str, icon: IconSource) -> Result<EffectHandle, StoreError> {
        self.dispatch(ListsAction::CreateList {
            name: name.to_string(),
            icon,
        })
        .await
    }

    /// Renames a list, optionally asking for a new icon.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownInProgress`] once the store is shutting down.
    pub async fn rename_list(
        &self,
        list_id: &ListId,
        name: &str,
        regenerate_icon: bool,
    ) -> Result<EffectHandle, StoreError> {
        self.dispatch(ListsAction::RenameList {
            list_id: list_id.clone(),
            name: name.to_string(),
            regenerate_icon,
        })
        .await
    }

    /// Deletes a list and every task in it.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownInProgress`] once the store is shutting down.
    pub async fn delete_list(&self, list_id: &ListId) -> Result<EffectHandle, StoreError> {
        self.dispatch(ListsAction::DeleteList {
            list_id: list_id.clone(),
        })
        .await
    }

    // ========== Tasks ==========

    /// Adds a root task.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownInProgress`] once the store is shutting down.
    pub async fn add_task(&self, list_id: &ListId, text: &str) -> Result<EffectHandle, StoreError> {
        self.dispatch(ListsAction::AddTask {
            list_id: list_id.clone(),
            text: text.to_string(),
        })
        .await
    }

    /// Adds a child under `parent_id`.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownInProgress`] once the store is shutting down.
    pub async fn add_subtask(
        &self,
        list_id: &ListId,
        parent_id: &TaskId,
        text: &str,
    ) -> Result<EffectHandle, StoreError> {
        self.dispatch(ListsAction::AddSubtask {
            list_id: list_id.clone(),
            parent_id: parent_id.clone(),
            text: text.to_string(),
        })
        .await
    }

    /// Flips a task's completed flag.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownInProgress`] once the store is shutting down.
    pub async fn toggle_complete(
        &self,
        list_id: &ListId,
        task_id: &TaskId,
    ) -> Result<EffectHandle, StoreError> {
        self.dispatch(ListsAction::ToggleComplete {
            list_id: list_id.clone(),
            task_id: task_id.clone(),
        })
        .await
    }

    /// Replaces a task's text.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownInProgress`] once the store is shutting down.
    pub async fn update_task_text(
        &self,
        list_id: &ListId,
        task_id: &TaskId,
        text: &str,
    ) -> Result<EffectHandle, StoreError> {
        self.dispatch(ListsAction::UpdateTaskText {
            list_id: list_id.clone(),
            task_id: task_id.clone(),
            text: text.to_string(),
        })
        .await
    }

    /// Removes a task and its subtree.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownInProgress`] once the store is shutting down.
    pub async fn delete_task(&self, list_id: &ListId, task_id: &TaskId) -> Result<EffectHandle, StoreError> {
        self.dispatch(ListsAction::DeleteTask {
            list_id: list_id.clone(),
            task_id: task_id.clone(),
        })
        .await
    }

    /// Sets (`Some`) or clears (`None`) a task's due date.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownInProgress`] once the store is shutting down.
    pub async fn set_task_due_date(
        &self,
        list_id: &ListId,
        task_id: &TaskId,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<EffectHandle, StoreError> {
        self.dispatch(ListsAction::SetTaskDueDate {
            list_id: list_id.clone(),
            task_id: task_id.clone(),
            due_date,
        })
        .await
    }

    /// Asks the AI collaborator for tasks related to the list's.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownInProgress`] once the store is shutting down.
    pub async fn suggest_tasks(&self, list_id: &ListId) -> Result<EffectHandle, StoreError> {
        self.dispatch(ListsAction::SuggestTasks {
            list_id: list_id.clone(),
        })
        .await
    }

    /// Adds one suggestion to `list_id` and removes it from the suggestions.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownInProgress`] once the store is shutting down.
    pub async fn accept_suggestion(&self, list_id: &ListId, text: &str) -> Result<EffectHandle, StoreError> {
        self.dispatch(ListsAction::AcceptSuggestion {
            list_id: list_id.clone(),
            text: text.to_string(),
        })
        .await
    }

    /// Forgets all notices.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownInProgress`] once the store is shutting down.
    pub async fn dismiss_notices(&self) -> Result<EffectHandle, StoreError> {
        self.dispatch(ListsAction::DismissNotices).await
    }

    // ========== Reads ==========

    /// The synthetic "all" view first, then every list with its tasks.
    pub async fn lists(&self) -> Vec<ListView> {
        self.store.state(ListsState::views).await
    }

    /// One list (or `"all"`) with its tasks.
    pub async fn list(&self, id: &ListId) -> Option<ListView> {
        self.store.state(|state| state.view(id)).await
    }

    /// Task counts for a list (or `"all"`).
    pub async fn counts(&self, id: &ListId) -> Option<TaskCounts> {
        self.store.state(|state| state.counts(id)).await
    }

    /// Every root task across lists.
    pub async fn all_tasks(&self) -> Forest {
        self.store.state(|state| state.tasks.clone()).await
    }

    /// Recorded notices, oldest first.
    pub async fn notices(&self) -> Vec<Notice> {
        self.store.state(|state| state.notices.clone()).await
    }

    /// Latest AI task suggestions for `list_id`; empty when the newest
    /// request was for another list.
    pub async fn suggestions(&self, list_id: &ListId) -> Vec<String> {
        self.store.state(|state| state.suggestions_of(list_id).to_vec()).await
    }

    /// Whether a snapshot has arrived since sign-in.
    pub async fn is_loaded(&self) -> bool {
        self.store.state(|state| state.loaded).await
    }
}

/// A live signed-in session. Dropping it stops snapshot forwarding.
#[derive(Debug)]
pub struct Session {
    user: UserId,
    task: JoinHandle<()>,
}

impl Session {
    /// The signed-in user.
    #[must_use]
    pub const fn user(&self) -> &UserId {
        &self.user
    }

    /// Stops forwarding snapshots.
    pub fn close(self) {
        self.task.abort();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Signs `user` in and keeps `board` in step with their documents.
///
/// Every snapshot is forwarded to the board. The first snapshot that shows
/// no lists and no tasks triggers one seeding request; the adapter makes
/// seeding one-shot per account.
///
/// # Errors
///
/// [`StoreError::ShutdownInProgress`] once the store is shutting down.
pub async fn connect(board: &TaskBoard, sync: Arc<DocumentSync>, user: UserId) -> Result<Session, StoreError> {
    board.sign_in(user.clone()).await?;

    let mut snapshots = sync.snapshots(&user);
    let board = board.clone();
    let session_user = user.clone();
    let task = tokio::spawn(async move {
        let mut seeding_requested = false;
        while let Some(snapshot) = snapshots.next().await {
            if snapshot.is_empty() && !seeding_requested {
                seeding_requested = true;
                let sync = Arc::clone(&sync);
                let user = session_user.clone();
                tokio::spawn(async move {
                    match sync.seed_defaults(&user).await {
                        Ok(true) => tracing::info!(%user, "Seeded welcome list"),
                        Ok(false) => tracing::debug!(%user, "Seeding skipped"),
                        Err(error) => tracing::warn!(%user, %error, "Seeding failed"),
                    }
                });
            }

            let sent = board
                .apply_snapshot(session_user.clone(), snapshot)
                .await;
            if let Err(error) = sent {
                tracing::debug!(%error, "Store closed, stopping snapshot forwarding");
                break;
            }
        }
    });

    Ok(Session { user, task })
}
