//! Persistent document shapes and the document store abstraction.
//!
//! Each user owns two collections:
//!
//! - `users/{uid}/lists`: one [`ListDocument`] per list
//! - `users/{uid}/tasks`: one [`TaskDocument`] per root task, with nested
//!   subtasks embedded in its `subtasks` array
//!
//! Field names are camelCase on the wire. Two historical shapes are accepted
//! on read: list documents that embed their tasks, and flat subtasks that
//! only carry `{id, text, completed}`. Writes always use the canonical
//! shape.
//!
//! The store itself is behind the [`DocumentStore`] trait. It uses explicit
//! boxed futures instead of `async fn` so it can be shared as
//! `Arc<dyn DocumentStore>`.

use crate::ids::{ListId, TaskId, UserId};
use crate::model::{Icon, Subtask, Task, TaskList};
use crate::tree::Forest;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Errors reported by a [`DocumentStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// `update` targeted a document that does not exist.
    #[error("Document {id} not found in {path}")]
    NotFound {
        /// Collection path
        path: String,
        /// Document id
        id: String,
    },

    /// The backing store could not be reached.
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    /// The caller is not allowed to touch the collection.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DocumentError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Which of the two per-user collections a path names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    /// `users/{uid}/lists`
    Lists,
    /// `users/{uid}/tasks`
    Tasks,
}

/// A per-user collection address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    /// Owner of the collection
    pub user: UserId,
    /// Collection within the owner's space
    pub kind: CollectionKind,
}

impl CollectionPath {
    /// `users/{uid}/lists`
    #[must_use]
    pub const fn lists(user: UserId) -> Self {
        Self {
            user,
            kind: CollectionKind::Lists,
        }
    }

    /// `users/{uid}/tasks`
    #[must_use]
    pub const fn tasks(user: UserId) -> Self {
        Self {
            user,
            kind: CollectionKind::Tasks,
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let collection = match self.kind {
            CollectionKind::Lists => "lists",
            CollectionKind::Tasks => "tasks",
        };
        write!(f, "users/{}/{collection}", self.user)
    }
}

/// A single write against a collection.
#[derive(Clone, Debug, PartialEq)]
pub enum DocumentWrite {
    /// Create or overwrite; with `merge`, existing fields not in `data` survive.
    Set {
        /// Target collection
        path: CollectionPath,
        /// Document id
        id: String,
        /// Document body (a JSON object)
        data: Value,
        /// Merge into an existing document instead of replacing it
        merge: bool,
    },
    /// Merge fields into an existing document.
    Update {
        /// Target collection
        path: CollectionPath,
        /// Document id
        id: String,
        /// Fields to overwrite
        fields: Map<String, Value>,
    },
    /// Delete a document. Deleting a missing document succeeds.
    Delete {
        /// Target collection
        path: CollectionPath,
        /// Document id
        id: String,
    },
}

impl DocumentWrite {
    /// Collection the write targets.
    #[must_use]
    pub const fn path(&self) -> &CollectionPath {
        match self {
            Self::Set { path, .. } | Self::Update { path, .. } | Self::Delete { path, .. } => path,
        }
    }

    /// Document id the write targets.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Set { id, .. } | Self::Update { id, .. } | Self::Delete { id, .. } => id,
        }
    }
}

/// Ordered writes produced by one store operation.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteBatch {
    /// Name of the operation that produced the batch, for logs and notices
    pub operation: &'static str,
    /// Writes, applied in order
    pub writes: Vec<DocumentWrite>,
}

impl WriteBatch {
    /// Creates a batch.
    #[must_use]
    pub const fn new(operation: &'static str, writes: Vec<DocumentWrite>) -> Self {
        Self { operation, writes }
    }

    /// Whether the batch has nothing to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Errors surfaced by the synchronization layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A write kept failing after all retries.
    #[error("Write to {path}/{id} failed after {attempts} attempt(s): {source}")]
    WriteFailed {
        /// Collection path
        path: String,
        /// Document id
        id: String,
        /// Attempts made, including the first
        attempts: usize,
        /// Last error
        #[source]
        source: DocumentError,
    },

    /// A collection could not be read.
    #[error("Reading {path} failed: {source}")]
    ReadFailed {
        /// Collection path
        path: String,
        /// Underlying error
        #[source]
        source: DocumentError,
    },

    /// The background writer is gone (shut down or panicked).
    #[error("Write queue is closed")]
    QueueClosed,
}

/// Abstract per-user document store.
///
/// Implementations must be `Send + Sync`; the in-memory implementation lives
/// in `tasklists-sync`.
pub trait DocumentStore: Send + Sync {
    /// Reads one document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Unavailable`] if the store cannot be reached.
    fn get<'a>(
        &'a self,
        path: &'a CollectionPath,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, DocumentError>>;

    /// Creates or overwrites a document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Unavailable`] if the store cannot be reached.
    fn set<'a>(
        &'a self,
        path: &'a CollectionPath,
        id: &'a str,
        data: Value,
        merge: bool,
    ) -> BoxFuture<'a, Result<(), DocumentError>>;

    /// Merges fields into an existing document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NotFound`] if the document does not exist.
    fn update<'a>(
        &'a self,
        path: &'a CollectionPath,
        id: &'a str,
        fields: Map<String, Value>,
    ) -> BoxFuture<'a, Result<(), DocumentError>>;

    /// Deletes a document; missing documents are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Unavailable`] if the store cannot be reached.
    fn delete<'a>(
        &'a self,
        path: &'a CollectionPath,
        id: &'a str,
    ) -> BoxFuture<'a, Result<(), DocumentError>>;

    /// Reads the whole collection.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Unavailable`] if the store cannot be reached.
    fn query<'a>(
        &'a self,
        path: &'a CollectionPath,
    ) -> BoxFuture<'a, Result<Vec<Value>, DocumentError>>;

    /// Live view of a collection: yields the full current contents once on
    /// subscription and again after every change.
    fn subscribe(&self, path: &CollectionPath) -> BoxStream<'static, Vec<Value>>;

    /// Applies one [`DocumentWrite`].
    ///
    /// # Errors
    ///
    /// Propagates the error of the underlying operation.
    fn apply<'a>(&'a self, write: &'a DocumentWrite) -> BoxFuture<'a, Result<(), DocumentError>> {
        match write {
            DocumentWrite::Set {
                path,
                id,
                data,
                merge,
            } => self.set(path, id, data.clone(), *merge),
            DocumentWrite::Update { path, id, fields } => self.update(path, id, fields.clone()),
            DocumentWrite::Delete { path, id } => self.delete(path, id),
        }
    }
}

/// Wire shape of a list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocument {
    /// List id
    pub id: String,
    /// Display name
    pub name: String,
    /// SVG icon markup
    #[serde(default)]
    pub icon: String,
    /// Owner uid
    pub user_id: String,
    /// Embedded tasks (older documents only; never written)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<TaskDocument>,
}

impl ListDocument {
    /// Decodes a document body.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Serialization`] for malformed documents.
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Encodes the document body.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Serialization`] if encoding fails.
    pub fn to_value(&self) -> Result<Value, DocumentError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Splits into list metadata and any embedded tasks. Embedded tasks that
    /// omit their list or owner inherit them from the list.
    #[must_use]
    pub fn into_parts(self) -> (TaskList, Vec<Task>) {
        let icon = if self.icon.trim().is_empty() {
            Icon::fallback()
        } else {
            Icon::new(self.icon)
        };
        let list = TaskList::new(
            ListId::new(self.id),
            UserId::new(self.user_id),
            self.name,
            icon,
        );
        let tasks = self
            .tasks
            .into_iter()
            .map(|mut doc| {
                if doc.list_id.is_empty() {
                    doc.list_id = list.id.to_string();
                }
                if doc.user_id.is_empty() {
                    doc.user_id = list.owner.to_string();
                }
                doc.into_task()
            })
            .collect();
        (list, tasks)
    }
}

impl From<&TaskList> for ListDocument {
    fn from(list: &TaskList) -> Self {
        Self {
            id: list.id.to_string(),
            name: list.name.clone(),
            icon: list.icon.as_svg().to_string(),
            user_id: list.owner.to_string(),
            tasks: Vec::new(),
        }
    }
}

/// Wire shape of a root task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDocument {
    /// Task id
    pub id: String,
    /// Owning list id
    #[serde(default)]
    pub list_id: String,
    /// Owner uid
    #[serde(default)]
    pub user_id: String,
    /// Task text
    pub text: String,
    /// Completion flag
    #[serde(default)]
    pub completed: bool,
    /// Children
    #[serde(default)]
    pub subtasks: Vec<SubtaskDocument>,
    /// Due date, RFC 3339
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskDocument {
    /// Decodes a document body.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Serialization`] for malformed documents.
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Encodes the document body.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Serialization`] if encoding fails.
    pub fn to_value(&self) -> Result<Value, DocumentError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Converts into a canonical task tree.
    #[must_use]
    pub fn into_task(self) -> Task {
        let mut task = Task::new(
            TaskId::new(self.id),
            ListId::new(self.list_id),
            UserId::new(self.user_id),
            self.text,
        )
        .with_completed(self.completed);
        task.due_date = self.due_date;
        let children: Forest = self
            .subtasks
            .into_iter()
            .map(|child| child.into_task(&task))
            .collect();
        task.subtasks = children;
        task
    }
}

impl From<&Task> for TaskDocument {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.to_string(),
            list_id: task.list_id.to_string(),
            user_id: task.owner.to_string(),
            text: task.text.clone(),
            completed: task.completed,
            subtasks: task.subtasks.iter().map(|child| SubtaskDocument::from(&**child)).collect(),
            due_date: task.due_date,
        }
    }
}

/// Wire shape of a nested task: the legacy flat [`Subtask`] fields, extended
/// with an optional due date and further nesting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskDocument {
    /// `{id, text, completed}`
    #[serde(flatten)]
    pub base: Subtask,
    /// Due date, RFC 3339
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    /// Grandchildren
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<SubtaskDocument>,
}

impl SubtaskDocument {
    /// Converts into a canonical task node under `parent`.
    #[must_use]
    pub fn into_task(self, parent: &Task) -> Task {
        let mut task = self.base.into_task(parent);
        task.due_date = self.due_date;
        let children: Forest = self
            .subtasks
            .into_iter()
            .map(|child| child.into_task(&task))
            .collect();
        task.subtasks = children;
        task
    }
}

impl From<&Task> for SubtaskDocument {
    fn from(task: &Task) -> Self {
        Self {
            base: Subtask {
                id: task.id.clone(),
                text: task.text.clone(),
                completed: task.completed,
            },
            due_date: task.due_date,
            subtasks: task.subtasks.iter().map(|child| Self::from(&**child)).collect(),
        }
    }
}
