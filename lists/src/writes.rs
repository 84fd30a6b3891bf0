//! Document writes for store changes.
//!
//! A root task's own fields are patched with an `Update`. Any change below
//! the root rewrites the whole root document, since nested tasks live inside
//! it.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tasklists_core::document::{
    CollectionPath, DocumentError, DocumentWrite, ListDocument, TaskDocument,
};
use tasklists_core::ids::TaskId;
use tasklists_core::model::{Task, TaskList};
use tasklists_core::tree::Forest;

/// Builds an update field map.
#[must_use]
pub fn fields<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// `dueDate` field value; `null` clears it.
#[must_use]
pub fn due_date_value(due_date: Option<DateTime<Utc>>) -> Value {
    due_date.map_or(Value::Null, |date| {
        Value::String(date.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    })
}

/// Creates the list document, merging into any existing one.
///
/// # Errors
///
/// Returns [`DocumentError::Serialization`] if encoding fails.
pub fn put_list(list: &TaskList) -> Result<DocumentWrite, DocumentError> {
    Ok(DocumentWrite::Set {
        path: CollectionPath::lists(list.owner.clone()),
        id: list.id.to_string(),
        data: ListDocument::from(list).to_value()?,
        merge: true,
    })
}

/// Patches fields of a list document.
#[must_use]
pub fn update_list(list: &TaskList, fields: Map<String, Value>) -> DocumentWrite {
    DocumentWrite::Update {
        path: CollectionPath::lists(list.owner.clone()),
        id: list.id.to_string(),
        fields,
    }
}

/// Deletes a list document.
#[must_use]
pub fn delete_list(list: &TaskList) -> DocumentWrite {
    DocumentWrite::Delete {
        path: CollectionPath::lists(list.owner.clone()),
        id: list.id.to_string(),
    }
}

/// Writes a root task document, children included.
///
/// # Errors
///
/// Returns [`DocumentError::Serialization`] if encoding fails.
pub fn put_task(root: &Task, merge: bool) -> Result<DocumentWrite, DocumentError> {
    Ok(DocumentWrite::Set {
        path: CollectionPath::tasks(root.owner.clone()),
        id: root.id.to_string(),
        data: TaskDocument::from(root).to_value()?,
        merge,
    })
}

/// Deletes a root task document.
#[must_use]
pub fn delete_task(root: &Task) -> DocumentWrite {
    DocumentWrite::Delete {
        path: CollectionPath::tasks(root.owner.clone()),
        id: root.id.to_string(),
    }
}

/// Persists a change to node `task_id` of an already updated forest.
///
/// # Errors
///
/// Returns [`DocumentError::Serialization`] if the root document cannot be
/// encoded.
pub fn task_changed(
    tasks: &Forest,
    task_id: &TaskId,
    changed: Map<String, Value>,
) -> Result<Vec<DocumentWrite>, DocumentError> {
    let Some(root) = tasks.root_of(task_id) else {
        return Ok(Vec::new());
    };
    if root.id == *task_id {
        Ok(vec![DocumentWrite::Update {
            path: CollectionPath::tasks(root.owner.clone()),
            id: root.id.to_string(),
            fields: changed,
        }])
    } else {
        Ok(vec![put_task(root, false)?])
    }
}
