//! Decoding live collection contents into domain values.

use serde_json::Value;
use std::collections::HashSet;
use tasklists_core::document::{ListDocument, TaskDocument};
use tasklists_core::ids::TaskId;
use tasklists_core::model::{Task, TaskList};
use tasklists_core::tree::Forest;

/// Full current contents of one user's two collections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Lists in collection order
    pub lists: Vec<TaskList>,
    /// Every root task, nested subtasks included
    pub tasks: Forest,
    /// Highest write sequence number known to be reflected in this
    /// snapshot; 0 when no batch had finished before it was read
    pub synced_through: u64,
}

impl Snapshot {
    /// Decodes raw documents.
    ///
    /// Documents that fail to decode are skipped with a warning, as are list
    /// documents claiming the reserved [`ListId::ALL`] id. Tasks embedded
    /// in older list documents are appended after the tasks collection,
    /// unless a task with the same id is already there.
    ///
    /// [`ListId::ALL`]: tasklists_core::ids::ListId::ALL
    #[must_use]
    pub fn decode(lists: &[Value], tasks: &[Value]) -> Self {
        let mut roots: Vec<Task> = tasks
            .iter()
            .filter_map(|value| match TaskDocument::from_value(value.clone()) {
                Ok(document) => Some(document.into_task()),
                Err(error) => {
                    tracing::warn!(%error, "Skipping undecodable task document");
                    None
                },
            })
            .collect();

        let mut seen: HashSet<TaskId> = roots.iter().map(|task| task.id.clone()).collect();
        let mut decoded_lists = Vec::with_capacity(lists.len());
        for value in lists {
            match ListDocument::from_value(value.clone()) {
                Ok(document) => {
                    let (list, embedded) = document.into_parts();
                    if list.id.is_all() {
                        tracing::warn!(name = %list.name, "Skipping list document with the reserved id");
                        continue;
                    }
                    roots.extend(embedded.into_iter().filter(|task| seen.insert(task.id.clone())));
                    decoded_lists.push(list);
                },
                Err(error) => tracing::warn!(%error, "Skipping undecodable list document"),
            }
        }

        Self {
            lists: decoded_lists,
            tasks: roots.into_iter().collect(),
            synced_through: 0,
        }
    }

    /// Builder: record the write sequence number the snapshot reflects
    #[must_use]
    pub const fn with_synced_through(mut self, seq: u64) -> Self {
        self.synced_through = seq;
        self
    }

    /// Whether both collections are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty() && self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn embedded_tasks_are_folded_in_once() {
        let lists = [json!({
            "id": "L1",
            "name": "Legacy",
            "icon": "",
            "userId": "u1",
            "tasks": [
                {"id": "T1", "text": "duplicate", "completed": false, "subtasks": []},
                {"id": "T9", "text": "embedded only", "completed": true, "subtasks": []}
            ]
        })];
        let tasks = [json!({
            "id": "T1", "listId": "L1", "userId": "u1",
            "text": "from tasks", "completed": false, "subtasks": []
        })];

        let snapshot = Snapshot::decode(&lists, &tasks);

        let texts: Vec<_> = snapshot.tasks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["from tasks", "embedded only"]);
        assert_eq!(snapshot.tasks.as_slice()[1].list_id.as_str(), "L1");
    }

    #[test]
    fn malformed_documents_are_skipped() {
        let lists = [json!({"name": "no id"}), json!({"id": "L1", "name": "Ok", "userId": "u1"})];
        let tasks = [json!(42)];

        let snapshot = Snapshot::decode(&lists, &tasks);

        assert_eq!(snapshot.lists.len(), 1);
        assert!(snapshot.tasks.is_empty());
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn lists_cannot_take_the_reserved_id() {
        let lists = [
            json!({"id": "all", "name": "Hacked", "icon": "", "userId": "u1"}),
            json!({"id": "L1", "name": "Work", "icon": "", "userId": "u1"}),
        ];
        let tasks = [json!({
            "id": "T1", "listId": "all", "userId": "u1",
            "text": "stray", "completed": false, "subtasks": []
        })];

        let snapshot = Snapshot::decode(&lists, &tasks);

        let names: Vec<_> = snapshot.lists.iter().map(|list| list.name.as_str()).collect();
        assert_eq!(names, ["Work"]);
        assert_eq!(snapshot.tasks.len(), 1);
    }
}
