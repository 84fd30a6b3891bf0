//! In-memory [`DocumentStore`].
//!
//! Collections keep documents in insertion order; overwriting a document
//! keeps its position. Every mutation re-publishes the full collection on a
//! `watch` channel, which is what [`DocumentStore::subscribe`] streams.

use futures::StreamExt;
use futures::future::{self, BoxFuture};
use futures::stream::{self, BoxStream};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tasklists_core::document::{CollectionPath, DocumentError, DocumentStore};
use tokio::sync::watch;

struct Collection {
    documents: Vec<(String, Value)>,
    published: watch::Sender<Vec<Value>>,
}

impl Collection {
    fn new() -> Self {
        let (published, _) = watch::channel(Vec::new());
        Self {
            documents: Vec::new(),
            published,
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.documents.iter().position(|(doc_id, _)| doc_id == id)
    }

    fn values(&self) -> Vec<Value> {
        self.documents.iter().map(|(_, value)| value.clone()).collect()
    }

    fn publish(&self) {
        self.published.send_replace(self.values());
    }
}

/// `HashMap`-backed document store shared by clones.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use tasklists_core::document::{CollectionPath, DocumentStore};
/// use tasklists_core::ids::UserId;
/// use tasklists_sync::InMemoryDocumentStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryDocumentStore::new();
/// let lists = CollectionPath::lists(UserId::new("u1"));
///
/// store.set(&lists, "L1", json!({"id": "L1", "name": "Home"}), false).await?;
/// assert_eq!(store.query(&lists).await?.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<Mutex<HashMap<CollectionPath, Collection>>>,
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDocumentStore")
            .field("collections", &self.lock().len())
            .finish()
    }
}

impl InMemoryDocumentStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CollectionPath, Collection>> {
        self.collections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current documents of `path`, in insertion order.
    #[must_use]
    pub fn documents(&self, path: &CollectionPath) -> Vec<Value> {
        self.lock().get(path).map(Collection::values).unwrap_or_default()
    }

    /// Number of documents in `path`.
    #[must_use]
    pub fn len(&self, path: &CollectionPath) -> usize {
        self.lock().get(path).map_or(0, |collection| collection.documents.len())
    }

    /// Whether `path` holds no documents.
    #[must_use]
    pub fn is_empty(&self, path: &CollectionPath) -> bool {
        self.len(path) == 0
    }

    fn write_set(&self, path: &CollectionPath, id: &str, data: Value, merge: bool) {
        let mut collections = self.lock();
        let collection = collections.entry(path.clone()).or_insert_with(Collection::new);
        match collection.position(id) {
            Some(index) => {
                let existing = &mut collection.documents[index].1;
                match (merge, existing, data) {
                    (true, Value::Object(existing), Value::Object(fields)) => existing.extend(fields),
                    (_, existing, data) => *existing = data,
                }
            },
            None => collection.documents.push((id.to_string(), data)),
        }
        collection.publish();
    }

    fn write_update(
        &self,
        path: &CollectionPath,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), DocumentError> {
        let mut collections = self.lock();
        let not_found = || DocumentError::NotFound {
            path: path.to_string(),
            id: id.to_string(),
        };
        let collection = collections.get_mut(path).ok_or_else(not_found)?;
        let index = collection.position(id).ok_or_else(not_found)?;
        match &mut collection.documents[index].1 {
            Value::Object(existing) => existing.extend(fields),
            other => *other = Value::Object(fields),
        }
        collection.publish();
        Ok(())
    }

    fn write_delete(&self, path: &CollectionPath, id: &str) {
        let mut collections = self.lock();
        if let Some(collection) = collections.get_mut(path) {
            if let Some(index) = collection.position(id) {
                collection.documents.remove(index);
                collection.publish();
            }
        }
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn get<'a>(
        &'a self,
        path: &'a CollectionPath,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, DocumentError>> {
        let document = self.lock().get(path).and_then(|collection| {
            collection
                .position(id)
                .map(|index| collection.documents[index].1.clone())
        });
        Box::pin(future::ready(Ok(document)))
    }

    fn set<'a>(
        &'a self,
        path: &'a CollectionPath,
        id: &'a str,
        data: Value,
        merge: bool,
    ) -> BoxFuture<'a, Result<(), DocumentError>> {
        self.write_set(path, id, data, merge);
        Box::pin(future::ready(Ok(())))
    }

    fn update<'a>(
        &'a self,
        path: &'a CollectionPath,
        id: &'a str,
        fields: Map<String, Value>,
    ) -> BoxFuture<'a, Result<(), DocumentError>> {
        Box::pin(future::ready(self.write_update(path, id, fields)))
    }

    fn delete<'a>(
        &'a self,
        path: &'a CollectionPath,
        id: &'a str,
    ) -> BoxFuture<'a, Result<(), DocumentError>> {
        self.write_delete(path, id);
        Box::pin(future::ready(Ok(())))
    }

    fn query<'a>(
        &'a self,
        path: &'a CollectionPath,
    ) -> BoxFuture<'a, Result<Vec<Value>, DocumentError>> {
        Box::pin(future::ready(Ok(self.documents(path))))
    }

    fn subscribe(&self, path: &CollectionPath) -> BoxStream<'static, Vec<Value>> {
        let receiver = self
            .lock()
            .entry(path.clone())
            .or_insert_with(Collection::new)
            .published
            .subscribe();

        stream::unfold((receiver, true), |(mut receiver, first)| async move {
            if !first && receiver.changed().await.is_err() {
                return None;
            }
            let current = receiver.borrow_and_update().clone();
            Some((current, (receiver, false)))
        })
        .boxed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use serde_json::json;
    use tasklists_core::ids::UserId;

    fn tasks() -> CollectionPath {
        CollectionPath::tasks(UserId::new("u1"))
    }

    #[tokio::test]
    async fn set_keeps_insertion_order_on_overwrite() {
        let store = InMemoryDocumentStore::new();
        store.set(&tasks(), "a", json!({"text": "A"}), false).await.unwrap();
        store.set(&tasks(), "b", json!({"text": "B"}), false).await.unwrap();
        store.set(&tasks(), "a", json!({"text": "A2"}), false).await.unwrap();

        assert_eq!(
            store.query(&tasks()).await.unwrap(),
            [json!({"text": "A2"}), json!({"text": "B"})]
        );
    }

    #[tokio::test]
    async fn merge_set_and_update_keep_other_fields() {
        let store = InMemoryDocumentStore::new();
        store
            .set(&tasks(), "a", json!({"text": "A", "completed": false}), false)
            .await
            .unwrap();
        store.set(&tasks(), "a", json!({"completed": true}), true).await.unwrap();

        let mut fields = Map::new();
        fields.insert("text".into(), json!("renamed"));
        store.update(&tasks(), "a", fields).await.unwrap();

        assert_eq!(
            store.get(&tasks(), "a").await.unwrap(),
            Some(json!({"text": "renamed", "completed": true}))
        );
    }

    #[tokio::test]
    async fn update_of_missing_document_fails() {
        let store = InMemoryDocumentStore::new();
        let result = store.update(&tasks(), "missing", Map::new()).await;
        assert!(matches!(result, Err(DocumentError::NotFound { .. })));
    }

    #[tokio::test]
    async fn delete_of_missing_document_succeeds() {
        let store = InMemoryDocumentStore::new();
        store.delete(&tasks(), "missing").await.unwrap();
        assert!(store.is_empty(&tasks()));
    }

    #[tokio::test]
    async fn subscribe_redelivers_full_collection() {
        let store = InMemoryDocumentStore::new();
        let mut updates = store.subscribe(&tasks());

        assert_eq!(updates.next().await.unwrap(), Vec::<Value>::new());

        store.set(&tasks(), "a", json!({"text": "A"}), false).await.unwrap();
        assert_eq!(updates.next().await.unwrap(), [json!({"text": "A"})]);

        store.set(&tasks(), "b", json!({"text": "B"}), false).await.unwrap();
        assert_eq!(updates.next().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn collections_are_scoped_per_user() {
        let store = InMemoryDocumentStore::new();
        store.set(&tasks(), "a", json!({}), false).await.unwrap();
        assert!(store.is_empty(&CollectionPath::tasks(UserId::new("u2"))));
    }
}
