//! Write-through queue, live snapshots and default seeding.

use crate::snapshot::Snapshot;
use futures::StreamExt;
use futures::future;
use futures::stream::{self, BoxStream};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tasklists_core::document::{
    CollectionPath, DocumentError, DocumentStore, DocumentWrite, ListDocument, SyncError,
    TaskDocument, WriteBatch,
};
use tasklists_core::environment::{IdGenerator, UuidGenerator, WriteQueue, WriteReceipt};
use tasklists_core::ids::{ListId, TaskId, UserId};
use tasklists_core::model::{Icon, Task, TaskList};
use tasklists_runtime::retry::{RetryPolicy, retry_with_predicate};
use tokio::sync::{mpsc, oneshot, watch};

/// Name of the list created for new accounts.
pub const WELCOME_LIST_NAME: &str = "Welcome!";

/// Tasks of the list created for new accounts.
pub const WELCOME_TASKS: [&str; 3] = [
    "This is a sample task",
    "You can add more tasks",
    "And create new lists!",
];

struct Job {
    seq: u64,
    batch: WriteBatch,
    done: oneshot::Sender<Result<(), SyncError>>,
}

/// Synchronization adapter between the store and a [`DocumentStore`].
///
/// Writes go through a single background worker, so they reach the
/// document store in the order they were enqueued. Transient failures are
/// retried according to the [`RetryPolicy`]; a write that still fails stops
/// the rest of its batch and is reported through the batch's receipt.
///
/// Every batch gets the next sequence number. Once a batch has been
/// applied or has failed, the writer publishes its number; snapshots carry
/// the number published before they were read.
pub struct DocumentSync {
    store: Arc<dyn DocumentStore>,
    jobs: mpsc::UnboundedSender<Job>,
    last_seq: Mutex<u64>,
    synced: watch::Receiver<u64>,
    ids: Arc<dyn IdGenerator>,
    seeded: Mutex<HashSet<UserId>>,
}

impl std::fmt::Debug for DocumentSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSync")
            .field("closed", &self.jobs.is_closed())
            .field("synced", &*self.synced.borrow())
            .finish_non_exhaustive()
    }
}

impl DocumentSync {
    /// Starts the background writer.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, policy: RetryPolicy) -> Self {
        let (jobs, queue) = mpsc::unbounded_channel();
        let (published, synced) = watch::channel(0);
        tokio::spawn(run_writer(Arc::clone(&store), policy, queue, published));
        Self {
            store,
            jobs,
            last_seq: Mutex::new(0),
            synced,
            ids: Arc::new(UuidGenerator),
            seeded: Mutex::new(HashSet::new()),
        }
    }

    /// Uses `ids` for the documents created by seeding.
    #[must_use]
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// The underlying document store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Sequence number of the last batch the writer has finished.
    #[must_use]
    pub fn synced_through(&self) -> u64 {
        *self.synced.borrow()
    }

    /// Live snapshots of `user`'s collections.
    ///
    /// A snapshot is read on subscription and again whenever either
    /// collection changes or the writer finishes a batch. Each read takes
    /// the finished sequence number first and queries both collections
    /// after it, so [`Snapshot::synced_through`] never claims a batch the
    /// contents do not include. Reads that fail are skipped with a warning;
    /// a snapshot equal to the previous one is not repeated.
    #[must_use]
    pub fn snapshots(&self, user: &UserId) -> BoxStream<'static, Snapshot> {
        let lists_path = CollectionPath::lists(user.clone());
        let tasks_path = CollectionPath::tasks(user.clone());
        let triggers = stream::select_all([
            self.store.subscribe(&lists_path).map(|_| ()).boxed(),
            self.store.subscribe(&tasks_path).map(|_| ()).boxed(),
            changes(self.synced.clone()),
        ]);

        let store = Arc::clone(&self.store);
        let synced = self.synced.clone();
        triggers
            .then(move |()| {
                let store = Arc::clone(&store);
                let seq = *synced.borrow();
                let (lists_path, tasks_path) = (lists_path.clone(), tasks_path.clone());
                async move {
                    let lists = store.query(&lists_path).await;
                    let tasks = store.query(&tasks_path).await;
                    match (lists, tasks) {
                        (Ok(lists), Ok(tasks)) => {
                            Some(Snapshot::decode(&lists, &tasks).with_synced_through(seq))
                        },
                        (Err(error), _) | (_, Err(error)) => {
                            tracing::warn!(%error, "Snapshot read failed, waiting for the next change");
                            None
                        },
                    }
                }
            })
            .filter_map(future::ready)
            .scan(None, |previous: &mut Option<Snapshot>, snapshot| {
                let fresh = previous.as_ref() != Some(&snapshot);
                if fresh {
                    *previous = Some(snapshot.clone());
                }
                future::ready(Some(fresh.then_some(snapshot)))
            })
            .filter_map(future::ready)
            .boxed()
    }

    /// Seeds the welcome list for a new account.
    ///
    /// Runs at most once per user for the lifetime of this adapter: the guard
    /// is taken before anything is awaited, so overlapping calls seed once.
    /// Nothing is written when either collection already has documents.
    /// Returns whether the welcome list was written.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ReadFailed`] if the collections cannot be read
    /// (the guard is released so a later call can retry), or the error of
    /// the seeding batch.
    pub async fn seed_defaults(&self, user: &UserId) -> Result<bool, SyncError> {
        if !self.claim_seed(user) {
            tracing::debug!(%user, "Default seeding already claimed");
            return Ok(false);
        }

        let lists_path = CollectionPath::lists(user.clone());
        let tasks_path = CollectionPath::tasks(user.clone());
        let existing = match self.has_documents(&lists_path, &tasks_path).await {
            Ok(existing) => existing,
            Err(error) => {
                self.release_seed(user);
                return Err(error);
            },
        };
        if existing {
            tracing::debug!(%user, "Account already has data, not seeding");
            return Ok(false);
        }

        let batch = self.welcome_batch(user)?;
        tracing::info!(%user, "Seeding welcome list");
        self.enqueue(batch).await?;
        Ok(true)
    }

    fn claim_seed(&self, user: &UserId) -> bool {
        self.seeded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.clone())
    }

    fn release_seed(&self, user: &UserId) {
        self.seeded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user);
    }

    async fn has_documents(
        &self,
        lists: &CollectionPath,
        tasks: &CollectionPath,
    ) -> Result<bool, SyncError> {
        let read_failed = |path: &CollectionPath| {
            let path = path.to_string();
            move |source| SyncError::ReadFailed { path, source }
        };
        let lists_found = self.store.query(lists).await.map_err(read_failed(lists))?;
        let tasks_found = self.store.query(tasks).await.map_err(read_failed(tasks))?;
        Ok(!lists_found.is_empty() || !tasks_found.is_empty())
    }

    fn welcome_batch(&self, user: &UserId) -> Result<WriteBatch, SyncError> {
        let lists_path = CollectionPath::lists(user.clone());
        let tasks_path = CollectionPath::tasks(user.clone());
        let encode_failed = |path: &CollectionPath, id: &str, source: DocumentError| {
            SyncError::WriteFailed {
                path: path.to_string(),
                id: id.to_string(),
                attempts: 0,
                source,
            }
        };

        let list = TaskList::new(
            ListId::new(self.ids.next_id()),
            user.clone(),
            WELCOME_LIST_NAME.to_string(),
            Icon::welcome(),
        );
        let list_data = ListDocument::from(&list)
            .to_value()
            .map_err(|error| encode_failed(&lists_path, list.id.as_str(), error))?;

        let mut writes = vec![DocumentWrite::Set {
            path: lists_path.clone(),
            id: list.id.to_string(),
            data: list_data,
            merge: false,
        }];
        for text in WELCOME_TASKS {
            let task = Task::new(
                TaskId::new(self.ids.next_id()),
                list.id.clone(),
                user.clone(),
                text.to_string(),
            );
            let data = TaskDocument::from(&task)
                .to_value()
                .map_err(|error| encode_failed(&tasks_path, task.id.as_str(), error))?;
            writes.push(DocumentWrite::Set {
                path: tasks_path.clone(),
                id: task.id.to_string(),
                data,
                merge: false,
            });
        }
        Ok(WriteBatch::new("seed_defaults", writes))
    }
}

impl WriteQueue for DocumentSync {
    fn enqueue(&self, batch: WriteBatch) -> WriteReceipt {
        let (done, receipt) = oneshot::channel();
        // Numbering and sending under one lock keeps sequence order equal
        // to queue order.
        let mut last_seq = self.last_seq.lock().unwrap_or_else(PoisonError::into_inner);
        let seq = *last_seq + 1;
        if self.jobs.send(Job { seq, batch, done }).is_err() {
            tracing::error!("Write queue closed, dropping batch");
            return WriteReceipt::ready(0, Err(SyncError::QueueClosed));
        }
        *last_seq = seq;
        drop(last_seq);
        WriteReceipt::new(seq, async move { receipt.await.unwrap_or(Err(SyncError::QueueClosed)) })
    }
}

/// Yields once per change of `synced`, starting with the current value.
fn changes(synced: watch::Receiver<u64>) -> BoxStream<'static, ()> {
    stream::unfold((synced, true), |(mut synced, first)| async move {
        if !first && synced.changed().await.is_err() {
            return None;
        }
        Some(((), (synced, false)))
    })
    .boxed()
}

fn is_transient(error: &DocumentError) -> bool {
    matches!(error, DocumentError::Unavailable(_))
}

async fn run_writer(
    store: Arc<dyn DocumentStore>,
    policy: RetryPolicy,
    mut queue: mpsc::UnboundedReceiver<Job>,
    synced: watch::Sender<u64>,
) {
    tracing::debug!("Document writer started");
    while let Some(Job { seq, batch, done }) = queue.recv().await {
        let outcome = apply_batch(store.as_ref(), &policy, &batch).await;
        // Failed batches count too: what the store holds now is final for them.
        synced.send_replace(seq);
        // The caller may have dropped its receipt.
        let _ = done.send(outcome);
    }
    tracing::debug!("Document writer stopped");
}

async fn apply_batch(
    store: &dyn DocumentStore,
    policy: &RetryPolicy,
    batch: &WriteBatch,
) -> Result<(), SyncError> {
    for write in &batch.writes {
        let applied = retry_with_predicate(policy, || store.apply(write), is_transient).await;
        if let Err(exhausted) = applied {
            metrics::counter!("sync.writes.failed").increment(1);
            tracing::warn!(
                operation = batch.operation,
                path = %write.path(),
                id = write.id(),
                attempts = exhausted.attempts,
                error = %exhausted.error,
                "Document write failed"
            );
            return Err(SyncError::WriteFailed {
                path: write.path().to_string(),
                id: write.id().to_string(),
                attempts: exhausted.attempts,
                source: exhausted.error,
            });
        }
    }
    metrics::counter!("sync.writes.applied").increment(batch.writes.len() as u64);
    tracing::debug!(operation = batch.operation, writes = batch.writes.len(), "Batch applied");
    Ok(())
}
