//! Test doubles for the write path and the AI collaborator.

use futures::future::{self, BoxFuture};
use futures::stream::BoxStream;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;
use tasklists_core::document::{CollectionPath, DocumentError, DocumentStore, SyncError, WriteBatch};
use tasklists_core::environment::{
    AssistantError, IconGenerator, TaskSuggester, WriteQueue, WriteReceipt,
};
use tasklists_core::model::Icon;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Write queue that records every batch instead of applying it.
///
/// Receipts resolve immediately, with `Ok(())` unless a failure was
/// configured with [`RecordingWriteQueue::failing_with`]. Sequence numbers
/// count batches from 1.
#[derive(Debug, Default)]
pub struct RecordingWriteQueue {
    batches: Mutex<Vec<WriteBatch>>,
    failure: Mutex<Option<SyncError>>,
    last_seq: AtomicU64,
}

impl RecordingWriteQueue {
    /// A queue whose receipts all succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue whose receipts all fail with `error`.
    #[must_use]
    pub fn failing_with(error: SyncError) -> Self {
        let queue = Self::default();
        queue.fail_with(Some(error));
        queue
    }

    /// Switches failure on (`Some`) or off (`None`) for later batches.
    pub fn fail_with(&self, error: Option<SyncError>) {
        *lock(&self.failure) = error;
    }

    /// Every batch enqueued so far, in order.
    #[must_use]
    pub fn batches(&self) -> Vec<WriteBatch> {
        lock(&self.batches).clone()
    }

    /// Operation names of the recorded batches, in order.
    #[must_use]
    pub fn operations(&self) -> Vec<&'static str> {
        lock(&self.batches).iter().map(|batch| batch.operation).collect()
    }

    /// Forgets recorded batches.
    pub fn clear(&self) {
        lock(&self.batches).clear();
    }
}

impl WriteQueue for RecordingWriteQueue {
    fn enqueue(&self, batch: WriteBatch) -> WriteReceipt {
        lock(&self.batches).push(batch);
        let seq = self.last_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = lock(&self.failure).clone().map_or(Ok(()), Err);
        WriteReceipt::ready(seq, outcome)
    }
}

/// AI collaborator with canned answers.
///
/// Records the topics and texts it was asked about.
#[derive(Debug)]
pub struct ScriptedAssistant {
    icon: Result<Icon, AssistantError>,
    suggestions: Result<Vec<String>, AssistantError>,
    icon_requests: Mutex<Vec<String>>,
    suggestion_requests: Mutex<Vec<Vec<String>>>,
}

impl ScriptedAssistant {
    /// Answers every icon request with `icon` and every suggestion request
    /// with `suggestions`.
    #[must_use]
    pub fn new(icon: Icon, suggestions: Vec<String>) -> Self {
        Self {
            icon: Ok(icon),
            suggestions: Ok(suggestions),
            icon_requests: Mutex::new(Vec::new()),
            suggestion_requests: Mutex::new(Vec::new()),
        }
    }

    /// Fails every request with `error`.
    #[must_use]
    pub fn failing(error: AssistantError) -> Self {
        Self {
            icon: Err(error.clone()),
            suggestions: Err(error),
            icon_requests: Mutex::new(Vec::new()),
            suggestion_requests: Mutex::new(Vec::new()),
        }
    }

    /// Topics passed to `generate_icon`.
    #[must_use]
    pub fn icon_requests(&self) -> Vec<String> {
        lock(&self.icon_requests).clone()
    }

    /// Texts passed to `suggest_tasks`.
    #[must_use]
    pub fn suggestion_requests(&self) -> Vec<Vec<String>> {
        lock(&self.suggestion_requests).clone()
    }
}

impl Default for ScriptedAssistant {
    fn default() -> Self {
        Self::new(Icon::new("<svg>scripted</svg>"), Vec::new())
    }
}

impl IconGenerator for ScriptedAssistant {
    fn generate_icon<'a>(&'a self, topic: &'a str) -> BoxFuture<'a, Result<Icon, AssistantError>> {
        lock(&self.icon_requests).push(topic.to_string());
        Box::pin(future::ready(self.icon.clone()))
    }
}

impl TaskSuggester for ScriptedAssistant {
    fn suggest_tasks<'a>(
        &'a self,
        existing: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<String>, AssistantError>> {
        lock(&self.suggestion_requests).push(existing.to_vec());
        Box::pin(future::ready(self.suggestions.clone()))
    }
}

/// Wraps a [`DocumentStore`] and fails the first `failures` mutating calls.
///
/// Reads and subscriptions always go straight to the inner store.
#[derive(Debug)]
pub struct FlakyDocumentStore<S> {
    inner: S,
    remaining_failures: AtomicUsize,
    error: DocumentError,
    mutations: AtomicUsize,
}

impl<S: DocumentStore> FlakyDocumentStore<S> {
    /// Fails the next `failures` writes with [`DocumentError::Unavailable`].
    #[must_use]
    pub fn new(inner: S, failures: usize) -> Self {
        Self::with_error(inner, failures, DocumentError::Unavailable("injected failure".into()))
    }

    /// Fails the next `failures` writes with `error`.
    #[must_use]
    pub const fn with_error(inner: S, failures: usize, error: DocumentError) -> Self {
        Self {
            inner,
            remaining_failures: AtomicUsize::new(failures),
            error,
            mutations: AtomicUsize::new(0),
        }
    }

    /// The wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Mutating calls seen so far, failed ones included.
    #[must_use]
    pub fn mutation_attempts(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn inject(&self) -> Result<(), DocumentError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            Err(self.error.clone())
        } else {
            Ok(())
        }
    }
}

impl<S: DocumentStore> DocumentStore for FlakyDocumentStore<S> {
    fn get<'a>(
        &'a self,
        path: &'a CollectionPath,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, DocumentError>> {
        self.inner.get(path, id)
    }

    fn set<'a>(
        &'a self,
        path: &'a CollectionPath,
        id: &'a str,
        data: Value,
        merge: bool,
    ) -> BoxFuture<'a, Result<(), DocumentError>> {
        match self.inject() {
            Ok(()) => self.inner.set(path, id, data, merge),
            Err(error) => Box::pin(future::ready(Err(error))),
        }
    }

    fn update<'a>(
        &'a self,
        path: &'a CollectionPath,
        id: &'a str,
        fields: Map<String, Value>,
    ) -> BoxFuture<'a, Result<(), DocumentError>> {
        match self.inject() {
            Ok(()) => self.inner.update(path, id, fields),
            Err(error) => Box::pin(future::ready(Err(error))),
        }
    }

    fn delete<'a>(
        &'a self,
        path: &'a CollectionPath,
        id: &'a str,
    ) -> BoxFuture<'a, Result<(), DocumentError>> {
        match self.inject() {
            Ok(()) => self.inner.delete(path, id),
            Err(error) => Box::pin(future::ready(Err(error))),
        }
    }

    fn query<'a>(
        &'a self,
        path: &'a CollectionPath,
    ) -> BoxFuture<'a, Result<Vec<Value>, DocumentError>> {
        self.inner.query(path)
    }

    fn subscribe(&self, path: &CollectionPath) -> BoxStream<'static, Vec<Value>> {
        self.inner.subscribe(path)
    }
}

/// Document store whose mutations wait for a permit.
///
/// Every `set`, `update` and `delete` takes one permit before reaching the
/// wrapped store; reads and subscriptions pass straight through. Starts
/// with no permits, so writes stall until [`GatedDocumentStore::release`].
#[derive(Debug)]
pub struct GatedDocumentStore<S> {
    inner: S,
    permits: Semaphore,
}

impl<S: DocumentStore> GatedDocumentStore<S> {
    /// Wraps `inner` with a closed gate.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            permits: Semaphore::new(0),
        }
    }

    /// Lets `writes` more mutations through.
    pub fn release(&self, writes: usize) {
        self.permits.add_permits(writes);
    }

    /// The wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    async fn admit(&self) -> Result<(), DocumentError> {
        self.permits
            .acquire()
            .await
            .map(tokio::sync::SemaphorePermit::forget)
            .map_err(|_| DocumentError::Unavailable("gate closed".into()))
    }
}

impl<S: DocumentStore> DocumentStore for GatedDocumentStore<S> {
    fn get<'a>(
        &'a self,
        path: &'a CollectionPath,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, DocumentError>> {
        self.inner.get(path, id)
    }

    fn set<'a>(
        &'a self,
        path: &'a CollectionPath,
        id: &'a str,
        data: Value,
        merge: bool,
    ) -> BoxFuture<'a, Result<(), DocumentError>> {
        Box::pin(async move {
            self.admit().await?;
            self.inner.set(path, id, data, merge).await
        })
    }

    fn update<'a>(
        &'a self,
        path: &'a CollectionPath,
        id: &'a str,
        fields: Map<String, Value>,
    ) -> BoxFuture<'a, Result<(), DocumentError>> {
        Box::pin(async move {
            self.admit().await?;
            self.inner.update(path, id, fields).await
        })
    }

    fn delete<'a>(
        &'a self,
        path: &'a CollectionPath,
        id: &'a str,
    ) -> BoxFuture<'a, Result<(), DocumentError>> {
        Box::pin(async move {
            self.admit().await?;
            self.inner.delete(path, id).await
        })
    }

    fn query<'a>(
        &'a self,
        path: &'a CollectionPath,
    ) -> BoxFuture<'a, Result<Vec<Value>, DocumentError>> {
        self.inner.query(path)
    }

    fn subscribe(&self, path: &CollectionPath) -> BoxStream<'static, Vec<Value>> {
        self.inner.subscribe(path)
    }
}
