//! # Task Lists Sync
//!
//! Keeps the in-memory store and a per-user document store in step.
//!
//! - [`DocumentSync`] implements the `WriteQueue` seam: batches are applied
//!   by one background writer in the order they were enqueued, with
//!   retries for transient failures.
//! - [`DocumentSync::snapshots`] turns the live collection subscriptions
//!   into a stream of decoded [`Snapshot`]s, each stamped with the last
//!   batch it is known to include.
//! - [`DocumentSync::seed_defaults`] writes the welcome list for a new
//!   account, once.
//! - [`InMemoryDocumentStore`] is a complete `DocumentStore` kept in memory.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use tasklists_core::ids::UserId;
//! use tasklists_runtime::RetryPolicy;
//! use tasklists_sync::{DocumentSync, InMemoryDocumentStore};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let sync = DocumentSync::new(Arc::new(InMemoryDocumentStore::new()), RetryPolicy::default());
//! let user = UserId::new("u1");
//!
//! let mut snapshots = sync.snapshots(&user);
//! assert!(snapshots.next().await.is_some_and(|s| s.is_empty()));
//!
//! assert!(sync.seed_defaults(&user).await?);
//! let seeded = snapshots.next().await;
//! assert!(seeded.is_some());
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod memory;
pub mod snapshot;

pub use adapter::{DocumentSync, WELCOME_LIST_NAME, WELCOME_TASKS};
pub use memory::InMemoryDocumentStore;
pub use snapshot::Snapshot;
