//! # Task Lists
//!
//! Personal task lists with arbitrarily nested subtasks, kept in step with a
//! per-user document store, plus AI-generated list icons and task
//! suggestions.
//!
//! - [`ListsReducer`] holds every business rule: validation no-ops, list
//!   scoping, the synthetic `"all"` view, cascade deletes, and which
//!   document writes each change produces.
//! - [`TaskBoard`] wraps the store in one async method per operation plus
//!   read helpers.
//! - [`connect`] signs a user in and forwards live snapshots from
//!   [`tasklists_sync::DocumentSync`], seeding the welcome list for new
//!   accounts.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use tasklists::{IconSource, ListsEnvironment, TaskBoard};
//! use tasklists_assistant::OfflineAssistant;
//! use tasklists_core::environment::{SystemClock, UuidGenerator};
//! use tasklists_core::ids::{ListId, UserId};
//! use tasklists_runtime::RetryPolicy;
//! use tasklists_sync::{DocumentSync, InMemoryDocumentStore};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let sync = Arc::new(DocumentSync::new(
//!     Arc::new(InMemoryDocumentStore::new()),
//!     RetryPolicy::default(),
//! ));
//! let env = ListsEnvironment::new(
//!     Arc::new(SystemClock),
//!     Arc::new(UuidGenerator),
//!     sync.clone(),
//!     Arc::new(OfflineAssistant),
//!     Arc::new(OfflineAssistant),
//! );
//! let board = TaskBoard::new(env);
//! board.sign_in(UserId::new("u1")).await?;
//!
//! board.create_list("Groceries", IconSource::Generate).await?.wait().await;
//! board.add_task(&ListId::all(), "Buy milk").await?.wait().await;
//!
//! let counts = board.counts(&ListId::all()).await;
//! assert_eq!(counts.map(|c| c.total), Some(1));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod reducer;
pub mod service;
pub mod types;
pub mod writes;

// Re-export commonly used types
pub use config::{AppConfig, ConfigError};
pub use reducer::{ListsEnvironment, ListsReducer};
pub use service::{ListsStore, Session, TaskBoard, connect};
pub use types::{IconSource, ListsAction, ListsState, Notice, NoticeLevel};
