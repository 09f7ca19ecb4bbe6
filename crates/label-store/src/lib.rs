//! NamespaceLabel Store
//!
//! The read/write contract the namespace label controller depends on, and its
//! Kubernetes-backed implementation.
//!
//! # Example
//!
//! ```no_run
//! use label_store::{KubeLabelStore, LabelStoreTrait};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let store = KubeLabelStore::new(client);
//!
//! // All requests bound to a namespace
//! let requests = store.list_namespace_labels("team-a").await?;
//! let namespace = store.get_namespace("team-a").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Optimistic concurrency**: every write carries the `resourceVersion` it
//!   was computed from, a stale write fails with [`StoreError::Conflict`]
//! - **Error classification**: API failures are mapped onto a small taxonomy
//!   the reconciler can act on
//! - **Mocking**: `test-util` enables an in-memory store with change events

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod store_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::KubeLabelStore;
pub use error::StoreError;
pub use store_trait::LabelStoreTrait;
#[cfg(feature = "test-util")]
pub use mock::{MockLabelStore, StoreEvent, StoreOp, StoreWrite};
