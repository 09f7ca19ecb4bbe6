//! LabelStore trait for mocking
//!
//! This trait abstracts the Kubernetes API so the reconciler can be exercised
//! against an in-memory store in unit tests.

use std::collections::BTreeMap;

use crds::NamespaceLabel;
use k8s_openapi::api::core::v1::Namespace;

use crate::error::StoreError;

/// Store operations the reconciler relies on.
///
/// Reads are expected to be consistent with the caller's own earlier writes.
/// Every write is conditional on the `resourceVersion` of the object passed in
/// and fails with [`StoreError::Conflict`] if it is stale.
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait LabelStoreTrait: Send + Sync {
    // NamespaceLabel operations
    async fn get_namespace_label(&self, namespace: &str, name: &str) -> Result<NamespaceLabel, StoreError>;
    async fn list_namespace_labels(&self, namespace: &str) -> Result<Vec<NamespaceLabel>, StoreError>;
    /// Writes metadata and spec (finalizers in practice). Status is untouched.
    async fn update_namespace_label(&self, label: &NamespaceLabel) -> Result<NamespaceLabel, StoreError>;
    /// Writes `status.lastAppliedLabels`. `label` is the object as read in
    /// the current pass; its status is the snapshot being replaced.
    async fn update_last_applied(&self, label: &NamespaceLabel, last_applied: &BTreeMap<String, String>) -> Result<NamespaceLabel, StoreError>;

    // Namespace operations
    async fn get_namespace(&self, name: &str) -> Result<Namespace, StoreError>;
    async fn update_namespace(&self, namespace: &Namespace) -> Result<Namespace, StoreError>;
}
