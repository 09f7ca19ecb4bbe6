//! Kubernetes-backed store
//!
//! Full-object writes use `replace` (PUT), which the API server rejects with
//! 409 when the embedded `resourceVersion` is stale. The status write is a
//! merge patch that carries the same precondition.

use std::collections::BTreeMap;

use crds::NamespaceLabel;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::StoreError;
use crate::store_trait::LabelStoreTrait;

/// Store implementation talking to the Kubernetes API server.
#[derive(Clone)]
pub struct KubeLabelStore {
    client: Client,
}

impl std::fmt::Debug for KubeLabelStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeLabelStore").finish_non_exhaustive()
    }
}

impl KubeLabelStore {
    /// Creates a store from an existing Kubernetes client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespace_labels(&self, namespace: &str) -> Api<NamespaceLabel> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn namespaces(&self) -> Api<Namespace> {
        Api::all(self.client.clone())
    }
}

/// Identifies a `NamespaceLabel` for a write, failing if metadata is incomplete.
fn label_key(label: &NamespaceLabel) -> Result<(&str, &str), StoreError> {
    let namespace = label.metadata.namespace.as_deref()
        .ok_or_else(|| StoreError::InvalidObject("NamespaceLabel missing namespace".to_string()))?;
    let name = label.metadata.name.as_deref()
        .ok_or_else(|| StoreError::InvalidObject("NamespaceLabel missing name".to_string()))?;
    Ok((namespace, name))
}

/// Builds the merge patch that replaces `status.lastAppliedLabels`.
///
/// JSON merge patch merges maps, so keys present in the old snapshot but not
/// in the new one are sent as `null` to delete them. The `resourceVersion`
/// precondition makes the patch fail on a stale read.
pub fn last_applied_patch(label: &NamespaceLabel, last_applied: &BTreeMap<String, String>) -> Value {
    let mut labels = Map::new();
    for key in label.last_applied_labels().keys() {
        if !last_applied.contains_key(key) {
            labels.insert(key.clone(), Value::Null);
        }
    }
    for (key, value) in last_applied {
        labels.insert(key.clone(), Value::String(value.clone()));
    }

    json!({
        "metadata": {
            "resourceVersion": label.metadata.resource_version,
        },
        "status": {
            "lastAppliedLabels": labels,
        }
    })
}

#[async_trait::async_trait]
impl LabelStoreTrait for KubeLabelStore {
    async fn get_namespace_label(&self, namespace: &str, name: &str) -> Result<NamespaceLabel, StoreError> {
        Ok(self.namespace_labels(namespace).get(name).await?)
    }

    async fn list_namespace_labels(&self, namespace: &str) -> Result<Vec<NamespaceLabel>, StoreError> {
        let list = self.namespace_labels(namespace)
            .list(&ListParams::default())
            .await?;
        debug!("Listed {} NamespaceLabels in {}", list.items.len(), namespace);
        Ok(list.items)
    }

    async fn update_namespace_label(&self, label: &NamespaceLabel) -> Result<NamespaceLabel, StoreError> {
        let (namespace, name) = label_key(label)?;
        Ok(self.namespace_labels(namespace)
            .replace(name, &PostParams::default(), label)
            .await?)
    }

    async fn update_last_applied(&self, label: &NamespaceLabel, last_applied: &BTreeMap<String, String>) -> Result<NamespaceLabel, StoreError> {
        let (namespace, name) = label_key(label)?;
        let patch = last_applied_patch(label, last_applied);
        Ok(self.namespace_labels(namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?)
    }

    async fn get_namespace(&self, name: &str) -> Result<Namespace, StoreError> {
        Ok(self.namespaces().get(name).await?)
    }

    async fn update_namespace(&self, namespace: &Namespace) -> Result<Namespace, StoreError> {
        let name = namespace.metadata.name.as_deref()
            .ok_or_else(|| StoreError::InvalidObject("Namespace missing name".to_string()))?;
        Ok(self.namespaces()
            .replace(name, &PostParams::default(), namespace)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::{NamespaceLabelSpec, NamespaceLabelStatus};

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_last_applied_patch_nulls_dropped_keys() {
        let mut label = NamespaceLabel::new("nl", NamespaceLabelSpec { labels: map(&[("a", "1")]) });
        label.metadata.resource_version = Some("42".to_string());
        label.status = Some(NamespaceLabelStatus {
            last_applied_labels: map(&[("a", "0"), ("b", "2")]),
        });

        let patch = last_applied_patch(&label, &map(&[("a", "1")]));
        assert_eq!(
            patch,
            json!({
                "metadata": { "resourceVersion": "42" },
                "status": { "lastAppliedLabels": { "a": "1", "b": null } }
            })
        );
    }

    #[test]
    fn test_last_applied_patch_first_pass() {
        let label = NamespaceLabel::new("nl", NamespaceLabelSpec::default());
        let patch = last_applied_patch(&label, &map(&[("x", "y")]));
        assert_eq!(patch["status"]["lastAppliedLabels"], json!({ "x": "y" }));
        assert_eq!(patch["metadata"]["resourceVersion"], Value::Null);
    }

    #[test]
    fn test_label_key_requires_namespace() {
        let label = NamespaceLabel::new("nl", NamespaceLabelSpec::default());
        assert!(matches!(label_key(&label), Err(StoreError::InvalidObject(_))));
    }
}
