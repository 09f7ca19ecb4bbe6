//! NamespaceLabel CRD
//!
//! Declares a set of labels that should be present on the namespace the
//! resource lives in.

use std::collections::BTreeMap;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::NAMESPACE_LABEL_FINALIZER;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[kube(
    group = "dana.io",
    version = "v1alpha1",
    kind = "NamespaceLabel",
    namespaced,
    status = "NamespaceLabelStatus",
    printcolumn = r#"{"name":"Labels", "type":"string", "jsonPath":".spec.labels", "description":"The labels of the namespace"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceLabelSpec {
    /// Labels to apply to the namespace, keyed by label key
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceLabelStatus {
    /// Snapshot of `spec.labels` as of the last successful reconciliation.
    ///
    /// Used to work out which labels were dropped from the spec and must be
    /// retracted from the namespace.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub last_applied_labels: BTreeMap<String, String>,
}

impl NamespaceLabel {
    /// Labels the request currently asks for.
    pub fn desired_labels(&self) -> &BTreeMap<String, String> {
        &self.spec.labels
    }

    /// Labels pushed by the last successful pass (empty before the first one).
    pub fn last_applied_labels(&self) -> BTreeMap<String, String> {
        self.status
            .as_ref()
            .map(|s| s.last_applied_labels.clone())
            .unwrap_or_default()
    }

    /// Namespace the labels are applied to. Always the request's own namespace.
    pub fn target_namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref()
    }

    /// Whether our finalizer is attached.
    pub fn has_finalizer(&self) -> bool {
        self.finalizers().iter().any(|f| f == NAMESPACE_LABEL_FINALIZER)
    }

    /// Whether the object has been marked for deletion.
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Attaches our finalizer. Returns `false` if it was already present.
    pub fn add_finalizer(&mut self) -> bool {
        if self.has_finalizer() {
            return false;
        }
        self.finalizers_mut().push(NAMESPACE_LABEL_FINALIZER.to_string());
        true
    }

    /// Detaches our finalizer, leaving any foreign finalizers alone.
    /// Returns `false` if it was not present.
    pub fn remove_finalizer(&mut self) -> bool {
        if !self.has_finalizer() {
            return false;
        }
        self.finalizers_mut().retain(|f| f != NAMESPACE_LABEL_FINALIZER);
        true
    }
}
