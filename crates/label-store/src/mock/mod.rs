//! Mock LabelStore for unit testing
//!
//! This module provides an in-memory implementation of `LabelStoreTrait` that
//! behaves like the API server where the reconciler can tell the difference:
//!
//! - every stored object carries a `resourceVersion`, stale writes conflict
//! - writes that change nothing are no-ops (no version bump, no event)
//! - deleting a `NamespaceLabel` with finalizers only sets `deletionTimestamp`;
//!   the object disappears once the last finalizer is removed
//! - every effective change is queued as a [`StoreEvent`], so tests can replay
//!   the watch stream the controller would see
//!
//! Failures can be injected per operation with [`MockLabelStore::fail_next`].
//!
//! The "external actor" helpers (`create_*`, `set_*`, `edit_namespace`,
//! `request_deletion`) bypass the trait and never conflict.

mod fixtures;

pub use fixtures::{namespace, namespace_label};

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crds::{NamespaceLabel, NamespaceLabelStatus};
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;

use crate::error::StoreError;
use crate::store_trait::LabelStoreTrait;

/// A change the watch stream would deliver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreEvent {
    /// A `NamespaceLabel` changed or was removed
    NamespaceLabel { namespace: String, name: String },
    /// A `Namespace` changed
    Namespace { name: String },
}

/// Trait operations, used to target injected failures and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetNamespaceLabel,
    ListNamespaceLabels,
    UpdateNamespaceLabel,
    UpdateLastApplied,
    GetNamespace,
    UpdateNamespace,
}

/// An effective write made through the trait, as stored afterwards.
#[derive(Debug, Clone)]
pub enum StoreWrite {
    NamespaceLabel(NamespaceLabel),
    LastApplied(NamespaceLabel),
    Namespace(Namespace),
}

#[derive(Default)]
struct MockState {
    namespaces: BTreeMap<String, Namespace>,
    labels: BTreeMap<(String, String), NamespaceLabel>,
    // Monotonic counter shared by resourceVersion and timestamps
    clock: u64,
    events: VecDeque<StoreEvent>,
    failures: HashMap<StoreOp, VecDeque<StoreError>>,
    calls: HashMap<StoreOp, usize>,
    writes: Vec<StoreWrite>,
}

impl MockState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn record_call(&mut self, op: StoreOp) -> Result<(), StoreError> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn push_label_event(&mut self, namespace: &str, name: &str) {
        self.events.push_back(StoreEvent::NamespaceLabel {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
    }

    fn push_namespace_event(&mut self, name: &str) {
        self.events.push_back(StoreEvent::Namespace { name: name.to_string() });
    }
}

/// Formats a deterministic timestamp `seconds` after 2024-01-01T00:00:00Z.
fn mock_time(seconds: u64) -> Option<Time> {
    let rfc3339 = format!(
        "2024-01-01T{:02}:{:02}:{:02}Z",
        (seconds / 3600) % 24,
        (seconds / 60) % 60,
        seconds % 60
    );
    serde_json::from_value(serde_json::Value::String(rfc3339)).ok()
}

fn check_version(stored: Option<&String>, incoming: Option<&String>, what: &str) -> Result<(), StoreError> {
    if stored != incoming {
        return Err(StoreError::Conflict(format!(
            "{} has resourceVersion {:?}, write was based on {:?}",
            what, stored, incoming
        )));
    }
    Ok(())
}

/// Mock store for testing
///
/// Cloning shares the underlying state, so a test can keep a handle while the
/// reconciler owns another.
#[derive(Clone, Default)]
pub struct MockLabelStore {
    state: Arc<Mutex<MockState>>,
}

impl std::fmt::Debug for MockLabelStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLabelStore").finish_non_exhaustive()
    }
}

impl MockLabelStore {
    /// Create an empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // External actor helpers (test setup)
    // ------------------------------------------------------------------

    /// Create a namespace with the given labels.
    pub fn create_namespace(&self, name: &str, labels: &[(&str, &str)]) {
        let mut state = self.state();
        let version = state.tick();
        let mut ns = namespace(name, labels);
        ns.metadata.resource_version = Some(version.to_string());
        ns.metadata.creation_timestamp = mock_time(version);
        state.namespaces.insert(name.to_string(), ns);
        state.push_namespace_event(name);
    }

    /// Apply an arbitrary edit to a namespace, as a user with kubectl would.
    pub fn edit_namespace(&self, name: &str, edit: impl FnOnce(&mut Namespace)) {
        let mut state = self.state();
        let version = state.tick();
        if let Some(ns) = state.namespaces.get_mut(name) {
            edit(ns);
            ns.metadata.resource_version = Some(version.to_string());
            state.push_namespace_event(name);
        }
    }

    /// Remove a namespace outright.
    pub fn delete_namespace(&self, name: &str) {
        let mut state = self.state();
        if state.namespaces.remove(name).is_some() {
            state.push_namespace_event(name);
        }
    }

    /// Create a `NamespaceLabel` requesting `labels`.
    ///
    /// Creation timestamps follow call order, so earlier calls win arbitration.
    pub fn create_namespace_label(&self, namespace: &str, name: &str, labels: &[(&str, &str)]) {
        let mut state = self.state();
        let version = state.tick();
        let mut nl = namespace_label(namespace, name, labels);
        nl.metadata.resource_version = Some(version.to_string());
        nl.metadata.creation_timestamp = mock_time(version);
        nl.metadata.generation = Some(1);
        nl.metadata.uid = Some(format!("uid-{}", version));
        state.labels.insert((namespace.to_string(), name.to_string()), nl);
        state.push_label_event(namespace, name);
    }

    /// Replace the requested labels of an existing `NamespaceLabel`.
    pub fn set_desired_labels(&self, namespace: &str, name: &str, labels: &[(&str, &str)]) {
        let mut state = self.state();
        let version = state.tick();
        let key = (namespace.to_string(), name.to_string());
        if let Some(nl) = state.labels.get_mut(&key) {
            nl.spec.labels = labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            nl.metadata.resource_version = Some(version.to_string());
            nl.metadata.generation = Some(nl.metadata.generation.unwrap_or(0) + 1);
            state.push_label_event(namespace, name);
        }
    }

    /// Override the creation timestamp (RFC 3339) of a `NamespaceLabel`.
    pub fn set_creation_timestamp(&self, namespace: &str, name: &str, rfc3339: &str) {
        let mut state = self.state();
        let key = (namespace.to_string(), name.to_string());
        if let Some(nl) = state.labels.get_mut(&key) {
            nl.metadata.creation_timestamp =
                serde_json::from_value(serde_json::Value::String(rfc3339.to_string())).ok();
        }
    }

    /// Ask for a `NamespaceLabel` to be deleted.
    ///
    /// Without finalizers the object goes away at once, otherwise it only
    /// gains a `deletionTimestamp`.
    pub fn request_deletion(&self, namespace: &str, name: &str) {
        let mut state = self.state();
        let version = state.tick();
        let key = (namespace.to_string(), name.to_string());
        let Some(nl) = state.labels.get_mut(&key) else {
            return;
        };
        if nl.finalizers().is_empty() {
            state.labels.remove(&key);
        } else if nl.metadata.deletion_timestamp.is_none() {
            nl.metadata.deletion_timestamp = mock_time(version);
            nl.metadata.resource_version = Some(version.to_string());
        } else {
            return;
        }
        state.push_label_event(namespace, name);
    }

    // ------------------------------------------------------------------
    // Inspection helpers
    // ------------------------------------------------------------------

    /// Current stored copy of a namespace.
    pub fn namespace(&self, name: &str) -> Option<Namespace> {
        self.state().namespaces.get(name).cloned()
    }

    /// Current labels of a namespace (empty if absent).
    pub fn namespace_labels(&self, name: &str) -> BTreeMap<String, String> {
        self.state()
            .namespaces
            .get(name)
            .and_then(|ns| ns.metadata.labels.clone())
            .unwrap_or_default()
    }

    /// Current stored copy of a `NamespaceLabel`.
    pub fn namespace_label(&self, namespace: &str, name: &str) -> Option<NamespaceLabel> {
        self.state()
            .labels
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Pop the oldest pending change event.
    pub fn pop_event(&self) -> Option<StoreEvent> {
        self.state().events.pop_front()
    }

    /// Discard all pending change events.
    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    /// Number of pending change events.
    pub fn pending_events(&self) -> usize {
        self.state().events.len()
    }

    /// Make the next call of `op` fail with `err`. Calls queue up in order.
    pub fn fail_next(&self, op: StoreOp, err: StoreError) {
        self.state().failures.entry(op).or_default().push_back(err);
    }

    /// How many times `op` has been called (including failed calls).
    pub fn call_count(&self, op: StoreOp) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    /// Effective writes made through the trait, oldest first.
    pub fn writes(&self) -> Vec<StoreWrite> {
        self.state().writes.clone()
    }

    /// Effective namespace writes made through the trait, oldest first.
    pub fn namespace_writes(&self) -> Vec<Namespace> {
        self.state()
            .writes
            .iter()
            .filter_map(|w| match w {
                StoreWrite::Namespace(ns) => Some(ns.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded writes and call counts (pending events are kept).
    pub fn reset_history(&self) {
        let mut state = self.state();
        state.writes.clear();
        state.calls.clear();
    }
}

#[async_trait::async_trait]
impl LabelStoreTrait for MockLabelStore {
    async fn get_namespace_label(&self, namespace: &str, name: &str) -> Result<NamespaceLabel, StoreError> {
        let mut state = self.state();
        state.record_call(StoreOp::GetNamespaceLabel)?;
        state
            .labels
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("NamespaceLabel {}/{}", namespace, name)))
    }

    async fn list_namespace_labels(&self, namespace: &str) -> Result<Vec<NamespaceLabel>, StoreError> {
        let mut state = self.state();
        state.record_call(StoreOp::ListNamespaceLabels)?;
        Ok(state
            .labels
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, nl)| nl.clone())
            .collect())
    }

    async fn update_namespace_label(&self, label: &NamespaceLabel) -> Result<NamespaceLabel, StoreError> {
        let mut state = self.state();
        state.record_call(StoreOp::UpdateNamespaceLabel)?;

        let namespace = label.metadata.namespace.clone()
            .ok_or_else(|| StoreError::InvalidObject("NamespaceLabel missing namespace".to_string()))?;
        let name = label.metadata.name.clone()
            .ok_or_else(|| StoreError::InvalidObject("NamespaceLabel missing name".to_string()))?;
        let key = (namespace.clone(), name.clone());

        let stored = state.labels.get(&key)
            .ok_or_else(|| StoreError::NotFound(format!("NamespaceLabel {}/{}", namespace, name)))?;
        check_version(
            stored.metadata.resource_version.as_ref(),
            label.metadata.resource_version.as_ref(),
            &format!("NamespaceLabel {}/{}", namespace, name),
        )?;

        // Only metadata the client owns and the spec are taken from the write
        let mut updated = stored.clone();
        updated.metadata.finalizers = label.metadata.finalizers.clone();
        updated.metadata.labels = label.metadata.labels.clone();
        updated.metadata.annotations = label.metadata.annotations.clone();
        updated.spec = label.spec.clone();

        let spec_changed = updated.spec != stored.spec;
        if !spec_changed && updated.metadata == stored.metadata {
            return Ok(updated);
        }

        let version = state.tick();
        updated.metadata.resource_version = Some(version.to_string());
        if spec_changed {
            updated.metadata.generation = Some(updated.metadata.generation.unwrap_or(0) + 1);
        }

        state.writes.push(StoreWrite::NamespaceLabel(updated.clone()));
        if updated.metadata.deletion_timestamp.is_some() && updated.finalizers().is_empty() {
            // Last finalizer gone: the API server removes the object
            state.labels.remove(&key);
        } else {
            state.labels.insert(key, updated.clone());
        }
        state.push_label_event(&namespace, &name);
        Ok(updated)
    }

    async fn update_last_applied(&self, label: &NamespaceLabel, last_applied: &BTreeMap<String, String>) -> Result<NamespaceLabel, StoreError> {
        let mut state = self.state();
        state.record_call(StoreOp::UpdateLastApplied)?;

        let namespace = label.metadata.namespace.clone()
            .ok_or_else(|| StoreError::InvalidObject("NamespaceLabel missing namespace".to_string()))?;
        let name = label.metadata.name.clone()
            .ok_or_else(|| StoreError::InvalidObject("NamespaceLabel missing name".to_string()))?;
        let key = (namespace.clone(), name.clone());

        let stored = state.labels.get(&key)
            .ok_or_else(|| StoreError::NotFound(format!("NamespaceLabel {}/{}", namespace, name)))?;
        check_version(
            stored.metadata.resource_version.as_ref(),
            label.metadata.resource_version.as_ref(),
            &format!("NamespaceLabel {}/{}", namespace, name),
        )?;

        if stored.last_applied_labels() == *last_applied {
            return Ok(stored.clone());
        }

        let mut updated = stored.clone();
        updated.status = Some(NamespaceLabelStatus {
            last_applied_labels: last_applied.clone(),
        });
        let version = state.tick();
        updated.metadata.resource_version = Some(version.to_string());

        state.writes.push(StoreWrite::LastApplied(updated.clone()));
        state.labels.insert(key, updated.clone());
        state.push_label_event(&namespace, &name);
        Ok(updated)
    }

    async fn get_namespace(&self, name: &str) -> Result<Namespace, StoreError> {
        let mut state = self.state();
        state.record_call(StoreOp::GetNamespace)?;
        state
            .namespaces
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Namespace {}", name)))
    }

    async fn update_namespace(&self, namespace: &Namespace) -> Result<Namespace, StoreError> {
        let mut state = self.state();
        state.record_call(StoreOp::UpdateNamespace)?;

        let name = namespace.metadata.name.clone()
            .ok_or_else(|| StoreError::InvalidObject("Namespace missing name".to_string()))?;
        let stored = state.namespaces.get(&name)
            .ok_or_else(|| StoreError::NotFound(format!("Namespace {}", name)))?;
        check_version(
            stored.metadata.resource_version.as_ref(),
            namespace.metadata.resource_version.as_ref(),
            &format!("Namespace {}", name),
        )?;

        let mut updated = stored.clone();
        updated.metadata.labels = namespace.metadata.labels.clone();
        updated.metadata.annotations = namespace.metadata.annotations.clone();
        updated.metadata.finalizers = namespace.metadata.finalizers.clone();

        if updated.metadata == stored.metadata {
            return Ok(updated);
        }

        let version = state.tick();
        updated.metadata.resource_version = Some(version.to_string());

        state.writes.push(StoreWrite::Namespace(updated.clone()));
        state.namespaces.insert(name.clone(), updated.clone());
        state.push_namespace_event(&name);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_time_is_ordered() {
        let a = mock_time(5).unwrap();
        let b = mock_time(61).unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_check_version() {
        let v1 = "1".to_string();
        let v2 = "2".to_string();
        assert!(check_version(Some(&v1), Some(&v1), "x").is_ok());
        assert!(matches!(check_version(Some(&v2), Some(&v1), "x"), Err(StoreError::Conflict(_))));
        assert!(check_version(Some(&v1), None, "x").is_err());
    }
}
