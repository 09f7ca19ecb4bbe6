//! Test utilities for unit testing the reconciler
//!
//! This module provides helpers for creating test data and an event loop that
//! replays store change events the way the watchers would deliver them.

use std::collections::BTreeMap;

use crds::NamespaceLabel;
use label_store::{MockLabelStore, StoreEvent};

use crate::reconciler::Reconciler;

/// Upper bound on events handled by [`drain_events`] before it gives up.
pub const MAX_EVENTS: usize = 200;

/// Namespace used by the fixtures.
pub const NS: &str = "team-a";

/// Helper to build a label map
pub fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Helper to create a NamespaceLabel in [`NS`] with a fixed creation timestamp
pub fn request_at(name: &str, created: &str, desired: &[(&str, &str)]) -> NamespaceLabel {
    let mut request = label_store::mock::namespace_label(NS, name, desired);
    request.metadata.creation_timestamp =
        Some(serde_json::from_value(serde_json::json!(created)).unwrap());
    request
}

/// Reconciler over a handle to `store`, with default backoff bounds
pub fn reconciler(store: &MockLabelStore) -> Reconciler {
    Reconciler::new(store.clone(), 1, 60)
}

/// Feeds pending store events back into the reconciler until none are left.
///
/// Returns the number of events handled. Panics if a pass fails or if the
/// events do not settle within [`MAX_EVENTS`], which would mean the
/// controller keeps reacting to its own writes.
pub async fn drain_events(reconciler: &Reconciler, store: &MockLabelStore) -> usize {
    let mut handled = 0;
    while let Some(event) = store.pop_event() {
        handled += 1;
        assert!(handled <= MAX_EVENTS, "events did not settle after {} passes", MAX_EVENTS);

        let result = match &event {
            StoreEvent::NamespaceLabel { namespace, name } => {
                reconciler.reconcile_label_request(namespace, name).await
            }
            StoreEvent::Namespace { name } => reconciler.reconcile_namespace(name).await,
        };
        if let Err(e) = result {
            panic!("pass for {:?} failed: {}", event, e);
        }
    }
    handled
}
