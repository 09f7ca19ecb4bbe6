//! Reconciliation logic for NamespaceLabel requests and their namespaces.
//!
//! - `merge`: per-request label diff
//! - `arbitration`: which request owns a key when several want it
//! - `lifecycle`: finalizer protocol and the per-request pass
//! - `namespace`: update-marker guard for namespace change events

pub mod arbitration;
pub mod lifecycle;
pub mod merge;
pub mod namespace;


use crate::backoff::FibonacciBackoff;
use label_store::LabelStoreTrait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Backoff state for a resource
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_seconds, max_seconds),
            error_count: 0,
        }
    }

    fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Reconciles NamespaceLabel requests against their namespaces.
///
/// Holds no label state between passes; every pass reads what it needs from
/// the store. The only in-memory state is the per-object retry backoff.
pub struct Reconciler {
    pub(crate) store: Box<dyn LabelStoreTrait + Send + Sync>,
    backoff_min_seconds: u64,
    backoff_max_seconds: u64,
    /// Error count tracking per resource (kind:namespace/name -> BackoffState)
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("backoff_min_seconds", &self.backoff_min_seconds)
            .field("backoff_max_seconds", &self.backoff_max_seconds)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        store: impl LabelStoreTrait + Send + Sync + 'static,
        backoff_min_seconds: u64,
        backoff_max_seconds: u64,
    ) -> Self {
        Self {
            store: Box::new(store),
            backoff_min_seconds,
            backoff_max_seconds,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get the next Fibonacci backoff for a resource and record the failure
    ///
    /// Returns (backoff_seconds, error_count)
    pub fn next_backoff_for_resource(&self, resource_key: &str) -> (u64, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(resource_key.to_string())
                    .or_insert_with(|| BackoffState::new(self.backoff_min_seconds, self.backoff_max_seconds));
                state.error_count += 1;
                (state.backoff.next_backoff_seconds(), state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using maximum backoff", e);
                (self.backoff_max_seconds, 0)
            }
        }
    }

    /// Reset error count for a resource (on successful reconciliation)
    pub fn reset_error(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(resource_key) {
                state.reset();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use label_store::MockLabelStore;

    #[test]
    fn test_backoff_is_per_resource_and_resets() {
        let reconciler = Reconciler::new(MockLabelStore::new(), 1, 60);

        assert_eq!(reconciler.next_backoff_for_resource("ns:a"), (1, 1));
        assert_eq!(reconciler.next_backoff_for_resource("ns:a"), (1, 2));
        assert_eq!(reconciler.next_backoff_for_resource("ns:a"), (2, 3));
        assert_eq!(reconciler.next_backoff_for_resource("ns:b"), (1, 1));

        reconciler.reset_error("ns:a");
        assert_eq!(reconciler.next_backoff_for_resource("ns:a"), (1, 1));
    }
}
