//! Namespace change handling.
//!
//! Every namespace write the controller makes carries the update marker
//! annotation. The next change event for that namespace therefore shows the
//! marker, and the only reaction is to strip it again. The event caused by
//! stripping it has no marker, so it runs one full pass over the namespace's
//! requests, which is how drift and handed-off keys get picked up.

use crds::{CONTROLLER_UPDATE_ANNOTATION, CONTROLLER_UPDATE_VALUE};
use k8s_openapi::api::core::v1::Namespace;
use tracing::{debug, info, warn};

use super::Reconciler;
use super::arbitration::sort_by_priority;
use crate::error::ControllerError;

/// Whether the namespace carries the update marker.
pub fn has_update_marker(namespace: &Namespace) -> bool {
    namespace
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(CONTROLLER_UPDATE_ANNOTATION))
        .is_some_and(|v| v == CONTROLLER_UPDATE_VALUE)
}

/// Sets the update marker. Returns `false` if it was already set.
pub fn set_update_marker(namespace: &mut Namespace) -> bool {
    if has_update_marker(namespace) {
        return false;
    }
    namespace
        .metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(CONTROLLER_UPDATE_ANNOTATION.to_string(), CONTROLLER_UPDATE_VALUE.to_string());
    true
}

/// Removes the update marker. Returns `false` if it was not set.
pub fn clear_update_marker(namespace: &mut Namespace) -> bool {
    if !has_update_marker(namespace) {
        return false;
    }
    if let Some(annotations) = namespace.metadata.annotations.as_mut() {
        annotations.remove(CONTROLLER_UPDATE_ANNOTATION);
    }
    true
}

impl Reconciler {
    /// Handles a change event for namespace `name`.
    ///
    /// With the marker present the change was ours: clear it and stop.
    /// Otherwise reconcile every request bound to the namespace, oldest first.
    pub async fn reconcile_namespace(&self, name: &str) -> Result<(), ControllerError> {
        let mut namespace = match self.store.get_namespace(name).await {
            Ok(ns) => ns,
            Err(e) if e.is_not_found() => {
                debug!("Namespace {} no longer exists, nothing to do", name);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if clear_update_marker(&mut namespace) {
            self.store.update_namespace(&namespace).await?;
            debug!("Cleared update marker on namespace {}", name);
            return Ok(());
        }

        let mut requests = self.store.list_namespace_labels(name).await?;
        if requests.is_empty() {
            debug!("No NamespaceLabels in namespace {}", name);
            return Ok(());
        }
        sort_by_priority(&mut requests);
        info!("Namespace {} changed, reconciling {} NamespaceLabel(s)", name, requests.len());

        for request in &requests {
            let Some(request_name) = request.metadata.name.as_deref() else {
                warn!("Skipping NamespaceLabel without a name in namespace {}", name);
                continue;
            };
            match self.reconcile_label_request(name, request_name).await {
                Ok(()) => {}
                Err(ControllerError::MalformedRequest(reason)) => {
                    warn!("Skipping NamespaceLabel {}/{}: {}", name, request_name, reason);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
