//! NamespaceLabel lifecycle.
//!
//! A request moves through three states:
//!
//! - **Active**: the finalizer is attached first, then the namespace is
//!   brought in line with `spec.labels` and `status.lastAppliedLabels` is
//!   recorded.
//! - **Finalizing**: `deletionTimestamp` is set while our finalizer is still
//!   attached. Every key in `lastAppliedLabels` that no active request still
//!   wants is removed, then the finalizer is released.
//! - **Gone**: the object no longer exists. Nothing to do.
//!
//! A failed read or write aborts the pass; the next pass recomputes everything
//! from fresh reads.

use std::collections::BTreeMap;

use crds::NamespaceLabel;
use k8s_openapi::api::core::v1::Namespace;
use kube::ResourceExt;
use tracing::{debug, info};

use super::Reconciler;
use super::arbitration::Claims;
use super::merge::{apply_label_delta, merge};
use super::namespace::set_update_marker;
use crate::error::ControllerError;

/// Rejects requests that cannot be applied however often they are retried.
fn check_well_formed(request: &NamespaceLabel, namespace: &str) -> Result<(), ControllerError> {
    if request.target_namespace() != Some(namespace) {
        return Err(ControllerError::MalformedRequest(format!(
            "{} is not bound to namespace {}",
            request.name_any(),
            namespace
        )));
    }
    if request.desired_labels().keys().any(String::is_empty) {
        return Err(ControllerError::MalformedRequest(format!(
            "{}/{} requests a label with an empty key",
            namespace,
            request.name_any()
        )));
    }
    Ok(())
}

impl Reconciler {
    /// Runs one pass for the request `namespace/name`.
    pub async fn reconcile_label_request(&self, namespace: &str, name: &str) -> Result<(), ControllerError> {
        let request = match self.store.get_namespace_label(namespace, name).await {
            Ok(request) => request,
            Err(e) if e.is_not_found() => {
                debug!("NamespaceLabel {}/{} is gone", namespace, name);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if request.is_deleting() {
            return self.finalize_request(request, namespace, name).await;
        }
        check_well_formed(&request, namespace)?;
        self.apply_request(request, namespace, name).await
    }

    async fn apply_request(&self, mut request: NamespaceLabel, namespace: &str, name: &str) -> Result<(), ControllerError> {
        // No label may be written before we are guaranteed a chance to clean up
        if request.add_finalizer() {
            request = self.store.update_namespace_label(&request).await?;
            info!("Attached finalizer to NamespaceLabel {}/{}", namespace, name);
        }

        let target = match self.store.get_namespace(namespace).await {
            Ok(ns) => ns,
            Err(e) if e.is_not_found() => {
                info!("Namespace {} is gone, NamespaceLabel {} has nothing to label", namespace, name);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let desired = request.desired_labels().clone();
        let wrote = self.converge_namespace(&request, &desired, target).await?;

        if request.last_applied_labels() != desired {
            self.store.update_last_applied(&request, &desired).await?;
            info!("Recorded {} applied label(s) for NamespaceLabel {}/{}", desired.len(), namespace, name);
        } else if !wrote {
            debug!("NamespaceLabel {}/{} already converged", namespace, name);
        }
        Ok(())
    }

    async fn finalize_request(&self, mut request: NamespaceLabel, namespace: &str, name: &str) -> Result<(), ControllerError> {
        if !request.has_finalizer() {
            debug!("NamespaceLabel {}/{} is deleting without our finalizer", namespace, name);
            return Ok(());
        }

        match self.store.get_namespace(namespace).await {
            Ok(target) => {
                self.converge_namespace(&request, &BTreeMap::new(), target).await?;
            }
            Err(e) if e.is_not_found() => {
                info!("Namespace {} is gone, nothing to retract for NamespaceLabel {}", namespace, name);
            }
            Err(e) => return Err(e.into()),
        }

        request.remove_finalizer();
        self.store.update_namespace_label(&request).await?;
        info!("Released finalizer on NamespaceLabel {}/{}", namespace, name);
        Ok(())
    }

    /// Moves the namespace labels towards `desired` on behalf of `request`.
    ///
    /// Returns `true` if the namespace was written. Writes always carry the
    /// update marker. A write is forced when keys were handed off to another
    /// request or the request is being finalized, so that the namespace guard
    /// runs a full pass afterwards.
    async fn converge_namespace(
        &self,
        request: &NamespaceLabel,
        desired: &BTreeMap<String, String>,
        target: Namespace,
    ) -> Result<bool, ControllerError> {
        let name = request.name_any();
        let namespace = target.name_any();

        // Malformed peers are skipped by every pass, so they claim nothing
        let peers = self.store.list_namespace_labels(&namespace).await?;
        let claims = Claims::new(
            peers
                .iter()
                .filter(|peer| peer.metadata.name.as_deref() != Some(name.as_str()))
                .filter(|peer| check_well_formed(peer, &namespace).is_ok())
                .chain(std::iter::once(request)),
        );

        let current = target.metadata.labels.clone().unwrap_or_default();
        let delta = merge(desired, &request.last_applied_labels(), &current);
        let resolution = claims.resolve(delta, &name, &current);

        let forced = request.is_deleting() || !resolution.handoff.is_empty();
        if resolution.delta.is_empty() && !forced {
            return Ok(false);
        }

        let mut updated = target;
        let labels_changed = apply_label_delta(&mut updated, &resolution.delta);
        if !set_update_marker(&mut updated) && !labels_changed {
            // Marker already pending, the guard will run anyway
            return Ok(false);
        }

        self.store.update_namespace(&updated).await?;
        info!(
            "Updated namespace {} for NamespaceLabel {}: {} set, {} removed, {} handed off",
            namespace,
            name,
            resolution.delta.to_add.len(),
            resolution.delta.to_remove.len(),
            resolution.handoff.len()
        );
        Ok(true)
    }
}
