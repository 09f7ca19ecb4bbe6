//! Kubernetes resource watchers.
//!
//! This module handles watching Kubernetes resources for changes
//! and triggering reconciliation using kube_runtime::Controller.
//!
//! Both watchers use a generic `watch_resource()` helper. `NamespaceLabel`
//! events run a pass for that one request; `Namespace` events go through the
//! update-marker guard first.

use crate::config::Config;
use crate::error::{ControllerError, Retry};
use crate::reconciler::Reconciler;
use crds::NamespaceLabel;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Namespace;
use kube::{Api, Client, ResourceExt};
use kube_runtime::{Controller, watcher, controller::{Action, Config as ControllerConfig}};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

type ReconcileFuture = Pin<Box<dyn Future<Output = Result<(), ControllerError>> + Send>>;

/// Scheduling knobs shared by both watchers.
#[derive(Debug, Clone, Copy)]
struct WatchSettings {
    debounce: Duration,
    concurrency: u16,
    conflict_requeue: Duration,
}

/// Key identifying an object in the backoff table, e.g. `NamespaceLabel:team-a/labels`.
fn resource_key<K: kube::Resource>(kind: &str, obj: &K) -> String {
    match obj.namespace() {
        Some(namespace) => format!("{}:{}/{}", kind, namespace, obj.name_any()),
        None => format!("{}:{}", kind, obj.name_any()),
    }
}

/// Decides when a failed pass is retried.
fn error_action(reconciler: &Reconciler, key: &str, error: &ControllerError, conflict_requeue: Duration) -> Action {
    match error.retry() {
        Retry::Soon => {
            debug!("Write conflict for {}, retrying from a fresh read: {}", key, error);
            Action::requeue(conflict_requeue)
        }
        Retry::Backoff => {
            let (seconds, error_count) = reconciler.next_backoff_for_resource(key);
            warn!("Reconciliation of {} failed ({} in a row), retrying in {}s: {}", key, error_count, seconds, error);
            Action::requeue(Duration::from_secs(seconds))
        }
        Retry::Never => {
            error!("Reconciliation of {} cannot succeed until it changes: {}", key, error);
            Action::await_change()
        }
    }
}

/// Generic watcher helper that uses kube_runtime::Controller.
///
/// - Controller handles reconnection and the initial listing
/// - passes for the same object never overlap
/// - successful passes reset the object's backoff
async fn watch_resource<K, F>(
    api: Api<K>,
    watcher_config: watcher::Config,
    reconciler: Arc<Reconciler>,
    reconcile_fn: F,
    resource_name: &'static str,
    settings: WatchSettings,
) -> Result<(), ControllerError>
where
    K: kube::Resource + Clone + Send + Sync + 'static + std::fmt::Debug + serde::de::DeserializeOwned,
    K::DynamicType: Default + std::cmp::Eq + std::hash::Hash + Clone + std::fmt::Debug + Unpin,
    F: Fn(Arc<Reconciler>, Arc<K>) -> ReconcileFuture + Send + Sync + Clone + 'static,
{
    info!("Starting {} watcher", resource_name);

    let conflict_requeue = settings.conflict_requeue;
    let error_policy = move |obj: Arc<K>, error: &ControllerError, ctx: Arc<Reconciler>| {
        error_action(&ctx, &resource_key(resource_name, obj.as_ref()), error, conflict_requeue)
    };

    let reconcile = move |obj: Arc<K>, ctx: Arc<Reconciler>| {
        let reconcile_fn = reconcile_fn.clone();
        async move {
            let key = resource_key(resource_name, obj.as_ref());
            debug!("Reconciling {}", key);
            reconcile_fn(ctx.clone(), obj).await?;
            ctx.reset_error(&key);
            Ok::<_, ControllerError>(Action::await_change())
        }
    };

    let controller_config = ControllerConfig::default()
        .debounce(settings.debounce)
        .concurrency(settings.concurrency);

    Controller::new(api, watcher_config)
        .with_config(controller_config)
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            if let Err(e) = res {
                error!("Controller error for {}: {}", resource_name, e);
            }
        })
        .await;

    Ok(())
}

/// Watches NamespaceLabel and Namespace resources for changes.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    namespace_label_api: Api<NamespaceLabel>,
    namespace_api: Api<Namespace>,
    watch_namespace: Option<String>,
    settings: WatchSettings,
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("watch_namespace", &self.watch_namespace)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(client: Client, reconciler: Arc<Reconciler>, config: &Config) -> Self {
        let namespace_label_api = match &config.watch_namespace {
            Some(namespace) => Api::namespaced(client.clone(), namespace),
            None => Api::all(client.clone()),
        };
        Self {
            reconciler,
            namespace_label_api,
            namespace_api: Api::all(client),
            watch_namespace: config.watch_namespace.clone(),
            settings: WatchSettings {
                debounce: config.debounce,
                concurrency: config.concurrency,
                conflict_requeue: config.conflict_requeue,
            },
        }
    }

    /// Starts watching NamespaceLabel resources.
    pub async fn watch_namespace_labels(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.namespace_label_api.clone(),
            watcher::Config::default(),
            self.reconciler.clone(),
            |reconciler, resource: Arc<NamespaceLabel>| {
                Box::pin(async move {
                    let name = resource.name_any();
                    let namespace = resource.namespace().ok_or_else(|| {
                        ControllerError::MalformedRequest(format!("NamespaceLabel {} has no namespace", name))
                    })?;
                    reconciler.reconcile_label_request(&namespace, &name).await
                })
            },
            "NamespaceLabel",
            self.settings,
        ).await
    }

    /// Starts watching Namespace resources.
    pub async fn watch_namespaces(&self) -> Result<(), ControllerError> {
        let watcher_config = match &self.watch_namespace {
            Some(namespace) => watcher::Config::default().fields(&format!("metadata.name={}", namespace)),
            None => watcher::Config::default(),
        };
        watch_resource(
            self.namespace_api.clone(),
            watcher_config,
            self.reconciler.clone(),
            |reconciler, resource: Arc<Namespace>| {
                Box::pin(async move { reconciler.reconcile_namespace(&resource.name_any()).await })
            },
            "Namespace",
            self.settings,
        ).await
    }
}
