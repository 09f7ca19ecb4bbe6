//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the Kubernetes
//! client, the store, the reconciler and the two watchers together.

use crate::config::Config;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use kube::Client;
use label_store::KubeLabelStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for namespace label management.
#[derive(Debug)]
pub struct Controller {
    namespace_label_watcher: JoinHandle<Result<(), ControllerError>>,
    namespace_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its watchers.
    pub async fn new(config: &Config) -> Result<Self, ControllerError> {
        info!("Initializing NamespaceLabel Controller");

        let kube_client = Client::try_default().await?;
        let store = KubeLabelStore::new(kube_client.clone());
        let reconciler = Arc::new(Reconciler::new(
            store,
            config.backoff_min_seconds,
            config.backoff_max_seconds,
        ));
        let watcher = Arc::new(Watcher::new(kube_client, reconciler, config));

        let namespace_label_watcher = {
            let watcher = watcher.clone();
            tokio::spawn(async move {
                watcher.watch_namespace_labels().await
            })
        };

        let namespace_watcher = {
            let watcher = watcher.clone();
            tokio::spawn(async move {
                watcher.watch_namespaces().await
            })
        };

        Ok(Self {
            namespace_label_watcher,
            namespace_watcher,
        })
    }

    /// Runs until one of the watchers stops.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("NamespaceLabel Controller running");

        // Watchers should run forever
        tokio::select! {
            result = &mut self.namespace_label_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("NamespaceLabel watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("NamespaceLabel watcher error: {}", e)))?;
            }
            result = &mut self.namespace_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Namespace watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("Namespace watcher error: {}", e)))?;
            }
        }

        Err(ControllerError::Watch("watcher exited unexpectedly".to_string()))
    }
}
