//! NamespaceLabel Controller
//!
//! Keeps the labels of each namespace in sync with the `NamespaceLabel`
//! requests living in it:
//! - labels requested by any request are written to the namespace
//! - labels dropped from a request, or left behind by a deleted request, are
//!   removed unless another request still wants them
//! - manual edits to managed labels are reverted

mod backoff;
mod config;
mod controller;
mod error;
mod reconciler;
mod watcher;
#[cfg(test)]
mod test_utils;

use crate::config::{Config, LogFormat};
use crate::error::ControllerError;
use controller::Controller;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    // kube's rustls transport needs a process-wide crypto provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }

    info!("Starting NamespaceLabel Controller");
    info!("Configuration:");
    info!("  Namespace: {}", config.watch_namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Concurrency: {}", config.concurrency);
    info!("  Debounce: {:?}", config.debounce);
    info!("  Backoff: {}s..{}s", config.backoff_min_seconds, config.backoff_max_seconds);

    let controller = Controller::new(&config).await?;
    controller.run().await
}
