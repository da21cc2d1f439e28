//! distro-operator
//!
//! Converges ServerDistribution resources into the workloads that run them:
//! a Deployment, its Service, optional storage, a NetworkPolicy and the RBAC
//! bindings of its ServiceAccount.
//!
//! Configuration comes from environment variables, see [`config::Config`].

mod backoff;
mod cleanup;
mod config;
mod controller;
mod error;
mod probes;
mod reconcile_helpers;
mod reconciler;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::config::Config;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        info!("rustls crypto provider already installed");
    }

    info!("Starting distro-operator");

    let config = Config::from_env()?;
    info!("Configuration:");
    info!("  Manifests: {}", config.manifests_path.display());
    info!("  Namespace: {}", config.watch_namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Network policy: {}", if config.enable_network_policy { "enabled" } else { "disabled" });
    info!("  Probe address: {}", config.probe_addr);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
