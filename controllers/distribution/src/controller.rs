//! Main controller implementation.
//!
//! Owns the long-running tasks of the operator: the ServerDistribution
//! watcher and the probe server. Legacy cleanup runs once before either
//! starts.

use crate::cleanup::{cleanup_legacy, CleanupOutcome};
use crate::config::Config;
use crate::error::ControllerError;
use crate::probes::{self, Metrics, ProbeState};
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use cluster_client::KubeClusterClient;
use crds::ServerDistribution;
use kube::{Api, Client};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Main controller for ServerDistribution resources.
pub struct Controller {
    watcher: JoinHandle<Result<(), ControllerError>>,
    probe_server: JoinHandle<Result<(), ControllerError>>,
    cancel: CancellationToken,
}

impl Controller {
    /// Connects to the cluster, cleans up legacy bindings and starts the
    /// watcher and probe server.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing distro-operator controller");

        let kube_client = Client::try_default().await?;
        let cluster_client = KubeClusterClient::new(kube_client.clone());

        let report = cleanup_legacy(&cluster_client).await;
        let failed = report
            .iter()
            .filter(|r| matches!(r.outcome, CleanupOutcome::Failed(_)))
            .count();
        if failed > 0 {
            warn!("Legacy cleanup left {} ClusterRoleBindings behind", failed);
        } else {
            info!("Legacy cleanup completed ({} bindings removed)", report.len());
        }

        let api: Api<ServerDistribution> = match &config.watch_namespace {
            Some(ns) => Api::namespaced(kube_client, ns),
            None => Api::all(kube_client),
        };

        let metrics = Arc::new(Metrics::new()?);
        let ready = Arc::new(AtomicBool::new(false));
        let probe_addr = config.probe_addr;
        let reconciler = Arc::new(Reconciler::new(Box::new(cluster_client), config, Arc::clone(&metrics))?);

        let cancel = CancellationToken::new();

        let probe_state = ProbeState {
            metrics,
            ready: Arc::clone(&ready),
        };
        let probe_server = tokio::spawn(probes::serve(probe_addr, probe_state, cancel.clone()));

        let watcher_cancel = cancel.clone();
        let watcher = tokio::spawn(async move {
            Watcher::new(reconciler, api).watch(watcher_cancel).await
        });
        ready.store(true, Ordering::Relaxed);

        Ok(Self {
            watcher,
            probe_server,
            cancel,
        })
    }

    /// Runs the controller until Ctrl-C or until a task exits.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("distro-operator controller running");

        let result = tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                signal.map_err(ControllerError::from)
            }
            result = &mut self.watcher => {
                result.unwrap_or_else(|e| Err(ControllerError::Watch(format!("ServerDistribution watcher panicked: {e}"))))
            }
            result = &mut self.probe_server => {
                result.unwrap_or_else(|e| Err(ControllerError::Watch(format!("Probe server panicked: {e}"))))
            }
        };

        self.cancel.cancel();
        if !self.watcher.is_finished() {
            let _ = self.watcher.await;
        }
        if !self.probe_server.is_finished() {
            let _ = self.probe_server.await;
        }
        info!("distro-operator controller stopped");
        result
    }
}
