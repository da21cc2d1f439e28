//! Kubernetes resource watcher.
//!
//! Watches ServerDistribution resources with `kube_runtime::Controller` and
//! runs one reconciliation pass per change. Failed passes are requeued with
//! a per-object Fibonacci backoff, which is dropped once the object is gone.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crds::ServerDistribution;
use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::controller::{self, Action, Config as ControllerConfig};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// State shared with every reconcile call.
#[derive(Debug)]
struct WatchContext {
    reconciler: Arc<Reconciler>,
    cancel: CancellationToken,
}

type RunResult = Result<(ObjectRef<ServerDistribution>, Action), controller::Error<ControllerError, watcher::Error>>;

fn backoff_key(namespace: Option<&str>, name: &str) -> String {
    format!("{}/{}", namespace.unwrap_or_default(), name)
}

fn object_key(dist: &ServerDistribution) -> String {
    backoff_key(dist.namespace().as_deref(), &dist.name_any())
}

/// Logs one controller result. A requeued object that has left the watch
/// cache was deleted, so its backoff state goes with it.
fn handle_run_result(reconciler: &Reconciler, res: RunResult) {
    match res {
        Ok((obj, _)) => debug!("Reconciled {}", backoff_key(obj.namespace.as_deref(), &obj.name)),
        Err(controller::Error::ObjectNotFound(obj)) => {
            let key = backoff_key(obj.namespace.as_deref(), &obj.name);
            debug!("ServerDistribution {} is gone, dropping its backoff state", key);
            reconciler.backoff.reset(&key);
        }
        Err(e) => error!("Controller error for ServerDistribution: {}", e),
    }
}

async fn reconcile(dist: Arc<ServerDistribution>, ctx: Arc<WatchContext>) -> Result<Action, ControllerError> {
    let key = object_key(&dist);
    debug!("Reconciling ServerDistribution {}", key);
    ctx.reconciler.reconcile_distribution(&dist, &ctx.cancel).await?;
    ctx.reconciler.backoff.reset(&key);
    Ok(Action::await_change())
}

fn error_policy(dist: Arc<ServerDistribution>, error: &ControllerError, ctx: Arc<WatchContext>) -> Action {
    if matches!(error, ControllerError::Cancelled) {
        return Action::await_change();
    }
    let key = object_key(&dist);
    let delay = ctx.reconciler.backoff.next_for(&key);
    error!(
        "Reconciliation error for ServerDistribution {}: {} (retrying in {}s)",
        key,
        error,
        delay.as_secs()
    );
    Action::requeue(delay)
}

/// Watches ServerDistribution resources.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    api: Api<ServerDistribution>,
}

impl Watcher {
    pub fn new(reconciler: Arc<Reconciler>, api: Api<ServerDistribution>) -> Self {
        Self { reconciler, api }
    }

    /// Runs until `cancel` fires or the watch stream ends.
    pub async fn watch(self, cancel: CancellationToken) -> Result<(), ControllerError> {
        info!("Starting ServerDistribution watcher");

        let reconciler = Arc::clone(&self.reconciler);
        let ctx = Arc::new(WatchContext {
            reconciler: self.reconciler,
            cancel: cancel.clone(),
        });

        // Debounce batches bursts of events (including our own status
        // writes) into one pass per object.
        let controller_config = ControllerConfig::default()
            .debounce(Duration::from_secs(5))
            .concurrency(3);

        let controller = Controller::new(self.api, watcher::Config::default())
            .with_config(controller_config)
            .run(reconcile, error_policy, ctx)
            .for_each(move |res| {
                handle_run_result(&reconciler, res);
                futures::future::ready(())
            });

        tokio::select! {
            () = controller => {
                Err(ControllerError::Watch("ServerDistribution watch stream ended".to_string()))
            }
            () = cancel.cancelled() => {
                info!("ServerDistribution watcher stopped");
                Ok(())
            }
        }
    }
}
