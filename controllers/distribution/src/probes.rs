//! Health, readiness and metrics endpoints.
//!
//! Served over HTTP with axum on `PROBE_ADDR`:
//! - `/healthz`: always 200 while the process runs
//! - `/readyz`: 200 once startup cleanup has finished and the watcher runs
//! - `/metrics`: Prometheus text exposition

use crate::error::ControllerError;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Controller metrics.
pub struct Metrics {
    converge_total: IntCounterVec,
    reconcile_errors_total: IntCounter,
    registry: Registry,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let converge_total = IntCounterVec::new(
            Opts::new("distro_converge_total", "Resources converged, by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(converge_total.clone()))?;

        let reconcile_errors_total = IntCounter::new(
            "distro_reconcile_errors_total",
            "Reconciliation passes that ended in an error",
        )?;
        registry.register(Box::new(reconcile_errors_total.clone()))?;

        Ok(Self {
            converge_total,
            reconcile_errors_total,
            registry,
        })
    }

    pub fn record_outcome(&self, outcome: &str) {
        self.converge_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_error(&self) {
        self.reconcile_errors_total.inc();
    }

    pub fn outcome_count(&self, outcome: &str) -> u64 {
        self.converge_total.with_label_values(&[outcome]).get()
    }

    pub fn error_count(&self) -> u64 {
        self.reconcile_errors_total.get()
    }

    /// Renders all metrics in the Prometheus text format.
    pub fn export_text(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[derive(Clone)]
pub struct ProbeState {
    pub metrics: Arc<Metrics>,
    pub ready: Arc<AtomicBool>,
}

pub fn router(state: ProbeState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(state): State<ProbeState>) -> (StatusCode, &'static str) {
    if state.ready.load(Ordering::Relaxed) {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

async fn metrics(State(state): State<ProbeState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export_text()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Serves the probe endpoints until `cancel` fires.
pub async fn serve(addr: SocketAddr, state: ProbeState, cancel: CancellationToken) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Probe server listening on {}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}
