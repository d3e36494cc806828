//! Probe and metrics endpoints.
//!
//! Serves `/healthz`, `/readyz` and `/metrics` (Prometheus text format) on
//! the probe bind address. Reconcile counters and durations are recorded by
//! the watchers.

use crate::error::ControllerError;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Reconcile metrics shared by all watchers
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    reconciles: IntCounterVec,
    duration: HistogramVec,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create the metrics and register them in a fresh registry
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();
        let reconciles = IntCounterVec::new(
            Opts::new("kairos_capi_reconcile_total", "Reconcile passes by controller and result"),
            &["controller", "result"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new(
                "kairos_capi_reconcile_duration_seconds",
                "Duration of reconcile passes in seconds",
            ),
            &["controller"],
        )?;
        registry.register(Box::new(reconciles.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            reconciles,
            duration,
        })
    }

    /// Record one finished pass; `result` is `success` or `error`
    pub fn observe(&self, controller: &str, result: &str, elapsed: Duration) {
        self.reconciles.with_label_values(&[controller, result]).inc();
        self.duration
            .with_label_values(&[controller])
            .observe(elapsed.as_secs_f64());
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> Result<String, ControllerError> {
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }
}

/// State behind the probe endpoints
#[derive(Debug, Clone)]
pub struct ProbeState {
    metrics: Arc<Metrics>,
    ready: Arc<AtomicBool>,
}

impl ProbeState {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flip `/readyz` to 200 once the watchers are running
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(state): State<ProbeState>) -> impl IntoResponse {
    if state.ready.load(Ordering::Acquire) {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "starting")
    }
}

async fn metrics(State(state): State<ProbeState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Router serving the probe endpoints
pub fn router(state: ProbeState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Serve the probe endpoints until the process exits
pub async fn serve(addr: SocketAddr, state: ProbeState) -> Result<(), ControllerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ControllerError::Probe(format!("failed to bind {}: {}", addr, e)))?;
    info!("Probe server listening on {}", addr);

    axum::serve(listener, router(state))
        .await
        .map_err(|e| ControllerError::Probe(e.to_string()))
}
