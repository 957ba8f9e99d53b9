//! Probe and metrics endpoints.
//!
//! `/healthz` answers as long as the process serves HTTP. `/readyz` follows
//! the controller's [`Phase`]: it only reports ready between cache sync and
//! the start of shutdown. `/metrics` exposes [`SyncMetrics`].

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Lifecycle of the controller as seen by the readiness probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for informer caches.
    Starting,
    /// Caches synced, workers running.
    Ready,
    /// Stop requested, workers draining.
    Stopping,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Starting => "caches not synced",
            Phase::Ready => "ready",
            Phase::Stopping => "shutting down",
        }
    }
}

/// How one pass over a queued key ended.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced,
    Requeued,
    Dropped,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct OutcomeLabels {
    outcome: SyncOutcome,
}

impl EncodeLabelSet for OutcomeLabels {
    fn encode(&self, encoder: &mut LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        let outcome = match self.outcome {
            SyncOutcome::Synced => "synced",
            SyncOutcome::Requeued => "requeued",
            SyncOutcome::Dropped => "dropped",
        };
        ("outcome", outcome).encode(encoder.encode_label())
    }
}

/// Controller metrics, registered under the `cspc_operator` prefix.
pub struct SyncMetrics {
    syncs: Family<OutcomeLabels, Counter>,
    sync_duration_seconds: Histogram,
    /// Keys waiting in the work queue
    pub work_queue_depth: Gauge,
    /// Workers currently pulling from the queue
    pub workers_active: Gauge,
    /// Unix time of the last successful sync
    pub last_sync_timestamp_seconds: Gauge,
    registry: Registry,
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("cspc_operator");

        let syncs = Family::<OutcomeLabels, Counter>::default();
        registry.register("syncs", "CStorPoolCluster syncs by outcome", syncs.clone());

        let sync_duration_seconds = Histogram::new(exponential_buckets(0.005, 2.0, 12));
        registry.register(
            "sync_duration_seconds",
            "Time spent in one CStorPoolCluster sync",
            sync_duration_seconds.clone(),
        );

        let work_queue_depth = Gauge::default();
        registry.register(
            "work_queue_depth",
            "CStorPoolCluster keys waiting in the work queue",
            work_queue_depth.clone(),
        );

        let workers_active = Gauge::default();
        registry.register(
            "workers_active",
            "Workers pulling from the work queue",
            workers_active.clone(),
        );

        let last_sync_timestamp_seconds = Gauge::default();
        registry.register(
            "last_sync_timestamp_seconds",
            "Unix time of the last successful CStorPoolCluster sync",
            last_sync_timestamp_seconds.clone(),
        );

        Self {
            syncs,
            sync_duration_seconds,
            work_queue_depth,
            workers_active,
            last_sync_timestamp_seconds,
            registry,
        }
    }

    /// Count one finished sync and how long it took.
    pub fn record_sync(&self, outcome: SyncOutcome, duration_secs: f64) {
        self.syncs.get_or_create(&OutcomeLabels { outcome }).inc();
        self.sync_duration_seconds.observe(duration_secs);
        if outcome == SyncOutcome::Synced {
            self.last_sync_timestamp_seconds
                .set(jiff::Timestamp::now().as_second());
        }
    }

    pub fn syncs(&self, outcome: SyncOutcome) -> u64 {
        self.syncs.get_or_create(&OutcomeLabels { outcome }).get()
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.work_queue_depth
            .set(i64::try_from(depth).unwrap_or(i64::MAX));
    }

    /// Prometheus text exposition of every metric.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// State shared between the controller and the probe server.
pub struct HealthState {
    phase: watch::Sender<Phase>,
    pub metrics: SyncMetrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            phase: watch::Sender::new(Phase::Starting),
            metrics: SyncMetrics::new(),
        }
    }

    pub fn set_phase(&self, phase: Phase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            debug!(from = ?previous, to = ?phase, "Controller phase changed");
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.phase() == Phase::Ready
    }

    /// Wait until the controller reaches `phase`.
    pub async fn wait_for(&self, phase: Phase) {
        let mut rx = self.phase.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|p| *p == phase).await;
    }
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    let phase = state.phase();
    let code = if phase == Phase::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, phase.as_str()).into_response()
}

async fn metrics(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.encode(),
    )
}

pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve probes and metrics on `addr` until `stop` fires.
pub async fn run_health_server(
    state: Arc<HealthState>,
    addr: SocketAddr,
    stop: CancellationToken,
) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Starting health server");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { stop.cancelled().await })
        .await
}
