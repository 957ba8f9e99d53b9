//! The assembled controller and its worker pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::controller::key::ObjectKey;
use crate::controller::reconciler::{SyncContext, sync_cspc};
use crate::controller::recorder::CONTROLLER_NAME;
use crate::error::{Error, Result};
use crate::health::{HealthState, Phase, SyncOutcome};
use crate::informer::{InformerSynced, wait_for_cache_sync};
use crate::workqueue::WorkQueue;

/// Grace period for in-flight reconciliations to complete during shutdown
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

struct Inner {
    ctx: SyncContext,
    queue: WorkQueue<ObjectKey>,
    synced: Vec<InformerSynced>,
    health_state: Option<Arc<HealthState>>,
    cache_sync_timeout: Duration,
}

/// A built CSPC controller. Cheap to clone; clones share the work queue.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

impl Controller {
    pub(crate) fn new(
        ctx: SyncContext,
        queue: WorkQueue<ObjectKey>,
        synced: Vec<InformerSynced>,
        health_state: Option<Arc<HealthState>>,
        cache_sync_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                ctx,
                queue,
                synced,
                health_state,
                cache_sync_timeout,
            }),
        }
    }

    pub fn work_queue(&self) -> &WorkQueue<ObjectKey> {
        &self.inner.queue
    }

    /// Process CSPC keys with `workers` concurrent workers until `stop` fires.
    ///
    /// Waits for the informer caches first and fails if they do not sync
    /// within the configured timeout. Reconciliation errors are retried
    /// through the work queue and never returned from here.
    pub async fn run(&self, workers: usize, stop: CancellationToken) -> Result<()> {
        if workers == 0 {
            return Err(Error::InvalidWorkerCount);
        }

        info!(controller = CONTROLLER_NAME, workers, "Starting controller");

        if let Err(e) = wait_for_cache_sync(
            CONTROLLER_NAME,
            &stop,
            self.inner.cache_sync_timeout,
            &self.inner.synced,
        )
        .await
        {
            self.inner.queue.shut_down();
            return Err(e);
        }

        let mut tasks = JoinSet::new();
        for id in 0..workers {
            tasks.spawn(worker(id, Arc::clone(&self.inner), stop.clone()));
        }
        info!(controller = CONTROLLER_NAME, workers, "Started workers");

        if let Some(ref state) = self.inner.health_state {
            state.set_phase(Phase::Ready);
        }

        stop.cancelled().await;
        info!(controller = CONTROLLER_NAME, "Shutting down workers");

        if let Some(ref state) = self.inner.health_state {
            state.set_phase(Phase::Stopping);
        }
        self.inner.queue.shut_down();

        let drained = tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, async {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    error!(error = %e, "Worker panicked");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = tasks.len(),
                grace_secs = SHUTDOWN_GRACE_PERIOD.as_secs(),
                "Workers did not stop within grace period, aborting"
            );
            tasks.shutdown().await;
        }

        info!(controller = CONTROLLER_NAME, "Controller stopped");
        Ok(())
    }
}

async fn worker(id: usize, inner: Arc<Inner>, stop: CancellationToken) {
    if let Some(ref state) = inner.health_state {
        state.metrics.workers_active.inc();
    }

    while let Some(key) = inner.queue.get().await {
        process_item(&inner, &key, &stop).await;
        inner.queue.done(&key);
        if let Some(ref state) = inner.health_state {
            state.metrics.set_queue_depth(inner.queue.len());
        }
    }

    if let Some(ref state) = inner.health_state {
        state.metrics.workers_active.dec();
    }
    debug!(worker = id, "Worker stopped");
}

async fn process_item(inner: &Inner, key: &ObjectKey, stop: &CancellationToken) {
    let start = Instant::now();

    let result = tokio::select! {
        biased;
        _ = stop.cancelled() => {
            debug!(key = %key, "Stop requested, abandoning sync");
            return;
        }
        result = sync_cspc(&inner.ctx, key) => result,
    };

    let outcome = match result {
        Ok(()) => {
            inner.queue.forget(key);
            debug!(key = %key, "Successfully synced");
            SyncOutcome::Synced
        }
        Err(e) if e.is_retryable() => {
            warn!(
                key = %key,
                error = %e,
                requeues = inner.queue.num_requeues(key),
                "Error syncing, requeuing"
            );
            inner.queue.add_rate_limited(key.clone());
            SyncOutcome::Requeued
        }
        Err(e) => {
            error!(key = %key, error = %e, "Error syncing, dropping");
            inner.queue.forget(key);
            SyncOutcome::Dropped
        }
    };

    if let Some(ref state) = inner.health_state {
        state
            .metrics
            .record_sync(outcome, start.elapsed().as_secs_f64());
    }
}
