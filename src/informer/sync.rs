//! Waiting for informer caches to finish their initial listing.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{Error, Result};

/// Reports whether one informer has completed its first full listing.
pub type InformerSynced = Arc<dyn Fn() -> bool + Send + Sync>;

const SYNC_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Block until every predicate reports synced.
///
/// Fails if `stop` fires first or `timeout` elapses.
pub async fn wait_for_cache_sync(
    controller: &str,
    stop: &CancellationToken,
    timeout: Duration,
    synced: &[InformerSynced],
) -> Result<()> {
    info!(controller = %controller, "Waiting for informer caches to sync");

    let all_synced = || synced.iter().all(|f| f());
    let poll = async {
        let mut ticker = tokio::time::interval(SYNC_POLL_INTERVAL);
        loop {
            ticker.tick().await;
            if all_synced() {
                return;
            }
        }
    };

    tokio::select! {
        _ = stop.cancelled() => Err(Error::CacheSync(format!(
            "{controller}: stop requested before caches synced"
        ))),
        result = tokio::time::timeout(timeout, poll) => match result {
            Ok(()) => {
                info!(controller = %controller, "Caches are synced");
                Ok(())
            }
            Err(_) => Err(Error::CacheSync(format!(
                "{controller}: caches not synced after {}s",
                timeout.as_secs()
            ))),
        },
    }
}
