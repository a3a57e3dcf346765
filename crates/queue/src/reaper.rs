//! Periodic eviction of finished jobs.
//!
//! Runs on a fixed `tokio::time::interval` and removes completed, failed
//! and cancelled jobs whose terminal timestamp is older than the retention
//! age. Evicted ids report "not found" afterwards.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::queue::JobQueue;

/// Lower bound on the sweep interval; `interval` rejects zero.
const MIN_REAP_INTERVAL: Duration = Duration::from_millis(10);

/// Run the sweep loop until `cancel` is triggered.
pub(crate) async fn run(queue: Arc<JobQueue>, cancel: CancellationToken) {
    let period = queue.config().reap_interval.max(MIN_REAP_INTERVAL);
    tracing::info!(
        interval_secs = period.as_secs(),
        cleanup_age_secs = queue.config().cleanup_age.as_secs(),
        "Retention reaper started"
    );

    let mut interval = tokio::time::interval(period);
    // The first tick completes immediately; skip it so a fresh queue is not
    // swept at startup.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Retention reaper stopping");
                break;
            }
            _ = interval.tick() => {
                let removed = queue.reap_expired(Utc::now()).await;
                if removed > 0 {
                    tracing::info!(removed, "Retention reaper: evicted finished jobs");
                } else {
                    tracing::debug!("Retention reaper: nothing to evict");
                }
            }
        }
    }
}
