//! Background tasks for the Steward server.
//!
//! Includes:
//! - Pruning expired records from the task ledger.

use tokio::time::{sleep, Duration};

use crate::tasks::TaskLedger;

/// How often to prune a ledger whose records live for `ttl`: every `ttl / 2`,
/// but at least once a minute and at most once a second.
pub fn pruning_interval(ttl: Duration) -> Duration {
    (ttl / 2).clamp(Duration::from_secs(1), Duration::from_secs(60))
}

/// Starts the task ledger pruning task.
///
/// This task runs indefinitely, dropping finished task records once they are
/// older than the ledger's TTL. Returns at once if the ledger has no TTL.
pub async fn start_ledger_pruning_task(ledger: TaskLedger, interval: Duration) {
    let Some(ttl) = ledger.ttl() else {
        tracing::warn!("task ledger pruning disabled (no ttl)");
        return;
    };

    tracing::info!(
        ttl_seconds = ttl.as_secs(),
        interval_ms = interval.as_millis() as u64,
        "starting task ledger pruning task"
    );

    loop {
        sleep(interval).await;

        let pruned = ledger.prune();
        if pruned > 0 {
            tracing::info!(count = pruned, remaining = ledger.len(), "pruned task records");
        } else {
            tracing::debug!("no expired task records to prune");
        }
    }
}
