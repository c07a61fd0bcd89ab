use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::Pipeline;

/// Result of one stale-run sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    /// Finished processing runs whose status was still `running`.
    pub completed: Vec<Uuid>,
    /// Runs that stayed `running` past the staleness cutoff.
    pub failed: Vec<Uuid>,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}

/// Periodically run `cleanup_stale_runs` until `shutdown` flips.
pub fn spawn_reaper(
    pipeline: Pipeline,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }
            match pipeline.cleanup_stale_runs().await {
                Ok(report) if !report.is_empty() => {
                    tracing::info!(
                        total = report.total(),
                        completed = report.completed.len(),
                        failed = report.failed.len(),
                        "Reaped stale runs"
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Stale run cleanup failed"),
            }
        }
        tracing::debug!("Reaper stopped");
    })
}
