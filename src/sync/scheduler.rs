//! Timer loop for scheduled sync passes.

use super::{PassMode, Synchronizer};
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Handle to a running scheduler task.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop to stop and wait for it. A pass already running finishes first.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Sync scheduler task ended abnormally");
        }
    }
}

/// Spawn the loop. It exits on shutdown or once the synchronizer is dropped.
pub(crate) fn spawn(sync: Weak<Synchronizer>, period: Duration) -> SchedulerHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(sync) = sync.upgrade() else { break };
                    let pass = tokio::task::spawn_blocking(move || sync.run_pass(PassMode::Scheduled));
                    match pass.await {
                        Ok(Ok(report)) => {
                            if !report.removed.is_empty() || !report.failures.is_empty() {
                                info!(
                                    synced = report.synced.len(),
                                    removed = report.removed.len(),
                                    failed = report.failures.len(),
                                    "Scheduled sync pass"
                                );
                            }
                        }
                        Ok(Err(e)) => warn!(error = %e, "Scheduled sync pass failed"),
                        Err(e) => error!(error = %e, "Scheduled sync pass panicked"),
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        debug!("Sync scheduler stopped");
    });

    SchedulerHandle { shutdown, task }
}
