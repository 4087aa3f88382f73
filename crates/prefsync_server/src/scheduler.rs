//! Background clearance sweep.

use crate::error::{ServerError, ServerResult};
use prefsync_core::ClearanceService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Runs [`ClearanceService::run_clearance_sweep`] on a fixed cadence.
///
/// The first sweep runs immediately. Each sweep runs on the blocking pool and
/// is awaited before the next tick, so a sweep that outlasts the cadence
/// swallows the ticks it missed instead of queueing them.
pub struct ClearanceScheduler {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ClearanceScheduler {
    /// Spawns the scheduler on the current tokio runtime.
    pub fn spawn(service: Arc<ClearanceService>, cadence: Duration) -> Self {
        let (shutdown, signal) = watch::channel(false);
        let cadence = cadence.max(Duration::from_millis(1));
        let task = tokio::spawn(run(service, cadence, signal));
        tracing::info!(cadence_secs = cadence.as_secs(), "clearance scheduler started");
        Self { shutdown, task }
    }

    /// Returns true once the scheduler task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the scheduler, letting an in-flight sweep finish first.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Internal`] if the scheduler task panicked.
    pub async fn shutdown(self) -> ServerResult<()> {
        // the receiver is gone only if the task already ended
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| ServerError::Internal(format!("clearance scheduler failed: {e}")))?;
        tracing::info!("clearance scheduler stopped");
        Ok(())
    }
}

async fn run(service: Arc<ClearanceService>, cadence: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = time::interval(cadence);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => sweep_once(&service).await,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

async fn sweep_once(service: &Arc<ClearanceService>) {
    let service = Arc::clone(service);
    match tokio::task::spawn_blocking(move || service.run_clearance_sweep()).await {
        Ok(Ok(report)) if report.skipped => {
            tracing::debug!("clearance sweep skipped, another sweep is running");
        }
        Ok(Ok(report)) => {
            tracing::info!(
                candidates = report.candidates,
                deleted = report.deleted,
                survived = report.survived,
                failed = report.failed,
                "clearance sweep finished"
            );
        }
        Ok(Err(e)) => tracing::error!(error = %e, "clearance sweep failed"),
        Err(e) => tracing::error!(error = %e, "clearance sweep task failed"),
    }
}
