//! Background loop firing a library update on a fixed interval

use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::types::Event;

use super::LibraryUpdater;

/// Maximum time `shutdown()` waits for a run in progress
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle of a running background loop
pub(crate) struct ScheduleHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl LibraryUpdater {
    /// Start the background loop
    ///
    /// The first run happens one interval after the call. Starting a running
    /// loop does nothing, and an interval of zero leaves the loop disabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown).
    pub async fn start(&self) -> Result<()> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let period = self.config.interval;
        if period.is_zero() {
            tracing::info!("Automatic library updates disabled (interval is zero)");
            return Ok(());
        }

        let mut schedule = self.schedule.lock().await;
        if schedule.is_some() {
            return Ok(());
        }

        let token = CancellationToken::new();
        let task = tokio::spawn(self.clone().run_schedule(period, token.clone()));
        *schedule = Some(ScheduleHandle { token, task });

        tracing::info!(interval_secs = period.as_secs(), "Library update loop started");
        Ok(())
    }

    /// Stop the background loop
    ///
    /// A run already in progress is allowed to finish on its own.
    pub async fn stop(&self) {
        if let Some(handle) = self.schedule.lock().await.take() {
            handle.token.cancel();
            tracing::info!("Library update loop stopped");
        }
    }

    /// Whether the background loop is running
    pub async fn is_running(&self) -> bool {
        self.schedule.lock().await.is_some()
    }

    /// Stop the loop, refuse further runs and wait for a run in progress
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down library updater");
        self.accepting_new.store(false, Ordering::SeqCst);

        let handle = self.schedule.lock().await.take();
        if let Some(handle) = handle {
            handle.token.cancel();
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle.task).await.is_err() {
                tracing::warn!(
                    timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
                    "Update loop did not exit in time"
                );
            }
        }

        // An on-demand run may still hold the run lock
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, self.run_lock.lock())
            .await
            .is_err()
        {
            tracing::warn!("Library update still running at shutdown");
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Library updater shut down");
    }

    async fn run_schedule(self, period: Duration, token: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.update_library().await {
                Ok(summary) => tracing::debug!(
                    new_chapters = summary.new_chapters,
                    "Scheduled library update finished"
                ),
                Err(Error::ShuttingDown) => break,
                Err(e) => tracing::warn!(error = %e, "Scheduled library update failed"),
            }
        }

        tracing::debug!("Library update loop exited");
    }
}
