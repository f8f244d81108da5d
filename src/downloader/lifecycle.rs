//! Shutdown coordination.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{Event, TaskId};

use super::DownloadQueue;

/// Upper bound on how long shutdown waits for workers to wind down
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between checks while waiting for workers
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

impl DownloadQueue {
    /// Gracefully shut down the queue
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new tasks (`enqueue` and `start` return [`Error::ShuttingDown`])
    /// 2. Stops the pool, cancelling every active task
    /// 3. Discards every pending task without failing it
    /// 4. Waits for workers to wind down with a timeout (30 seconds)
    ///
    /// Cancelled workers still land in the failed list with a cancellation error.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating download queue shutdown");

        // 1. Stop accepting new work
        self.state.accepting_new.store(false, Ordering::SeqCst);

        // 2. Cancel active tasks and end the dispatch loop
        self.stop().await;

        // 3. Discard pending tasks
        let discarded = self.discard_pending().await;
        tracing::info!(discarded = discarded.len(), "Discarded pending downloads");
        for id in discarded {
            self.emit_event(Event::Removed { id });
        }

        // 4. Wait for workers with timeout
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_workers()).await {
            Ok(()) => tracing::info!("All download workers finished"),
            Err(_) => {
                tracing::warn!("Timeout waiting for download workers, proceeding with shutdown");
            }
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Download queue shutdown complete");
        Ok(())
    }

    /// Wait until no task is pending or running
    ///
    /// Returns once the pending set is empty and every worker has finalized
    /// its task, or [`Error::Timeout`] if that does not happen within `timeout`.
    /// Useful for batch front ends that enqueue a fixed set and wait for it.
    pub async fn wait_until_idle(&self, timeout: Duration) -> Result<()> {
        let drained = async {
            loop {
                let idle = {
                    let inner = self.state.inner.read().await;
                    inner.pending.is_empty() && inner.workers == 0
                };
                if idle {
                    return;
                }
                tokio::time::sleep(self.config.poll_interval.min(DRAIN_POLL_INTERVAL)).await;
            }
        };

        tokio::time::timeout(timeout, drained)
            .await
            .map_err(|_| Error::Timeout(timeout))
    }

    /// Remove every pending task, returning their ids
    async fn discard_pending(&self) -> Vec<TaskId> {
        let mut inner = self.state.inner.write().await;
        let ids: Vec<TaskId> = inner.pending.iter().map(|entry| entry.id.clone()).collect();
        for id in &ids {
            inner.remove_pending(id);
        }
        ids
    }

    /// Wait until every worker has exited
    async fn wait_for_workers(&self) {
        loop {
            let workers = self.state.inner.read().await.workers;
            if workers == 0 {
                return;
            }

            tracing::debug!(workers, "Waiting for download workers to finish");
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }
}
