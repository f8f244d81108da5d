//! Aggregate download counters.
//!
//! The counters live inside the download queue's state and are only touched
//! while its write lock is held, in the same critical section as the structural
//! change they describe. Snapshots are plain copies.

use serde::{Deserialize, Serialize};

/// Aggregate download counters
///
/// `active + completed + failed <= total` holds at every observation, with
/// equality once nothing is pending or in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadStats {
    /// Tasks accepted and not discarded before running to completion
    pub total: u64,
    /// Tasks currently owned by a worker
    pub active: u64,
    /// Tasks that finished successfully
    pub completed: u64,
    /// Tasks that failed or were cancelled while running
    pub failed: u64,
    /// Page bytes written to disk
    pub bytes_downloaded: u64,
    /// Retry attempts across all tasks
    pub retries: u64,
}

impl DownloadStats {
    /// A task entered the pending set
    pub(crate) fn record_enqueued(&mut self) {
        self.total += 1;
    }

    /// A pending task was dropped without reaching a terminal state
    pub(crate) fn record_discarded(&mut self, count: u64) {
        self.total = self.total.saturating_sub(count);
    }

    /// A worker took ownership of a task
    pub(crate) fn record_started(&mut self) {
        self.active += 1;
    }

    /// A worker gave a task back to the pending set (pause)
    pub(crate) fn record_released(&mut self) {
        self.active = self.active.saturating_sub(1);
    }

    /// A worker finished a task successfully
    pub(crate) fn record_completed(&mut self) {
        self.active = self.active.saturating_sub(1);
        self.completed += 1;
    }

    /// A worker finished a task with an error
    pub(crate) fn record_failed(&mut self) {
        self.active = self.active.saturating_sub(1);
        self.failed += 1;
    }

    /// Page bytes written
    pub(crate) fn record_bytes(&mut self, bytes: u64) {
        self.bytes_downloaded += bytes;
    }

    /// A failed attempt is about to be retried
    pub(crate) fn record_retry(&mut self) {
        self.retries += 1;
    }

    /// Tasks neither running nor finished
    pub fn pending(&self) -> u64 {
        self.total
            .saturating_sub(self.active + self.completed + self.failed)
    }

    /// Returns true if the counters satisfy `active + completed + failed <= total`
    pub fn is_consistent(&self) -> bool {
        self.active + self.completed + self.failed <= self.total
    }
}
