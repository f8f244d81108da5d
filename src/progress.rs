//! Reading-progress persistence that never fails the caller.
//!
//! Saving the reading position happens on the read and exit paths, which must
//! not block or error because a store write failed. [`ProgressRecorder`] logs
//! the failure and counts it so aggregate failure rates stay observable.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::store::ProgressStore;

/// Swallow-and-count wrapper around a [`ProgressStore`]
pub struct ProgressRecorder {
    store: Arc<dyn ProgressStore>,
    saved: AtomicU64,
    failures: AtomicU64,
}

impl ProgressRecorder {
    /// Wrap a progress store
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self {
            store,
            saved: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Save a reading position, returning whether the write succeeded
    pub async fn record(
        &self,
        item_id: &str,
        item_title: &str,
        chapter_id: &str,
        current_page: usize,
        total_pages: usize,
    ) -> bool {
        match self
            .store
            .update_progress(item_id, item_title, chapter_id, current_page, total_pages)
            .await
        {
            Ok(()) => {
                self.saved.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    item_id,
                    chapter_id,
                    current_page,
                    error = %e,
                    "Failed to save reading progress"
                );
                false
            }
        }
    }

    /// Successful saves so far
    pub fn saved(&self) -> u64 {
        self.saved.load(Ordering::Relaxed)
    }

    /// Swallowed failures so far
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
