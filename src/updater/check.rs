//! Update runs: enumerate the library, check candidates under a semaphore and
//! fold the outcomes into the running summary.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{Error, Result};
use crate::source::Item;
use crate::types::{Event, NotificationKind, UpdateStatus, UpdateSummary, UpdateTask};

use super::LibraryUpdater;
use super::filter::select_candidates;

/// Result of a single item check before it is folded into the summary
struct CheckOutcome {
    task: UpdateTask,
    /// The new chapter count could not be written back
    tracking_failed: bool,
}

impl LibraryUpdater {
    /// Check every candidate item once and return the finished summary
    ///
    /// A failing item only fails its own [`UpdateTask`]. Runs never overlap:
    /// a call made while another run is in progress waits for it to finish.
    ///
    /// # Errors
    ///
    /// - [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown)
    /// - [`Error::SourceUnavailable`] or the source's own error if the library
    ///   cannot be enumerated
    pub async fn update_library(&self) -> Result<UpdateSummary> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        let _run = self.run_lock.lock().await;

        let items = match self.enumerate_library().await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(error = %e, "Library update failed to enumerate items");
                self.notify(
                    NotificationKind::UpdateFailed,
                    "Library update failed",
                    e.to_string(),
                    None,
                )
                .await;
                return Err(e);
            }
        };

        let enumerated = items.len();
        let candidates = select_candidates(items, &self.config, self.store.as_ref()).await;
        let total = candidates.len();

        self.inner.write().await.current = Some(UpdateSummary::new(total));
        tracing::info!(
            enumerated,
            candidates = total,
            max_concurrent = self.config.max_concurrent_checks,
            "Library update started"
        );
        self.emit_event(Event::UpdateStarted { total_manga: total });

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_checks));
        let mut checks = JoinSet::new();
        for item in candidates {
            let updater = self.clone();
            let semaphore = Arc::clone(&semaphore);
            checks.spawn(async move {
                // The semaphore is never closed
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let outcome = updater.check_item(item).await;
                updater.record_outcome(outcome).await;
            });
        }

        while let Some(joined) = checks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Update check task panicked");
            }
        }

        Ok(self.finish_run().await)
    }

    async fn enumerate_library(&self) -> Result<Vec<Item>> {
        if !self.source.is_available().await {
            return Err(Error::SourceUnavailable(
                "content source is not available".to_string(),
            ));
        }
        self.source.list_items().await
    }

    /// Compare the item's published chapter count with the tracked one
    async fn check_item(&self, item: Item) -> CheckOutcome {
        let mut task = UpdateTask::new(&item);
        task.status = UpdateStatus::Checking;
        task.started_at = Some(Utc::now());

        let mut tracking_failed = false;
        match self.fetch_counts(&item).await {
            Ok((tracked, published)) => {
                // First sighting: the current count becomes the baseline
                task.old_chapter_count = tracked.unwrap_or(published);
                task.new_chapter_count = published;
                task.status = UpdateStatus::Completed;

                if tracked != Some(published) {
                    if let Err(e) = self.store.set_tracking(&item.id, published).await {
                        tracing::warn!(
                            item_id = %item.id,
                            chapter_count = published,
                            error = %e,
                            "Failed to write back tracking data"
                        );
                        tracking_failed = true;
                    }
                }

                tracing::debug!(
                    item_id = %item.id,
                    old = task.old_chapter_count,
                    new = task.new_chapter_count,
                    "Item checked"
                );
            }
            Err(e) => {
                tracing::warn!(item_id = %item.id, error = %e, "Update check failed");
                task.status = UpdateStatus::Failed;
                task.error = Some(e.to_string());
            }
        }

        task.completed_at = Some(Utc::now());
        CheckOutcome {
            task,
            tracking_failed,
        }
    }

    /// Tracked and published chapter counts of an item
    async fn fetch_counts(&self, item: &Item) -> Result<(Option<usize>, usize)> {
        let current = self
            .source
            .get_item(&item.id)
            .await
            .map_err(|e| Error::SourceUnavailable(format!("lookup of {} failed: {e}", item.id)))?;

        let chapters = self.source.list_chapters(&current.id).await.map_err(|e| {
            Error::FetchFailed(format!("chapter list of {} failed: {e}", current.id))
        })?;

        let tracked = self.store.get_tracking(&item.id).await.map_err(|e| {
            Error::PersistenceFailed(format!("tracking data of {} unreadable: {e}", item.id))
        })?;

        Ok((tracked, chapters.len()))
    }

    /// Fold one outcome into the running summary and report it
    async fn record_outcome(&self, outcome: CheckOutcome) {
        let CheckOutcome {
            task,
            tracking_failed,
        } = outcome;

        {
            let mut inner = self.inner.write().await;
            if let Some(summary) = inner.current.as_mut() {
                if tracking_failed {
                    summary.tracking_failures += 1;
                }
                summary.record(task.clone());
            }
        }

        if let Some(on_progress) = self.callbacks().await.on_progress {
            on_progress(&task);
        }
        let failed = task.status == UpdateStatus::Failed;
        self.emit_event(Event::ItemChecked {
            item_id: task.item_id.clone(),
            new_chapters: if failed { 0 } else { task.new_chapters() },
            failed,
        });

        if !failed && task.has_new_chapters() {
            let count = task.new_chapters();
            self.notify(
                NotificationKind::NewChapter,
                format!("New chapters: {}", task.item_title),
                format!(
                    "{count} new chapter{} available",
                    if count == 1 { "" } else { "s" }
                ),
                Some(task.item_id.clone()),
            )
            .await;
        }
    }

    /// Seal the running summary and append it to the history
    async fn finish_run(&self) -> UpdateSummary {
        let summary = {
            let mut inner = self.inner.write().await;
            let mut summary = inner.current.take().unwrap_or_else(|| UpdateSummary::new(0));
            summary.completed_at = Some(Utc::now());
            inner.history.push(summary.clone());
            inner.current = Some(summary.clone());
            summary
        };

        tracing::info!(
            checked = summary.tasks.len(),
            updated = summary.updated_manga,
            failed = summary.failed_manga,
            new_chapters = summary.new_chapters,
            tracking_failures = summary.tracking_failures,
            "Library update complete"
        );

        if let Some(on_complete) = self.callbacks().await.on_complete {
            on_complete(&summary);
        }
        self.emit_event(Event::UpdateCompleted {
            updated_manga: summary.updated_manga,
            failed_manga: summary.failed_manga,
            new_chapters: summary.new_chapters,
        });

        if summary.new_chapters > 0 {
            self.notify(
                NotificationKind::UpdateComplete,
                "Library updated",
                format!(
                    "{} new chapters across {} series",
                    summary.new_chapters, summary.updated_manga
                ),
                None,
            )
            .await;
        }

        summary
    }
}
