//! Enqueueing and the pending priority index.

use std::sync::atomic::Ordering;

use crate::error::{Error, Result};
use crate::source::{Chapter, Item};
use crate::stats::DownloadStats;
use crate::types::{DownloadTask, Event, Priority, TaskId};

use super::{DownloadQueue, QueueInner, QueuedDownload};

impl QueueInner {
    /// Insert a new task into the pending set
    ///
    /// Rejects the chapter if it is already pending or active.
    pub(crate) fn insert_pending(
        &mut self,
        item: Item,
        chapter: Chapter,
        priority: Priority,
    ) -> Result<TaskId> {
        if self.chapters.contains_key(&chapter.id) {
            return Err(Error::DuplicateTask {
                chapter_id: chapter.id,
            });
        }

        let created_at = self.next_created_at();
        let task = DownloadTask::new(item, chapter, priority, created_at);
        let id = task.id.clone();

        self.pending.insert(QueuedDownload::for_task(&task));
        self.chapters.insert(task.chapter.id.clone(), id.clone());
        self.tasks.insert(id.clone(), task);
        self.stats.record_enqueued();

        Ok(id)
    }

    /// Remove a pending task without it ever running
    pub(crate) fn remove_pending(&mut self, id: &TaskId) -> Option<DownloadTask> {
        let task = self.tasks.remove(id)?;
        self.pending.remove(&QueuedDownload::for_task(&task));
        if self.chapters.get(&task.chapter.id) == Some(id) {
            self.chapters.remove(&task.chapter.id);
        }
        self.stats.record_discarded(1);
        Some(task)
    }
}

impl DownloadQueue {
    /// Add a chapter download to the pending set
    ///
    /// Tasks are dispatched by ascending priority, first-in first-out among
    /// equal priorities.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateTask`] if the chapter is already queued or downloading
    /// - [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has started
    pub async fn enqueue(&self, item: Item, chapter: Chapter, priority: Priority) -> Result<TaskId> {
        if !self.state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let id = {
            let mut inner = self.state.inner.write().await;
            inner.insert_pending(item, chapter, priority)?
        };

        tracing::info!(task_id = %id, priority, "Chapter queued");
        self.emit_event(Event::Queued {
            id: id.clone(),
            priority,
        });
        self.state.wake.notify_one();

        Ok(id)
    }

    /// Pending tasks in dispatch order
    pub async fn queue(&self) -> Vec<DownloadTask> {
        let inner = self.state.inner.read().await;
        inner
            .pending
            .iter()
            .filter_map(|entry| inner.tasks.get(&entry.id))
            .map(DownloadTask::snapshot)
            .collect()
    }

    /// Tasks currently owned by a worker
    pub async fn active(&self) -> Vec<DownloadTask> {
        let inner = self.state.inner.read().await;
        inner
            .active
            .iter()
            .filter_map(|id| inner.tasks.get(id))
            .map(DownloadTask::snapshot)
            .collect()
    }

    /// Successfully finished tasks, oldest first
    pub async fn completed(&self) -> Vec<DownloadTask> {
        self.state.inner.read().await.completed.clone()
    }

    /// Failed or cancelled tasks, oldest first
    pub async fn failed(&self) -> Vec<DownloadTask> {
        self.state.inner.read().await.failed.clone()
    }

    /// Aggregate counters
    pub async fn stats(&self) -> DownloadStats {
        self.state.inner.read().await.stats
    }

    /// Look up the pending or active task for a chapter
    pub async fn get(&self, chapter_id: &str) -> Option<DownloadTask> {
        let inner = self.state.inner.read().await;
        inner
            .chapters
            .get(chapter_id)
            .and_then(|id| inner.tasks.get(id))
            .map(DownloadTask::snapshot)
    }
}
