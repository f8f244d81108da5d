//! Queue control: cancel, start/stop, pause/resume, priority, list clearing.

use std::sync::atomic::Ordering;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::types::{Event, Priority, Status, TaskId};

use super::{DownloadQueue, PoolHandle, QueuedDownload};

impl DownloadQueue {
    /// Cancel a chapter download
    ///
    /// A pending task is removed outright and never runs. An active task has
    /// its cancellation token fired and leaves the active set immediately; its
    /// worker finalizes it as `Failed` with a cancellation error once it
    /// observes the signal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no pending or active task exists for the chapter.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use manga_dl::*;
    /// # async fn example(queue: DownloadQueue) -> Result<()> {
    /// queue.cancel("chapter-42").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn cancel(&self, chapter_id: &str) -> Result<()> {
        let (id, was_active) = {
            let mut inner = self.state.inner.write().await;
            let id = inner
                .chapters
                .get(chapter_id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("chapter {chapter_id}")))?;

            if inner.active.contains(&id) {
                inner.cancel_active(&id);
                (id, true)
            } else {
                inner.remove_pending(&id);
                (id, false)
            }
        };

        tracing::info!(task_id = %id, was_active, "Download cancelled");
        self.emit_event(Event::Removed { id });
        Ok(())
    }

    /// Start admitting work
    ///
    /// Spawns the dispatch loop; pending tasks (including those left over from
    /// a previous [`stop`](Self::stop)) begin dispatching. Calling `start` on a
    /// running queue is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown).
    pub async fn start(&self) -> Result<()> {
        if !self.state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let mut pool = self.state.pool.lock().await;
        if pool.is_some() {
            return Ok(());
        }

        tracing::info!("Download queue started");
        self.emit_event(Event::QueueStarted);

        let token = CancellationToken::new();
        let dispatcher = self.start_queue_processor(token.clone());
        *pool = Some(PoolHandle { token, dispatcher });
        Ok(())
    }

    /// Stop admitting work
    ///
    /// Cancels every active task and clears the active set. Pending tasks stay
    /// queued so a later [`start`](Self::start) resumes them.
    pub async fn stop(&self) {
        let Some(handle) = self.state.pool.lock().await.take() else {
            return;
        };

        // Cancels every worker token, all of which are children of the pool token
        handle.token.cancel();

        let cancelled = {
            let mut inner = self.state.inner.write().await;
            let ids: Vec<TaskId> = inner.active.iter().cloned().collect();
            for id in &ids {
                inner.cancel_active(id);
            }
            ids
        };

        if let Err(e) = handle.dispatcher.await {
            tracing::warn!(error = %e, "Dispatch loop ended abnormally");
        }

        tracing::info!(cancelled = cancelled.len(), "Download queue stopped");
        for id in cancelled {
            self.emit_event(Event::Removed { id });
        }
        self.emit_event(Event::QueueStopped);
    }

    /// Pull every active task back into the pending set and halt dispatch
    ///
    /// Active tasks are cancelled, marked [`Status::Paused`] and reinserted
    /// with their original priority and creation time, so they dispatch ahead
    /// of later tasks of the same priority once resumed.
    pub async fn pause(&self) {
        self.state.paused.store(true, Ordering::SeqCst);

        let paused = {
            let mut inner = self.state.inner.write().await;
            let ids: Vec<TaskId> = inner.active.iter().cloned().collect();
            for id in &ids {
                let Some(task) = inner.tasks.get_mut(id) else {
                    continue;
                };
                if let Some(token) = task.cancel_token.take() {
                    token.cancel();
                }
                // The worker no longer owns the task once its run is cleared
                task.run = None;
                task.status = Status::Paused;
                let key = QueuedDownload::for_task(task);

                inner.pending.insert(key);
                inner.active.remove(id);
                inner.stats.record_released();
            }
            ids.len()
        };

        tracing::info!(paused, "Download queue paused");
        self.emit_event(Event::QueuePaused);
    }

    /// Flip every paused task back to queued and resume dispatch
    pub async fn resume(&self) {
        let resumed = {
            let mut inner = self.state.inner.write().await;
            let mut resumed = 0usize;
            for task in inner.tasks.values_mut() {
                if task.status == Status::Paused {
                    task.status = Status::Queued;
                    resumed += 1;
                }
            }
            resumed
        };

        self.state.paused.store(false, Ordering::SeqCst);
        self.state.wake.notify_one();

        tracing::info!(resumed, "Download queue resumed");
        self.emit_event(Event::QueueResumed);
    }

    /// Change the priority of a pending or active task
    ///
    /// A pending task is re-sorted immediately; an active task only records
    /// the new value, which applies if it is ever paused and re-queued.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no pending or active task exists for the chapter.
    pub async fn set_priority(&self, chapter_id: &str, priority: Priority) -> Result<()> {
        let mut inner = self.state.inner.write().await;
        let id = inner
            .chapters
            .get(chapter_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("chapter {chapter_id}")))?;

        let old_key = inner.tasks.get(&id).map(QueuedDownload::for_task);
        let was_pending = old_key.is_some_and(|key| inner.pending.remove(&key));

        if let Some(task) = inner.tasks.get_mut(&id) {
            task.priority = priority;
            let key = QueuedDownload::for_task(task);
            if was_pending {
                inner.pending.insert(key);
            }
        }

        tracing::debug!(task_id = %id, priority, was_pending, "Priority updated");
        Ok(())
    }

    /// Re-queue the most recent failed task for a chapter as a fresh task
    ///
    /// The new task gets a new identity and a retry count of zero; the failed
    /// record leaves the failed list.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the failed list holds no task for the chapter
    /// - [`Error::DuplicateTask`] if the chapter has been queued again meanwhile
    /// - [`Error::ShuttingDown`] once shutdown has started
    pub async fn retry_failed(&self, chapter_id: &str) -> Result<TaskId> {
        if !self.state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let (id, priority) = {
            let mut inner = self.state.inner.write().await;
            let position = inner
                .failed
                .iter()
                .rposition(|task| task.chapter.id == chapter_id)
                .ok_or_else(|| Error::NotFound(format!("failed chapter {chapter_id}")))?;

            let failed = &inner.failed[position];
            let (item, chapter, priority) =
                (failed.item.clone(), failed.chapter.clone(), failed.priority);

            let id = inner.insert_pending(item, chapter, priority)?;
            inner.failed.remove(position);
            (id, priority)
        };

        tracing::info!(task_id = %id, "Failed chapter re-queued");
        self.emit_event(Event::Queued {
            id: id.clone(),
            priority,
        });
        self.state.wake.notify_one();
        Ok(id)
    }

    /// Drop the completed list, returning how many entries were removed
    pub async fn clear_completed(&self) -> usize {
        let mut inner = self.state.inner.write().await;
        let cleared = inner.completed.len();
        inner.completed.clear();
        cleared
    }

    /// Drop the failed list, returning how many entries were removed
    pub async fn clear_failed(&self) -> usize {
        let mut inner = self.state.inner.write().await;
        let cleared = inner.failed.len();
        inner.failed.clear();
        cleared
    }

    /// Returns true while the pool admits work
    pub async fn is_running(&self) -> bool {
        self.state.pool.lock().await.is_some()
    }

    /// Returns true while dispatch is halted by [`pause`](Self::pause)
    pub fn is_paused(&self) -> bool {
        self.state.paused.load(Ordering::SeqCst)
    }
}
