//! Download task context: shared state and the bookkeeping a worker performs on its task.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::retry::duration_millis;
use crate::source::{Chapter, Item};
use crate::types::{DownloadTask, Event, Status, TaskId};

use super::super::{DownloadQueue, QueueInner};

/// Shared context for a single download task, reducing parameter passing between helpers.
///
/// A worker only writes to its task while it still owns it: pausing the queue
/// hands the task back to the pending set by clearing its `run`, after which
/// every update from the old worker is dropped.
pub(crate) struct DownloadTaskContext {
    pub(crate) id: TaskId,
    /// Dispatch generation this worker was spawned for
    pub(crate) run: u64,
    pub(crate) item: Item,
    pub(crate) chapter: Chapter,
    pub(crate) retry_count: u32,
    pub(crate) cancel_token: CancellationToken,
    pub(crate) queue: DownloadQueue,
}

/// Terminal outcome handed to callbacks and events after the lock is released
///
/// Callbacks run before the matching event is broadcast.
enum Finished {
    Completed(DownloadTask),
    Failed(DownloadTask, Error),
}

impl DownloadTaskContext {
    fn owned_task<'a>(&self, inner: &'a mut QueueInner) -> Option<&'a mut DownloadTask> {
        inner
            .tasks
            .get_mut(&self.id)
            .filter(|task| task.run == Some(self.run))
    }

    /// Reset per-attempt counters once the page list is known
    pub(super) async fn begin_attempt(&self, total_pages: usize, destination: &Path) {
        let mut inner = self.queue.state.inner.write().await;
        if let Some(task) = self.owned_task(&mut inner) {
            task.current_page = 0;
            task.bytes_downloaded = 0;
            task.total_pages = total_pages;
            task.destination = Some(destination.to_path_buf());
        }
    }

    /// Record a written page and notify observers
    pub(super) async fn record_page(&self, current_page: usize, bytes: u64) {
        let snapshot = {
            let mut guard = self.queue.state.inner.write().await;
            let inner = &mut *guard;
            let Some(task) = self.owned_task(inner) else {
                return;
            };
            task.current_page = current_page;
            task.bytes_downloaded += bytes;
            let snapshot = task.snapshot();
            inner.stats.record_bytes(bytes);
            snapshot
        };

        if let Some(on_progress) = self.queue.callbacks().await.on_progress {
            on_progress(&snapshot);
        }
        self.queue.emit_event(Event::Progress {
            id: self.id.clone(),
            current_page: snapshot.current_page,
            total_pages: snapshot.total_pages,
            bytes_downloaded: snapshot.bytes_downloaded,
        });
    }

    /// Count a retry on the task
    ///
    /// Returns false if the task was taken back from this worker meanwhile.
    pub(super) async fn record_retry(&mut self, error: &Error, delay: Duration) -> bool {
        {
            let mut guard = self.queue.state.inner.write().await;
            let inner = &mut *guard;
            let retry_count = self.retry_count + 1;
            let Some(task) = self.owned_task(inner) else {
                return false;
            };
            task.retry_count = retry_count;
            task.error = Some(error.to_string());
            task.error_kind = Some(error.kind());
            inner.stats.record_retry();
            self.retry_count = retry_count;
        }

        let delay_ms = duration_millis(delay);
        tracing::warn!(
            task_id = %self.id,
            attempt = self.retry_count,
            delay_ms,
            error = %error,
            "Download attempt failed, retrying"
        );
        self.queue.emit_event(Event::Retrying {
            id: self.id.clone(),
            attempt: self.retry_count,
            delay_ms,
            error: error.to_string(),
        });
        true
    }

    /// Move the task to the completed or failed list if this worker still owns it
    ///
    /// A task whose token was cancelled always finishes as failed with
    /// [`Error::Cancelled`], even if its last page landed first. The worker slot
    /// itself is released by the supervisor once the worker future returns.
    pub(super) async fn finish(self, outcome: Result<PathBuf>) {
        let outcome = if self.cancel_token.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            outcome
        };
        self.queue.settle_task(&self.id, self.run, outcome).await;
    }
}

impl DownloadQueue {
    /// Finalize the task dispatched as `run`, then run callbacks and broadcast
    ///
    /// Does nothing beyond a debug log when the task was already taken back by
    /// pause, cancel or an earlier settle.
    pub(crate) async fn settle_task(&self, id: &TaskId, run: u64, outcome: Result<PathBuf>) {
        let finished = {
            let mut guard = self.state.inner.write().await;
            let inner = &mut *guard;

            let owned = inner
                .tasks
                .get(id)
                .is_some_and(|task| task.run == Some(run));
            if owned {
                inner.tasks.remove(id).map(|mut task| {
                    inner.active.remove(id);
                    if inner.chapters.get(&task.chapter.id) == Some(id) {
                        inner.chapters.remove(&task.chapter.id);
                    }

                    task.cancel_token = None;
                    task.run = None;
                    task.completed_at = Some(Utc::now());

                    match outcome {
                        Ok(path) => {
                            task.status = Status::Completed;
                            task.destination = Some(path);
                            task.error = None;
                            task.error_kind = None;
                            inner.completed.push(task.clone());
                            inner.stats.record_completed();
                            Finished::Completed(task)
                        }
                        Err(e) => {
                            task.status = Status::Failed;
                            task.error = Some(e.to_string());
                            task.error_kind = Some(e.kind());
                            inner.failed.push(task.clone());
                            inner.stats.record_failed();
                            Finished::Failed(task, e)
                        }
                    }
                })
            } else {
                None
            }
        };

        let callbacks = self.callbacks().await;
        match finished {
            Some(Finished::Completed(task)) => {
                let path = task.destination.clone().unwrap_or_default();
                tracing::info!(
                    task_id = %id,
                    pages = task.total_pages,
                    bytes = task.bytes_downloaded,
                    retries = task.retry_count,
                    "Download complete"
                );
                if let Some(on_complete) = callbacks.on_complete {
                    on_complete(&task);
                }
                self.emit_event(Event::Completed {
                    id: id.clone(),
                    path,
                });
            }
            Some(Finished::Failed(task, error)) => {
                if error.is_cancelled() {
                    tracing::info!(task_id = %id, "Download cancelled by request");
                } else {
                    tracing::error!(
                        task_id = %id,
                        current_page = task.current_page,
                        retries = task.retry_count,
                        error = %error,
                        "Download failed"
                    );
                }
                if let Some(on_error) = callbacks.on_error {
                    on_error(&task, &error);
                }
                self.emit_event(Event::Failed {
                    id: id.clone(),
                    error: error.to_string(),
                    kind: error.kind(),
                });
            }
            None => {
                tracing::debug!(task_id = %id, "Worker released a task it no longer owns");
            }
        }
    }
}
