//! Queue processor: promotes pending tasks to workers under the concurrency ceiling.

use std::sync::atomic::Ordering;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::types::{Event, Status, TaskId};

use super::DownloadQueue;
use super::download_task::{DownloadTaskContext, run_download_task};

impl DownloadQueue {
    /// Start the dispatch loop
    ///
    /// The loop runs until `pool_token` is cancelled. Each iteration:
    /// 1. Checks that dispatch is not paused and a worker slot is free
    /// 2. Pops the highest-priority pending task (FIFO among equal priorities)
    /// 3. Promotes it to `Downloading` and spawns its worker
    ///
    /// When nothing can be dispatched it waits for a wake-up (enqueue, resume,
    /// worker exit) or for `poll_interval` to elapse, whichever comes first.
    pub(crate) fn start_queue_processor(
        &self,
        pool_token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let queue = self.clone();
        let poll_interval = self.config.poll_interval;

        tokio::spawn(async move {
            tracing::info!("Dispatch loop started");

            loop {
                if pool_token.is_cancelled() {
                    break;
                }

                if let Some(ctx) = queue.dispatch_next(&pool_token).await {
                    let id = ctx.id.clone();
                    tracing::debug!(task_id = %id, "Dispatching download");
                    queue.emit_event(Event::Started { id });
                    queue.spawn_worker(ctx);
                    continue;
                }

                tokio::select! {
                    _ = pool_token.cancelled() => break,
                    _ = queue.state.wake.notified() => {}
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }

            tracing::info!("Dispatch loop stopped");
        })
    }

    /// Run a worker alongside a supervisor that frees its slot when it exits
    ///
    /// A worker that panics never reaches its own bookkeeping, so the
    /// supervisor fails the task on its behalf before releasing the slot.
    fn spawn_worker(&self, ctx: DownloadTaskContext) {
        let queue = self.clone();
        let id = ctx.id.clone();
        let run = ctx.run;
        let worker = tokio::spawn(run_download_task(ctx));

        tokio::spawn(async move {
            match worker.await {
                Ok(()) => {}
                Err(e) if e.is_panic() => {
                    let message = panic_message(e.into_panic());
                    tracing::error!(task_id = %id, panic = %message, "Download worker panicked");
                    let error = Error::Other(format!("download worker panicked: {message}"));
                    queue.settle_task(&id, run, Err(error)).await;
                }
                Err(e) => {
                    tracing::warn!(task_id = %id, error = %e, "Download worker aborted");
                    queue.settle_task(&id, run, Err(Error::Cancelled)).await;
                }
            }
            queue.release_worker().await;
        });
    }

    async fn release_worker(&self) {
        {
            let mut inner = self.state.inner.write().await;
            inner.workers = inner.workers.saturating_sub(1);
        }
        self.state.wake.notify_one();
    }

    /// Promote the next pending task if a slot is free
    ///
    /// Runs entirely under the queue lock so the admission check and the
    /// promotion are atomic with respect to enqueue, cancel and pause.
    async fn dispatch_next(&self, pool_token: &CancellationToken) -> Option<DownloadTaskContext> {
        if self.state.paused.load(Ordering::SeqCst) {
            return None;
        }

        let mut inner = self.state.inner.write().await;
        if pool_token.is_cancelled() || self.state.paused.load(Ordering::SeqCst) {
            return None;
        }
        if inner.workers >= self.config.max_concurrent_downloads {
            return None;
        }

        let entry = inner.pending.pop_first()?;
        let id: TaskId = entry.id;

        let run = inner.next_run;
        inner.next_run += 1;

        let cancel_token = pool_token.child_token();
        let task = inner.tasks.get_mut(&id)?;
        task.status = Status::Downloading;
        task.started_at = Some(Utc::now());
        task.cancel_token = Some(cancel_token.clone());
        task.run = Some(run);

        let ctx = DownloadTaskContext {
            id: id.clone(),
            run,
            item: task.item.clone(),
            chapter: task.chapter.clone(),
            retry_count: task.retry_count,
            cancel_token,
            queue: self.clone(),
        };

        inner.active.insert(id);
        inner.workers += 1;
        inner.stats.record_started();

        Some(ctx)
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
