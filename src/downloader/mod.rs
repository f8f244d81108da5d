//! Chapter download queue and worker pool, split into focused submodules.
//!
//! The `DownloadQueue` struct and its methods are organized by domain:
//! - [`queue`] - Enqueueing, the pending priority index and snapshot accessors
//! - [`control`] - Cancel, start/stop, pause/resume, priority and list clearing
//! - [`queue_processor`] - Dispatch loop that promotes pending tasks to workers
//! - [`lifecycle`] - Graceful shutdown
//! - [`download_task`] - Per-task worker: retries, page loop, destination paths

mod control;
mod download_task;
mod lifecycle;
mod queue;
mod queue_processor;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use download_task::{chapter_dir, page_extension, sanitize_filename};

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::sync::{Mutex, Notify, RwLock, broadcast};
use tokio_util::sync::CancellationToken;

use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::source::ContentSource;
use crate::stats::DownloadStats;
use crate::types::{DownloadTask, Event, Priority, TaskId};

/// Callback invoked with a snapshot of the task after every written page
pub type ProgressCallback = Arc<dyn Fn(&DownloadTask) + Send + Sync>;

/// Callback invoked with a snapshot of the task once it completes
pub type CompleteCallback = Arc<dyn Fn(&DownloadTask) + Send + Sync>;

/// Callback invoked with a snapshot of the task and the error once it fails
pub type ErrorCallback = Arc<dyn Fn(&DownloadTask, &Error) + Send + Sync>;

/// Callbacks invoked from worker tasks
///
/// Callbacks run on whichever tokio task produced the state change and are
/// never called while the queue lock is held. They must not block.
#[derive(Clone, Default)]
pub struct DownloadCallbacks {
    /// Page written
    pub on_progress: Option<ProgressCallback>,
    /// Task completed
    pub on_complete: Option<CompleteCallback>,
    /// Task failed or was cancelled
    pub on_error: Option<ErrorCallback>,
}

/// Entry of the pending index, ordered by priority then creation time
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct QueuedDownload {
    pub(crate) priority: Priority,
    pub(crate) created_at: i64,
    pub(crate) id: TaskId,
}

impl QueuedDownload {
    pub(crate) fn for_task(task: &DownloadTask) -> Self {
        Self {
            priority: task.priority,
            created_at: task.id.created_at,
            id: task.id.clone(),
        }
    }
}

/// Task arena and bookkeeping guarded by a single lock
///
/// `tasks` holds every task that is pending, active or owned by a worker that
/// has not yet finalized it. `pending` and `active` are indexes into it.
#[derive(Default)]
pub(crate) struct QueueInner {
    pub(crate) tasks: HashMap<TaskId, DownloadTask>,
    pub(crate) pending: BTreeSet<QueuedDownload>,
    pub(crate) active: BTreeSet<TaskId>,
    /// Chapter id -> task, for every pending or active task
    pub(crate) chapters: HashMap<String, TaskId>,
    pub(crate) completed: Vec<DownloadTask>,
    pub(crate) failed: Vec<DownloadTask>,
    pub(crate) stats: DownloadStats,
    /// Running workers, including cancelled ones still winding down
    pub(crate) workers: usize,
    pub(crate) last_created: i64,
    pub(crate) next_run: u64,
}

impl QueueInner {
    /// Hand out a creation timestamp strictly greater than every previous one
    pub(crate) fn next_created_at(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_micros();
        self.last_created = now.max(self.last_created + 1);
        self.last_created
    }

    /// Detach an active task from the active set and chapter index
    ///
    /// The worker keeps ownership and finalizes the task as failed once it
    /// observes the cancellation.
    pub(crate) fn cancel_active(&mut self, id: &TaskId) {
        if let Some(task) = self.tasks.get(id) {
            if let Some(token) = &task.cancel_token {
                token.cancel();
            }
            if self.chapters.get(&task.chapter.id) == Some(id) {
                self.chapters.remove(&task.chapter.id);
            }
        }
        self.active.remove(id);
    }
}

/// Pool lifetime context owned by a started queue
pub(crate) struct PoolHandle {
    /// Parent of every worker's cancellation token
    pub(crate) token: CancellationToken,
    pub(crate) dispatcher: tokio::task::JoinHandle<()>,
}

/// Queue and pool state management
#[derive(Clone)]
pub(crate) struct QueueState {
    pub(crate) inner: Arc<RwLock<QueueInner>>,
    /// Dispatch halted by `pause()`
    pub(crate) paused: Arc<AtomicBool>,
    /// Flag to indicate whether new tasks are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Signaled on enqueue, resume and worker exit
    pub(crate) wake: Arc<Notify>,
    /// Present while the pool is started
    pub(crate) pool: Arc<Mutex<Option<PoolHandle>>>,
}

/// Bounded-concurrency chapter download queue (cloneable, all fields are Arc-wrapped)
#[derive(Clone)]
pub struct DownloadQueue {
    pub(crate) config: Arc<DownloadConfig>,
    pub(crate) source: Arc<dyn ContentSource>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) callbacks: Arc<RwLock<DownloadCallbacks>>,
    pub(crate) state: QueueState,
}

impl DownloadQueue {
    /// Create a stopped queue
    ///
    /// Tasks may be enqueued right away; nothing is dispatched until
    /// [`start`](Self::start) is called.
    pub fn new(config: DownloadConfig, source: Arc<dyn ContentSource>) -> Result<Self> {
        config.validate()?;

        // Buffer of 1000 events per subscriber before lagging
        let (event_tx, _rx) = broadcast::channel(1000);

        tracing::info!(
            download_dir = %config.download_dir.display(),
            max_concurrent = config.max_concurrent_downloads,
            max_retries = config.retry.max_retries,
            "Download queue created"
        );

        Ok(Self {
            config: Arc::new(config),
            source,
            event_tx,
            callbacks: Arc::new(RwLock::new(DownloadCallbacks::default())),
            state: QueueState {
                inner: Arc::new(RwLock::new(QueueInner::default())),
                paused: Arc::new(AtomicBool::new(false)),
                accepting_new: Arc::new(AtomicBool::new(true)),
                wake: Arc::new(Notify::new()),
                pool: Arc::new(Mutex::new(None)),
            },
        })
    }

    /// Subscribe to queue events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than 1000 events receives
    /// `RecvError::Lagged` and skips ahead.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use manga_dl::DownloadQueue;
    /// # fn example(queue: DownloadQueue) {
    /// let mut events = queue.subscribe();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         tracing::info!(?event, "download event");
    ///     }
    /// });
    /// # }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Queue events as a `Stream`, for consumers draining them on their own schedule
    ///
    /// Lagged positions surface as `Err` items instead of ending the stream.
    pub fn events(&self) -> tokio_stream::wrappers::BroadcastStream<Event> {
        tokio_stream::wrappers::BroadcastStream::new(self.event_tx.subscribe())
    }

    /// Replace the registered callbacks
    pub async fn set_callbacks(&self, callbacks: DownloadCallbacks) {
        *self.callbacks.write().await = callbacks;
    }

    /// Get the queue configuration
    pub fn config(&self) -> Arc<DownloadConfig> {
        Arc::clone(&self.config)
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine
        self.event_tx.send(event).ok();
    }

    /// Copy of the registered callbacks, taken so they can run without the lock
    pub(crate) async fn callbacks(&self) -> DownloadCallbacks {
        self.callbacks.read().await.clone()
    }
}
