//! Periodic library update checks, split into focused submodules.
//!
//! The `LibraryUpdater` struct and its methods are organized by domain:
//! - [`check`] - One update run: enumeration, bounded fan-out and aggregation
//! - [`filter`] - Candidate selection before the fan-out
//! - [`scheduler`] - Background loop firing a run on a fixed interval
//!
//! Every run produces an [`UpdateSummary`] that is kept in a bounded history.
//! Items that gained chapters raise a notification as soon as their check
//! finishes; a run that found anything raises one more when it ends.

mod check;
mod filter;
mod scheduler;


use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::sync::{Mutex, RwLock, broadcast};

use crate::config::UpdateConfig;
use crate::error::{Error, Result};
use crate::notifications::NotificationLog;
use crate::ring::RingBuffer;
use crate::source::ContentSource;
use crate::store::LibraryStore;
use crate::types::{Event, Notification, NotificationKind, UpdateSummary, UpdateTask};

/// Callback invoked with each finished item check
pub type CheckCallback = Arc<dyn Fn(&UpdateTask) + Send + Sync>;

/// Callback invoked with the summary of a finished run
pub type SummaryCallback = Arc<dyn Fn(&UpdateSummary) + Send + Sync>;

/// Callback invoked with every notification appended to the log
pub type NotificationCallback = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Callbacks invoked from update checks
///
/// Like the download callbacks these run on the check's tokio task, outside
/// the updater lock, and must not block.
#[derive(Clone, Default)]
pub struct UpdateCallbacks {
    /// Item check finished
    pub on_progress: Option<CheckCallback>,
    /// Run finished
    pub on_complete: Option<SummaryCallback>,
    /// Notification appended
    pub on_notification: Option<NotificationCallback>,
}

/// Summaries and notifications guarded by a single lock
pub(crate) struct UpdaterInner {
    /// Run in progress, or the last finished one
    pub(crate) current: Option<UpdateSummary>,
    pub(crate) history: RingBuffer<UpdateSummary>,
    pub(crate) notifications: NotificationLog,
}

/// Periodic checker for new chapters across the library (cloneable, all fields are Arc-wrapped)
#[derive(Clone)]
pub struct LibraryUpdater {
    pub(crate) config: Arc<UpdateConfig>,
    pub(crate) source: Arc<dyn ContentSource>,
    pub(crate) store: Arc<dyn LibraryStore>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) callbacks: Arc<RwLock<UpdateCallbacks>>,
    pub(crate) inner: Arc<RwLock<UpdaterInner>>,
    /// Held for the duration of a run so runs never overlap
    pub(crate) run_lock: Arc<Mutex<()>>,
    /// Cleared by `shutdown()`
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Present while the background loop is running
    pub(crate) schedule: Arc<Mutex<Option<scheduler::ScheduleHandle>>>,
}

impl LibraryUpdater {
    /// Create an idle updater
    ///
    /// Runs happen on demand through [`update_library`](Self::update_library)
    /// until [`start`](Self::start) enables the background loop.
    pub fn new(
        config: UpdateConfig,
        source: Arc<dyn ContentSource>,
        store: Arc<dyn LibraryStore>,
    ) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(1000);

        tracing::info!(
            interval_secs = config.interval.as_secs(),
            max_concurrent_checks = config.max_concurrent_checks,
            only_with_history = config.only_with_history,
            only_completed = config.only_completed,
            "Library updater created"
        );

        let inner = UpdaterInner {
            current: None,
            history: RingBuffer::new(config.history_capacity),
            notifications: NotificationLog::new(config.notification_capacity),
        };

        Ok(Self {
            config: Arc::new(config),
            source,
            store,
            event_tx,
            callbacks: Arc::new(RwLock::new(UpdateCallbacks::default())),
            inner: Arc::new(RwLock::new(inner)),
            run_lock: Arc::new(Mutex::new(())),
            accepting_new: Arc::new(AtomicBool::new(true)),
            schedule: Arc::new(Mutex::new(None)),
        })
    }

    /// Subscribe to update events
    ///
    /// Each subscriber receives every event; one that falls more than 1000
    /// events behind receives `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Update events as a `Stream`
    pub fn events(&self) -> tokio_stream::wrappers::BroadcastStream<Event> {
        tokio_stream::wrappers::BroadcastStream::new(self.event_tx.subscribe())
    }

    /// Replace the registered callbacks
    pub async fn set_callbacks(&self, callbacks: UpdateCallbacks) {
        *self.callbacks.write().await = callbacks;
    }

    /// Get the updater configuration
    pub fn config(&self) -> Arc<UpdateConfig> {
        Arc::clone(&self.config)
    }

    /// Summary of the run in progress, or of the last finished run
    pub async fn current_summary(&self) -> Option<UpdateSummary> {
        self.inner.read().await.current.clone()
    }

    /// Finished runs, newest first
    pub async fn update_history(&self) -> Vec<UpdateSummary> {
        self.inner.read().await.history.to_vec_recent()
    }

    /// Notification log, newest first
    pub async fn notifications(&self) -> Vec<Notification> {
        self.inner.read().await.notifications.recent()
    }

    /// Mark one notification as read
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is unknown or already evicted.
    pub async fn mark_notification_read(&self, id: u64) -> Result<()> {
        if self.inner.write().await.notifications.mark_read(id) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("notification {id}")))
        }
    }

    /// Mark every notification as read, returning how many changed
    pub async fn mark_all_read(&self) -> usize {
        self.inner.write().await.notifications.mark_all_read()
    }

    /// Number of unread notifications
    pub async fn unread_count(&self) -> usize {
        self.inner.read().await.notifications.unread_count()
    }

    /// Drop every notification
    pub async fn clear_notifications(&self) {
        self.inner.write().await.notifications.clear();
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine
        self.event_tx.send(event).ok();
    }

    pub(crate) async fn callbacks(&self) -> UpdateCallbacks {
        self.callbacks.read().await.clone()
    }

    /// Append a notification unless notifications are disabled
    pub(crate) async fn notify(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        item_id: Option<String>,
    ) {
        if !self.config.notifications_enabled {
            return;
        }

        let notification = self
            .inner
            .write()
            .await
            .notifications
            .push(kind, title, message, item_id);

        tracing::debug!(
            id = notification.id,
            kind = ?notification.kind,
            title = %notification.title,
            "Notification added"
        );

        if let Some(on_notification) = self.callbacks().await.on_notification {
            on_notification(&notification);
        }
        self.emit_event(Event::Notification { notification });
    }
}
