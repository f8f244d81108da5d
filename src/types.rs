//! Core types for manga-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::error::ErrorKind;
use crate::source::{Chapter, Item};

/// Download priority; lower values are dispatched first
pub type Priority = i32;

/// Unique identifier for a download task
///
/// Composed of the content item id, the chapter id and the creation timestamp
/// (microseconds since the Unix epoch). The queue hands out strictly increasing
/// timestamps, so re-queueing the same chapter always yields a fresh identity.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId {
    /// Content item the chapter belongs to
    pub item_id: String,
    /// Chapter being downloaded
    pub chapter_id: String,
    /// Creation timestamp in microseconds
    pub created_at: i64,
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.item_id, self.chapter_id, self.created_at)
    }
}

/// Download status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting in the pending set for a worker slot
    Queued,
    /// Owned by a worker
    Downloading,
    /// Pulled back from a worker by `pause()`, waiting for `resume()`
    Paused,
    /// All pages written
    Completed,
    /// Aborted after exhausting retries, or cancelled
    Failed,
}

impl Status {
    /// Returns true for `Completed` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }
}

/// A queued, running or finished chapter download
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadTask {
    /// Task identity
    pub id: TaskId,
    /// Content item the chapter belongs to
    pub item: Item,
    /// Chapter being downloaded
    pub chapter: Chapter,
    /// Current lifecycle state
    pub status: Status,
    /// Dispatch priority (lower = more urgent)
    pub priority: Priority,
    /// Pages written in the current attempt
    pub current_page: usize,
    /// Pages in the chapter (0 until the page list is fetched)
    pub total_pages: usize,
    /// Bytes written in the current attempt
    pub bytes_downloaded: u64,
    /// Retries performed so far
    pub retry_count: u32,
    /// Error message of the last failure
    pub error: Option<String>,
    /// Classification of the last failure
    pub error_kind: Option<ErrorKind>,
    /// Directory the pages are written to (set when the worker starts)
    pub destination: Option<PathBuf>,
    /// When the task was enqueued
    pub created_at: DateTime<Utc>,
    /// When a worker last picked the task up
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
    /// Cancellation handle of the worker currently owning the task
    #[serde(skip)]
    pub(crate) cancel_token: Option<CancellationToken>,
    /// Dispatch generation of the worker currently owning the task
    #[serde(skip)]
    pub(crate) run: Option<u64>,
}

impl DownloadTask {
    pub(crate) fn new(
        item: Item,
        chapter: Chapter,
        priority: Priority,
        created_micros: i64,
    ) -> Self {
        let created_at =
            DateTime::<Utc>::from_timestamp_micros(created_micros).unwrap_or_else(Utc::now);
        Self {
            id: TaskId {
                item_id: item.id.clone(),
                chapter_id: chapter.id.clone(),
                created_at: created_micros,
            },
            item,
            chapter,
            status: Status::Queued,
            priority,
            current_page: 0,
            total_pages: 0,
            bytes_downloaded: 0,
            retry_count: 0,
            error: None,
            error_kind: None,
            destination: None,
            created_at,
            started_at: None,
            completed_at: None,
            cancel_token: None,
            run: None,
        }
    }

    /// Copy of the task without its cancellation handle
    pub(crate) fn snapshot(&self) -> Self {
        Self {
            cancel_token: None,
            run: None,
            ..self.clone()
        }
    }

    /// Download progress in percent (0.0 when the page count is unknown)
    pub fn percent(&self) -> f32 {
        if self.total_pages == 0 {
            0.0
        } else {
            self.current_page as f32 / self.total_pages as f32 * 100.0
        }
    }
}

/// Update check status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    /// Waiting for a check slot
    Pending,
    /// Fetching the chapter list
    Checking,
    /// Check finished
    Completed,
    /// Source lookup or chapter fetch failed
    Failed,
}

/// Metadata refresh record for one library item
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateTask {
    /// Item being checked
    pub item_id: String,
    /// Item title at check time
    pub item_title: String,
    /// Last tracked chapter count
    pub old_chapter_count: usize,
    /// Chapter count reported by the source
    pub new_chapter_count: usize,
    /// Check status
    pub status: UpdateStatus,
    /// Failure message
    pub error: Option<String>,
    /// When the check started
    pub started_at: Option<DateTime<Utc>>,
    /// When the check finished
    pub completed_at: Option<DateTime<Utc>>,
}

impl UpdateTask {
    pub(crate) fn new(item: &Item) -> Self {
        Self {
            item_id: item.id.clone(),
            item_title: item.title.clone(),
            old_chapter_count: 0,
            new_chapter_count: 0,
            status: UpdateStatus::Pending,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// True when the source reports more chapters than were tracked
    pub fn has_new_chapters(&self) -> bool {
        self.new_chapter_count > self.old_chapter_count
    }

    /// Number of chapters published since the last check
    pub fn new_chapters(&self) -> usize {
        self.new_chapter_count.saturating_sub(self.old_chapter_count)
    }
}

/// Outcome of one library update run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateSummary {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished; the summary is immutable once set
    pub completed_at: Option<DateTime<Utc>>,
    /// Items that passed the candidate filter
    pub total_manga: usize,
    /// Items with new chapters
    pub updated_manga: usize,
    /// Items whose check failed
    pub failed_manga: usize,
    /// Sum of new chapters across all items
    pub new_chapters: usize,
    /// Tracking write-backs that failed (checks still counted)
    pub tracking_failures: usize,
    /// Per-item records in completion order
    pub tasks: Vec<UpdateTask>,
}

impl UpdateSummary {
    pub(crate) fn new(total_manga: usize) -> Self {
        Self {
            started_at: Utc::now(),
            completed_at: None,
            total_manga,
            updated_manga: 0,
            failed_manga: 0,
            new_chapters: 0,
            tracking_failures: 0,
            tasks: Vec::with_capacity(total_manga),
        }
    }

    /// Fold one finished check into the counters
    pub(crate) fn record(&mut self, task: UpdateTask) {
        match task.status {
            UpdateStatus::Failed => self.failed_manga += 1,
            _ if task.has_new_chapters() => {
                self.updated_manga += 1;
                self.new_chapters += task.new_chapters();
            }
            _ => {}
        }
        self.tasks.push(task);
    }

    /// Returns true once the run has finished
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Notification category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// An item has new chapters
    NewChapter,
    /// A library update run finished with new chapters
    UpdateComplete,
    /// A library update run could not enumerate the library
    UpdateFailed,
}

/// Entry in the bounded notification log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Monotonically increasing id
    pub id: u64,
    /// Category
    pub kind: NotificationKind,
    /// Short title
    pub title: String,
    /// Human-readable message
    pub message: String,
    /// Whether the reader has seen it
    pub read: bool,
    /// Item the notification is about
    pub item_id: Option<String>,
    /// When it was created
    pub created_at: DateTime<Utc>,
}

/// Event emitted by the download queue or the library updater
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task added to the pending set
    Queued {
        /// Task ID
        id: TaskId,
        /// Priority it was queued with
        priority: Priority,
    },

    /// Pending task removed or active task cancelled
    Removed {
        /// Task ID
        id: TaskId,
    },

    /// Worker picked the task up
    Started {
        /// Task ID
        id: TaskId,
    },

    /// Page written
    Progress {
        /// Task ID
        id: TaskId,
        /// Pages written in the current attempt
        current_page: usize,
        /// Pages in the chapter
        total_pages: usize,
        /// Bytes written in the current attempt
        bytes_downloaded: u64,
    },

    /// Attempt failed and the task will restart after a delay
    Retrying {
        /// Task ID
        id: TaskId,
        /// Retry number (1-based)
        attempt: u32,
        /// Delay before the retry in milliseconds
        delay_ms: u64,
        /// Error of the failed attempt
        error: String,
    },

    /// All pages written
    Completed {
        /// Task ID
        id: TaskId,
        /// Directory holding the pages
        path: PathBuf,
    },

    /// Task reached `Failed`
    Failed {
        /// Task ID
        id: TaskId,
        /// Error message
        error: String,
        /// Error classification
        kind: ErrorKind,
    },

    /// Pool admits new work
    QueueStarted,

    /// Pool stopped admitting work
    QueueStopped,

    /// Active tasks pulled back and dispatch halted
    QueuePaused,

    /// Paused tasks re-queued and dispatch resumed
    QueueResumed,

    /// Library update run started
    UpdateStarted {
        /// Items that passed the candidate filter
        total_manga: usize,
    },

    /// One library item checked
    ItemChecked {
        /// Item ID
        item_id: String,
        /// New chapters found (0 on failure)
        new_chapters: usize,
        /// Whether the check failed
        failed: bool,
    },

    /// Library update run finished
    UpdateCompleted {
        /// Items with new chapters
        updated_manga: usize,
        /// Items whose check failed
        failed_manga: usize,
        /// Total new chapters
        new_chapters: usize,
    },

    /// Notification appended to the log
    Notification {
        /// The new notification
        notification: Notification,
    },

    /// Component shut down
    Shutdown,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> Item {
        Item {
            id: "one-piece".into(),
            title: "One Piece".into(),
            source_id: "mock".into(),
            completed: false,
        }
    }

    fn update_task(old: usize, new: usize, status: UpdateStatus) -> UpdateTask {
        UpdateTask {
            old_chapter_count: old,
            new_chapter_count: new,
            status,
            ..UpdateTask::new(&item())
        }
    }

    #[test]
    fn has_new_chapters_iff_count_grew() {
        assert!(update_task(10, 12, UpdateStatus::Completed).has_new_chapters());
        assert!(!update_task(12, 12, UpdateStatus::Completed).has_new_chapters());
        assert!(!update_task(12, 10, UpdateStatus::Completed).has_new_chapters());
        assert_eq!(update_task(12, 10, UpdateStatus::Completed).new_chapters(), 0);
    }

    #[test]
    fn summary_counts_updates_and_failures() {
        let mut summary = UpdateSummary::new(3);
        summary.record(update_task(1, 4, UpdateStatus::Completed));
        summary.record(update_task(5, 5, UpdateStatus::Completed));
        summary.record(update_task(0, 0, UpdateStatus::Failed));

        assert_eq!(summary.updated_manga, 1);
        assert_eq!(summary.new_chapters, 3);
        assert_eq!(summary.failed_manga, 1);
        assert_eq!(summary.tasks.len(), 3);
        assert!(!summary.is_complete());
    }

    #[test]
    fn snapshot_drops_cancellation_handle() {
        let chapter = Chapter {
            id: "c1".into(),
            item_id: "one-piece".into(),
            title: "Romance Dawn".into(),
            number: Some(1.0),
        };
        let mut task = DownloadTask::new(item(), chapter, 0, 1_700_000_000_000_000);
        task.cancel_token = Some(CancellationToken::new());
        task.run = Some(3);

        let copy = task.snapshot();
        assert!(copy.cancel_token.is_none());
        assert!(copy.run.is_none());
        assert_eq!(copy.id, task.id);
        assert_eq!(copy.id.to_string(), "one-piece/c1@1700000000000000");
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(Event::QueuePaused).unwrap();
        assert_eq!(json["type"], "queue_paused");

        let json = serde_json::to_value(Event::ItemChecked {
            item_id: "x".into(),
            new_chapters: 2,
            failed: false,
        })
        .unwrap();
        assert_eq!(json["type"], "item_checked");
        assert_eq!(json["new_chapters"], 2);
    }
}
