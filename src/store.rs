//! Persistent store abstraction
//!
//! Three narrow traits cover everything the orchestration core reads or writes:
//! reading progress, per-item update tracking, and reading history. The storage
//! format is the implementor's concern; [`MemoryStore`] is an in-process
//! implementation for embedding and tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::Result;

/// One reading-history record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Item that was read
    pub item_id: String,
    /// Chapter that was read
    pub chapter_id: String,
    /// Last page reached (1-based)
    pub page: usize,
    /// When the entry was recorded
    pub read_at: DateTime<Utc>,
}

/// Reading position of a chapter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    /// Item title at save time
    pub item_title: String,
    /// Chapter being read
    pub chapter_id: String,
    /// Current page (1-based)
    pub current_page: usize,
    /// Pages in the chapter
    pub total_pages: usize,
    /// When the position was saved
    pub updated_at: DateTime<Utc>,
}

/// Reading progress persistence
#[async_trait::async_trait]
pub trait ProgressStore: Send + Sync {
    /// Save the reading position for an item
    async fn update_progress(
        &self,
        item_id: &str,
        item_title: &str,
        chapter_id: &str,
        current_page: usize,
        total_pages: usize,
    ) -> Result<()>;
}

/// Last-known chapter counts per item
#[async_trait::async_trait]
pub trait TrackingStore: Send + Sync {
    /// Last tracked chapter count, `None` if the item was never checked
    async fn get_tracking(&self, item_id: &str) -> Result<Option<usize>>;

    /// Record the chapter count observed by an update check
    async fn set_tracking(&self, item_id: &str, chapter_count: usize) -> Result<()>;
}

/// Reading history lookups
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    /// History entries for an item, most recent first
    async fn get_item_history(&self, item_id: &str) -> Result<Vec<HistoryEntry>>;
}

/// Store capabilities needed by the library updater
pub trait LibraryStore: TrackingStore + HistoryStore {}

impl<T: TrackingStore + HistoryStore> LibraryStore for T {}

/// In-memory implementation of all store traits
#[derive(Debug, Default)]
pub struct MemoryStore {
    progress: RwLock<HashMap<String, ProgressEntry>>,
    tracking: RwLock<HashMap<String, usize>>,
    history: RwLock<HashMap<String, Vec<HistoryEntry>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a history entry for an item
    pub async fn record_history(&self, item_id: &str, chapter_id: &str, page: usize) {
        let entry = HistoryEntry {
            item_id: item_id.to_string(),
            chapter_id: chapter_id.to_string(),
            page,
            read_at: Utc::now(),
        };
        let mut history = self.history.write().await;
        // Most recent first
        history.entry(item_id.to_string()).or_default().insert(0, entry);
    }

    /// Saved reading position for an item
    pub async fn progress(&self, item_id: &str) -> Option<ProgressEntry> {
        self.progress.read().await.get(item_id).cloned()
    }
}

#[async_trait::async_trait]
impl ProgressStore for MemoryStore {
    async fn update_progress(
        &self,
        item_id: &str,
        item_title: &str,
        chapter_id: &str,
        current_page: usize,
        total_pages: usize,
    ) -> Result<()> {
        let entry = ProgressEntry {
            item_title: item_title.to_string(),
            chapter_id: chapter_id.to_string(),
            current_page,
            total_pages,
            updated_at: Utc::now(),
        };
        self.progress.write().await.insert(item_id.to_string(), entry);
        Ok(())
    }
}

#[async_trait::async_trait]
impl TrackingStore for MemoryStore {
    async fn get_tracking(&self, item_id: &str) -> Result<Option<usize>> {
        Ok(self.tracking.read().await.get(item_id).copied())
    }

    async fn set_tracking(&self, item_id: &str, chapter_count: usize) -> Result<()> {
        self.tracking
            .write()
            .await
            .insert(item_id.to_string(), chapter_count);
        Ok(())
    }
}

#[async_trait::async_trait]
impl HistoryStore for MemoryStore {
    async fn get_item_history(&self, item_id: &str) -> Result<Vec<HistoryEntry>> {
        Ok(self
            .history
            .read()
            .await
            .get(item_id)
            .cloned()
            .unwrap_or_default())
    }
}
