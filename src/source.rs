//! Content source abstraction
//!
//! The orchestration core never talks to a remote server directly. Front ends
//! implement [`ContentSource`] over whatever API they use and hand it to the
//! download queue and the library updater.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A library item (a manga series)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Source-scoped identifier
    pub id: String,
    /// Display title, also used as the download folder name
    pub title: String,
    /// Identifier of the source the item originates from
    pub source_id: String,
    /// Whether the source flags the series as finished
    #[serde(default)]
    pub completed: bool,
}

/// A chapter of a library item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// Opaque chapter identifier
    pub id: String,
    /// Item the chapter belongs to
    pub item_id: String,
    /// Display title, also used as the chapter folder name
    pub title: String,
    /// Chapter number when the source provides one
    #[serde(default)]
    pub number: Option<f64>,
}

/// A single page of a chapter
///
/// Carries inline bytes, a remote URL, or both. Pages with neither are
/// rejected by the download worker.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Zero-based position in the chapter
    pub index: usize,
    /// Remote location of the page image
    #[serde(default)]
    pub url: Option<String>,
    /// Page bytes already resident in memory
    #[serde(default, skip_serializing)]
    pub data: Option<Vec<u8>>,
    /// MIME type reported by the source
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl Page {
    /// Returns true when the page bytes are already in memory
    pub fn is_resident(&self) -> bool {
        self.data.is_some()
    }
}

/// Abstraction over a remote content server, enabling testability.
#[async_trait::async_trait]
pub trait ContentSource: Send + Sync {
    /// Enumerate every item in the library
    async fn list_items(&self) -> Result<Vec<Item>>;

    /// Look up a single item by id
    async fn get_item(&self, id: &str) -> Result<Item>;

    /// List the chapters currently published for an item
    async fn list_chapters(&self, item_id: &str) -> Result<Vec<Chapter>>;

    /// Fetch the ordered page list of a chapter
    async fn get_all_pages(&self, chapter: &Chapter) -> Result<Vec<Page>>;

    /// Fetch the bytes of one page
    async fn get_page(&self, chapter: &Chapter, index: usize) -> Result<Vec<u8>>;

    /// Whether the source can currently serve requests
    async fn is_available(&self) -> bool {
        true
    }
}
