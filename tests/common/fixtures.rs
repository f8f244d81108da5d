//! Test fixtures: an in-memory library served through `ContentSource`

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use manga_dl::{Chapter, ContentSource, DownloadConfig, Error, Item, Page, Result, RetryConfig};

/// Bytes served for a page: a recognizable pattern of `len` bytes
pub fn page_bytes(chapter_id: &str, index: usize, len: usize) -> Vec<u8> {
    let seed = chapter_id.bytes().fold(index as u8, |acc, b| acc.wrapping_add(b));
    (0..len).map(|n| seed.wrapping_add(n as u8)).collect()
}

/// In-memory library with a configurable number of pages per chapter
///
/// Even pages are served by URL with a `.webp` suffix, odd pages carry their
/// bytes inline and have no URL.
pub struct LibrarySource {
    items: Vec<Item>,
    chapters: Mutex<HashMap<String, Vec<Chapter>>>,
    pages_per_chapter: usize,
    page_len: usize,
    page_delay: Duration,
}

impl LibrarySource {
    pub fn new(pages_per_chapter: usize) -> Self {
        Self {
            items: Vec::new(),
            chapters: Mutex::new(HashMap::new()),
            pages_per_chapter,
            page_len: 64,
            page_delay: Duration::ZERO,
        }
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Add a series with `chapters` chapters
    pub fn with_series(mut self, id: &str, title: &str, chapters: usize) -> Self {
        self.items.push(Item {
            id: id.to_string(),
            title: title.to_string(),
            source_id: "fixture".to_string(),
            completed: false,
        });
        let list = (1..=chapters).map(|n| chapter(id, n)).collect();
        self.chapters
            .lock()
            .unwrap()
            .insert(id.to_string(), list);
        self
    }

    /// Publish one more chapter of a series, returning it
    pub fn publish(&self, item_id: &str) -> Chapter {
        let mut chapters = self.chapters.lock().unwrap();
        let list = chapters.entry(item_id.to_string()).or_default();
        let next = chapter(item_id, list.len() + 1);
        list.push(next.clone());
        next
    }

    pub fn item(&self, id: &str) -> Item {
        self.items
            .iter()
            .find(|item| item.id == id)
            .cloned()
            .unwrap()
    }

    pub fn chapters_of(&self, item_id: &str) -> Vec<Chapter> {
        self.chapters
            .lock()
            .unwrap()
            .get(item_id)
            .cloned()
            .unwrap_or_default()
    }
}

fn chapter(item_id: &str, number: usize) -> Chapter {
    Chapter {
        id: format!("{item_id}-ch{number}"),
        item_id: item_id.to_string(),
        title: format!("Chapter {number}"),
        number: Some(number as f64),
    }
}

#[async_trait::async_trait]
impl ContentSource for LibrarySource {
    async fn list_items(&self) -> Result<Vec<Item>> {
        Ok(self.items.clone())
    }

    async fn get_item(&self, id: &str) -> Result<Item> {
        self.items
            .iter()
            .find(|item| item.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("item {id}")))
    }

    async fn list_chapters(&self, item_id: &str) -> Result<Vec<Chapter>> {
        Ok(self.chapters_of(item_id))
    }

    async fn get_all_pages(&self, chapter: &Chapter) -> Result<Vec<Page>> {
        Ok((0..self.pages_per_chapter)
            .map(|index| {
                if index % 2 == 0 {
                    Page {
                        index,
                        url: Some(format!(
                            "https://img.example.org/{}/{index}.webp?token=abc",
                            chapter.id
                        )),
                        data: None,
                        mime_type: Some("image/webp".to_string()),
                    }
                } else {
                    Page {
                        index,
                        url: None,
                        data: Some(page_bytes(&chapter.id, index, self.page_len)),
                        mime_type: Some("image/jpeg".to_string()),
                    }
                }
            })
            .collect())
    }

    async fn get_page(&self, chapter: &Chapter, index: usize) -> Result<Vec<u8>> {
        if !self.page_delay.is_zero() {
            tokio::time::sleep(self.page_delay).await;
        }
        Ok(page_bytes(&chapter.id, index, self.page_len))
    }
}

/// Download settings rooted at `root` with fast retries and polling
pub fn download_config(root: &Path, max_concurrent: usize) -> DownloadConfig {
    DownloadConfig {
        download_dir: root.join("library"),
        max_concurrent_downloads: max_concurrent,
        page_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(10),
        retry: RetryConfig {
            max_retries: 1,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
        },
        ..DownloadConfig::default()
    }
}
