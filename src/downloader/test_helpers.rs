//! Shared test helpers for creating DownloadQueue instances in tests.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::tempdir;

use crate::config::{DownloadConfig, RetryConfig};
use crate::downloader::DownloadQueue;
use crate::error::{Error, Result};
use crate::source::{Chapter, ContentSource, Item, Page};

/// Scripted in-memory content source
///
/// Every chapter has `pages` pages served by URL. Page fetches can be delayed
/// and made to fail deterministically; in-flight fetches are counted.
pub(crate) struct MockSource {
    pub(crate) pages: usize,
    /// 1-based page number whose fetch always fails
    pub(crate) fail_on_page: Option<usize>,
    /// Error returned for the failing page, given its 1-based number
    pub(crate) page_failure: fn(usize) -> Error,
    /// Chapter whose page listing panics
    pub(crate) panic_on_chapter: Option<String>,
    pub(crate) fail_page_list: bool,
    pub(crate) resident: bool,
    pub(crate) page_delay: Duration,
    pub(crate) available: AtomicBool,
    pub(crate) in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
    pub(crate) page_list_calls: AtomicUsize,
    pub(crate) page_calls: AtomicUsize,
}

impl MockSource {
    pub(crate) fn new(pages: usize) -> Self {
        Self {
            pages,
            fail_on_page: None,
            page_failure: |page| Error::FetchFailed(format!("page {page} is broken")),
            panic_on_chapter: None,
            fail_page_list: false,
            resident: false,
            page_delay: Duration::ZERO,
            available: AtomicBool::new(true),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            page_list_calls: AtomicUsize::new(0),
            page_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing_on_page(mut self, page: usize) -> Self {
        self.fail_on_page = Some(page);
        self
    }

    pub(crate) fn failing_on_page_with(mut self, page: usize, failure: fn(usize) -> Error) -> Self {
        self.fail_on_page = Some(page);
        self.page_failure = failure;
        self
    }

    pub(crate) fn panicking_on_chapter(mut self, chapter_id: &str) -> Self {
        self.panic_on_chapter = Some(chapter_id.to_string());
        self
    }

    pub(crate) fn failing_page_list(mut self) -> Self {
        self.fail_page_list = true;
        self
    }

    pub(crate) fn with_resident_pages(mut self) -> Self {
        self.resident = true;
        self
    }

    pub(crate) fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub(crate) fn page_list_calls(&self) -> usize {
        self.page_list_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ContentSource for MockSource {
    async fn list_items(&self) -> Result<Vec<Item>> {
        Ok(Vec::new())
    }

    async fn get_item(&self, id: &str) -> Result<Item> {
        Ok(item(id))
    }

    async fn list_chapters(&self, _item_id: &str) -> Result<Vec<Chapter>> {
        Ok(Vec::new())
    }

    async fn get_all_pages(&self, chapter: &Chapter) -> Result<Vec<Page>> {
        self.page_list_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_chapter.as_deref() == Some(chapter.id.as_str()) {
            panic!("page list for {} is corrupt", chapter.id);
        }
        if self.fail_page_list {
            return Err(Error::FetchFailed("page list unavailable".into()));
        }

        Ok((0..self.pages)
            .map(|index| Page {
                index,
                url: Some(format!("https://cdn.example.com/{}/{index}.png", chapter.id)),
                data: self.resident.then(|| vec![index as u8; 16]),
                mime_type: Some("image/png".into()),
            })
            .collect())
    }

    async fn get_page(&self, _chapter: &Chapter, index: usize) -> Result<Vec<u8>> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        // Decrements even when the fetch is dropped by a cancellation
        let _in_flight = InFlight(&self.in_flight);

        if !self.page_delay.is_zero() {
            tokio::time::sleep(self.page_delay).await;
        }

        if self.fail_on_page == Some(index + 1) {
            return Err((self.page_failure)(index + 1));
        }
        Ok(vec![index as u8; 100])
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

pub(crate) fn item(id: &str) -> Item {
    Item {
        id: id.to_string(),
        title: format!("Series {id}"),
        source_id: "mock".to_string(),
        completed: false,
    }
}

pub(crate) fn chapter(item_id: &str, id: &str) -> Chapter {
    Chapter {
        id: id.to_string(),
        item_id: item_id.to_string(),
        title: format!("Chapter {id}"),
        number: None,
    }
}

/// Download config with short intervals and a jitter-free, near-instant retry policy
pub(crate) fn test_config(root: &std::path::Path, max_concurrent: usize) -> DownloadConfig {
    DownloadConfig {
        download_dir: root.join("downloads"),
        max_concurrent_downloads: max_concurrent,
        page_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(10),
        default_extension: "jpg".to_string(),
        retry: RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
        },
    }
}

/// Helper to create a stopped test queue over `source`.
/// Returns the queue and the tempdir (which must be kept alive).
pub(crate) fn create_test_queue(
    source: Arc<MockSource>,
    max_concurrent: usize,
) -> (DownloadQueue, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path(), max_concurrent);
    let queue = DownloadQueue::new(config, source).unwrap();
    (queue, temp_dir)
}

/// Poll `condition` until it holds, panicking after `timeout`
pub(crate) async fn wait_until<F, Fut>(timeout: Duration, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
