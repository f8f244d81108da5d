//! Tests for the download queue, grouped by concern.

use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::downloader::test_helpers::{
    MockSource, chapter, create_test_queue, item, test_config, wait_until,
};
use crate::error::ErrorKind;
use crate::types::Status;


/// Generous upper bound for background work in tests
const WAIT: Duration = Duration::from_secs(10);

/// Enqueue `count` chapters of one item with priority 0, returning their ids
async fn enqueue_chapters(queue: &DownloadQueue, count: usize) -> Vec<TaskId> {
    let mut ids = Vec::with_capacity(count);
    for n in 1..=count {
        let id = queue
            .enqueue(item("series"), chapter("series", &format!("c{n}")), 0)
            .await
            .unwrap();
        ids.push(id);
    }
    ids
}

/// Wait until `count` tasks have completed
async fn wait_for_completed(queue: &DownloadQueue, count: usize) {
    wait_until(WAIT, || {
        let queue = queue.clone();
        async move { queue.completed().await.len() >= count }
    })
    .await;
}

/// Wait until `count` tasks have failed
async fn wait_for_failed(queue: &DownloadQueue, count: usize) {
    wait_until(WAIT, || {
        let queue = queue.clone();
        async move { queue.failed().await.len() >= count }
    })
    .await;
}

/// Wait until `count` tasks are active
async fn wait_for_active(queue: &DownloadQueue, count: usize) {
    wait_until(WAIT, || {
        let queue = queue.clone();
        async move { queue.active().await.len() >= count }
    })
    .await;
}
