//! Custom assertions and event helpers for integration tests

use std::path::{Path, PathBuf};
use std::time::Duration;

use manga_dl::{DownloadQueue, Event, TaskId};
use tokio::sync::broadcast;

/// Terminal outcome of a download as seen on the event channel
#[derive(Debug)]
pub enum WaitResult {
    /// Download completed into the given directory
    Completed(PathBuf),
    /// Download failed with error
    Failed(String),
    /// Timeout waiting for completion
    Timeout,
    /// Channel closed unexpectedly
    ChannelClosed,
}

/// Wait for a download to reach a terminal state (Completed or Failed)
pub async fn wait_for_completion(
    events: &mut broadcast::Receiver<Event>,
    id: &TaskId,
    timeout: Duration,
) -> WaitResult {
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::Completed { id: event_id, path }) if &event_id == id => {
                    return WaitResult::Completed(path);
                }
                Ok(Event::Failed {
                    id: event_id,
                    error,
                    ..
                }) if &event_id == id => {
                    return WaitResult::Failed(error);
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    return WaitResult::ChannelClosed;
                }
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Collect events until the predicate matches one (inclusive) or the timeout elapses
pub async fn collect_events_until<F>(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    mut predicate: F,
) -> Vec<Event>
where
    F: FnMut(&Event) -> bool,
{
    let mut collected = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            let done = predicate(&event);
            collected.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    collected
}

/// Wait until `count` tasks have completed
pub async fn wait_for_completed(queue: &DownloadQueue, count: usize, timeout: Duration) {
    tokio::time::timeout(timeout, async {
        while queue.completed().await.len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{count} downloads did not complete in time"));
}

/// Assert that the expected files exist in a directory
pub fn assert_files_exist(dir: &Path, expected_files: &[&str]) {
    for file in expected_files {
        let path = dir.join(file);
        assert!(path.exists(), "Expected file not found: {}", path.display());
    }
}

/// Relative paths of every file under `root`, sorted
pub fn files_under(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files
}
