//! # manga-dl
//!
//! Background task orchestration for manga readers: a bounded-concurrency
//! chapter download queue and a periodic library update scheduler.
//!
//! ## Design Philosophy
//!
//! manga-dl is designed to be:
//! - **Library-first** - No CLI or UI, front ends embed it and bring their own
//!   [`ContentSource`] and store
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Bounded** - Downloads and update checks run under explicit concurrency
//!   ceilings; notification and summary logs have fixed capacities
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use manga_dl::{Config, ContentSource, DownloadQueue, LibraryUpdater, MemoryStore};
//!
//! # async fn example(source: Arc<dyn ContentSource>) -> manga_dl::Result<()> {
//! let config = Config::default();
//! let queue = DownloadQueue::new(config.download, Arc::clone(&source))?;
//! let updater = LibraryUpdater::new(config.update, source, Arc::new(MemoryStore::new()))?;
//!
//! let mut events = queue.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//! });
//!
//! queue.start().await?;
//! updater.start().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Chapter download queue and worker pool (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Bounded notification log
pub mod notifications;
/// Reading-progress persistence that never fails the caller
pub mod progress;
/// Retry logic with exponential backoff
pub mod retry;
/// Fixed-capacity ring buffer
pub mod ring;
/// Content source abstraction
pub mod source;
/// Download counters
pub mod stats;
/// Persistent store abstraction
pub mod store;
/// Core types and events
pub mod types;
/// Periodic library update checks
pub mod updater;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, RetryConfig, UpdateConfig};
pub use downloader::{DownloadCallbacks, DownloadQueue};
pub use error::{Error, ErrorKind, Result};
pub use notifications::NotificationLog;
pub use progress::ProgressRecorder;
pub use source::{Chapter, ContentSource, Item, Page};
pub use stats::DownloadStats;
pub use store::{HistoryStore, LibraryStore, MemoryStore, ProgressStore, TrackingStore};
pub use types::{
    DownloadTask, Event, Notification, NotificationKind, Priority, Status, TaskId, UpdateStatus,
    UpdateSummary, UpdateTask,
};
pub use updater::{LibraryUpdater, UpdateCallbacks};

/// Helper function to run both background services with graceful signal handling.
///
/// Waits for a termination signal, then shuts down the updater loop followed
/// by the download queue. On Unix both SIGTERM and SIGINT count; elsewhere
/// Ctrl+C does.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use manga_dl::{Config, ContentSource, DownloadQueue, LibraryUpdater, MemoryStore, run_with_shutdown};
///
/// # async fn example(source: Arc<dyn ContentSource>) -> manga_dl::Result<()> {
/// let config = Config::default();
/// let queue = DownloadQueue::new(config.download, Arc::clone(&source))?;
/// let updater = LibraryUpdater::new(config.update, source, Arc::new(MemoryStore::new()))?;
/// queue.start().await?;
/// updater.start().await?;
///
/// // Run with automatic signal handling
/// run_with_shutdown(queue, updater).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_with_shutdown(queue: DownloadQueue, updater: LibraryUpdater) -> Result<()> {
    run_until(queue, updater, termination_signal()).await
}

/// Run both services until `shutdown` resolves, then stop them in order
///
/// Use this in place of [`run_with_shutdown`] when the embedding application
/// owns its own shutdown trigger, such as a oneshot channel or a
/// [`CancellationToken`](tokio_util::sync::CancellationToken).
pub async fn run_until<F>(queue: DownloadQueue, updater: LibraryUpdater, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()>,
{
    shutdown.await;
    tracing::info!("Shutting down background services");
    updater.shutdown().await;
    queue.shutdown().await
}

#[cfg(unix)]
async fn termination_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = terminate.recv() => tracing::info!("Received SIGTERM"),
                _ = interrupt() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable");
            interrupt().await;
        }
    }
}

#[cfg(not(unix))]
async fn termination_signal() {
    interrupt().await;
}

/// Resolve on Ctrl+C, or never if the handler cannot be installed
async fn interrupt() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received interrupt"),
        Err(e) => {
            tracing::error!(error = %e, "Interrupt handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}
