//! Download task execution -- per-chapter worker lifecycle.
//!
//! Split into focused submodules:
//! - [`context`] - Task ownership checks and bookkeeping under the queue lock
//! - [`orchestration`] - Retry loop around whole-chapter attempts
//! - [`pages`] - Page-by-page fetch and write with cancellation and timeout
//! - [`paths`] - Destination directory, file name and extension rules

mod context;
mod orchestration;
mod pages;
mod paths;


pub(crate) use context::DownloadTaskContext;
pub(crate) use orchestration::run_download_task;
pub use paths::{chapter_dir, page_extension, sanitize_filename};
