//! Page loop: fetch every page of a chapter in order and write it to disk.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::source::{Chapter, ContentSource, Page};

use super::context::DownloadTaskContext;
use super::paths::{chapter_dir, page_extension, page_file_name};

/// Download one attempt of a chapter, returning the directory holding its pages
///
/// Cancellation is checked before every page and races every await. Each page
/// is additionally bounded by the configured page timeout. The first failing
/// page aborts the attempt.
pub(super) async fn download_chapter(ctx: &DownloadTaskContext) -> Result<PathBuf> {
    let config = &ctx.queue.config;
    let source = ctx.queue.source.as_ref();
    let cancel_token = &ctx.cancel_token;

    if !source.is_available().await {
        return Err(Error::SourceUnavailable(format!(
            "source {} is not available",
            ctx.item.source_id
        )));
    }

    let pages = tokio::select! {
        _ = cancel_token.cancelled() => return Err(Error::Cancelled),
        pages = source.get_all_pages(&ctx.chapter) => pages?,
    };

    let destination = chapter_dir(&config.download_dir, &ctx.item.title, &ctx.chapter.title);
    tokio::fs::create_dir_all(&destination).await.map_err(|e| {
        Error::PersistenceFailed(format!(
            "failed to create directory '{}': {}",
            destination.display(),
            e
        ))
    })?;

    ctx.begin_attempt(pages.len(), &destination).await;
    tracing::debug!(
        task_id = %ctx.id,
        pages = pages.len(),
        destination = %destination.display(),
        "Fetched page list"
    );

    for (position, page) in pages.iter().enumerate() {
        if cancel_token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let number = position + 1;
        let extension = page_extension(page.url.as_deref(), &config.default_extension);
        let path = destination.join(page_file_name(number, &extension));

        let written = tokio::select! {
            _ = cancel_token.cancelled() => return Err(Error::Cancelled),
            result = tokio::time::timeout(
                config.page_timeout,
                fetch_and_write(source, &ctx.chapter, page, &path),
            ) => result.map_err(|_| Error::Timeout(config.page_timeout))??,
        };

        ctx.record_page(number, written).await;
    }

    Ok(destination)
}

/// Write one page, preferring resident bytes over a remote fetch
async fn fetch_and_write(
    source: &dyn ContentSource,
    chapter: &Chapter,
    page: &Page,
    path: &Path,
) -> Result<u64> {
    let bytes: Cow<'_, [u8]> = match &page.data {
        Some(data) => Cow::Borrowed(data.as_slice()),
        None if page.url.is_some() => Cow::Owned(source.get_page(chapter, page.index).await?),
        None => {
            return Err(Error::FetchFailed(format!(
                "page {} of chapter {} has neither data nor url",
                page.index, chapter.id
            )));
        }
    };

    tokio::fs::write(path, &bytes).await.map_err(|e| {
        Error::PersistenceFailed(format!("failed to write '{}': {}", path.display(), e))
    })?;

    Ok(bytes.len() as u64)
}
