//! Download task orchestration: top-level lifecycle for a single chapter download.

use crate::error::Error;
use crate::retry::{Backoff, IsRetryable, sleep_or_cancel};

use super::context::DownloadTaskContext;
use super::pages::download_chapter;

/// Core download task -- runs attempts until one succeeds or the retry budget is spent.
///
/// Phases:
/// 1. Run the page loop from the first page
/// 2. On a retryable failure with budget left, count the retry, back off and go to 1
/// 3. Finalize the task as completed or failed; the supervisor frees the slot
pub(crate) async fn run_download_task(mut ctx: DownloadTaskContext) {
    let retry = ctx.queue.config.retry.clone();
    let mut backoff = Backoff::new(&retry);

    tracing::info!(
        task_id = %ctx.id,
        chapter = %ctx.chapter.title,
        retry_count = ctx.retry_count,
        "Download started"
    );

    let outcome = loop {
        let error = match download_chapter(&ctx).await {
            Ok(path) => break Ok(path),
            Err(e) => e,
        };

        if !error.is_retryable()
            || ctx.retry_count >= retry.max_retries
            || ctx.cancel_token.is_cancelled()
        {
            break Err(error);
        }

        let delay = backoff.next_delay();
        if !ctx.record_retry(&error, delay).await {
            break Err(Error::Cancelled);
        }

        if let Err(e) = sleep_or_cancel(delay, &ctx.cancel_token).await {
            break Err(e);
        }
    };

    ctx.finish(outcome).await;
}
