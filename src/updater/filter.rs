//! Candidate selection for update runs

use crate::config::UpdateConfig;
use crate::source::Item;
use crate::store::LibraryStore;

/// Keep the items an update run should check
///
/// `only_completed` looks at the source's flag; `only_with_history` keeps items
/// the reader has at least one history entry for. An item whose history
/// cannot be read is left out of the run.
pub(crate) async fn select_candidates(
    items: Vec<Item>,
    config: &UpdateConfig,
    store: &dyn LibraryStore,
) -> Vec<Item> {
    let mut candidates = Vec::with_capacity(items.len());

    for item in items {
        if config.only_completed && !item.completed {
            continue;
        }

        if config.only_with_history {
            match store.get_item_history(&item.id).await {
                Ok(history) if !history.is_empty() => {}
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(
                        item_id = %item.id,
                        error = %e,
                        "Failed to read history, skipping item"
                    );
                    continue;
                }
            }
        }

        candidates.push(item);
    }

    candidates
}
