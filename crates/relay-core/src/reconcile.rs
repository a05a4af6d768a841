use tracing::{info, warn};

use crate::{dispatch::DispatchResult, store::RecipientStore};

/// Drops the recipients a dispatch pass found permanently unreachable.
///
/// One `batch_remove` per pass, and only when there is something to purge. A
/// failure here only means stale recipients survive one more broadcast, so it
/// is logged rather than returned.
pub async fn reconcile(store: &RecipientStore, result: &DispatchResult) {
    if result.purge.is_empty() {
        return;
    }

    match store.batch_remove(&result.purge_set()).await {
        Ok(removed) => info!(
            store = %store.path().display(),
            removed,
            "purged unreachable recipients"
        ),
        Err(e) => warn!(
            store = %store.path().display(),
            pending = result.purge.len(),
            "purge skipped this cycle: {e}"
        ),
    }
}
