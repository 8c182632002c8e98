//! Fragment listing for one source.

use tblog_core::{KeyLayout, StorageBackend};

use crate::error::{ConsolidateError, Result};

/// Lists every key under a source's prefix, in lexicographic order.
///
/// Stores are expected to list in key order already; the keys are sorted again
/// here so that one calendar day can never split into two non-contiguous groups,
/// which would make the second merge of the day overwrite the first.
///
/// # Errors
///
/// Returns `ConsolidateError::Listing` if the listing fails. No partial list is
/// returned.
pub async fn list_fragments(
    storage: &dyn StorageBackend,
    layout: &KeyLayout,
    source_id: &str,
) -> Result<Vec<String>> {
    let prefix = layout.source_dir(source_id);
    let mut keys = storage
        .list(&prefix)
        .await
        .map_err(|source| ConsolidateError::Listing {
            source_id: source_id.to_string(),
            source,
        })?;

    if !keys.is_sorted() {
        tracing::warn!(prefix = %prefix, "Store listing was not in key order; sorting");
        keys.sort();
    }

    tracing::debug!(prefix = %prefix, keys = keys.len(), "Listed fragments");
    Ok(keys)
}
