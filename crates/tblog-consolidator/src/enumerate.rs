//! Source enumeration.
//!
//! Sources are the immediate child prefixes of the root whose name starts with
//! the configured source prefix, e.g. `log/tbcd1234/`. Consolidated output lives
//! under year prefixes (`log/2021/`) and is skipped by the same filter.

use tblog_core::{KeyLayout, StorageBackend};

use crate::error::{ConsolidateError, Result};

/// Lists the source ids that currently have a prefix under the root.
///
/// Order follows the store's listing order. An empty root yields an empty list.
///
/// # Errors
///
/// Returns `ConsolidateError::Enumeration` if the listing fails.
pub async fn enumerate_sources(
    storage: &dyn StorageBackend,
    layout: &KeyLayout,
    source_prefix: &str,
) -> Result<Vec<String>> {
    let root = layout.root_dir();
    let listing = storage
        .list_with_delimiter(&root)
        .await
        .map_err(|source| ConsolidateError::Enumeration {
            prefix: root.clone(),
            source,
        })?;

    let wanted = source_prefix.to_ascii_lowercase();
    let sources: Vec<String> = listing
        .common_prefixes
        .iter()
        .filter_map(|prefix| prefix.strip_prefix(&root))
        .map(|name| name.trim_end_matches('/'))
        .filter(|name| name.to_ascii_lowercase().starts_with(&wanted))
        .map(str::to_string)
        .collect();

    tracing::debug!(
        prefix = %root,
        children = listing.common_prefixes.len(),
        sources = sources.len(),
        "Enumerated sources"
    );
    Ok(sources)
}
