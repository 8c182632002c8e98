//! Pre-built test fixtures for common consolidation scenarios.

use std::sync::Arc;

use tblog_core::StorageBackend;

use crate::storage::TracingMemoryBackend;

/// The loader id used by the canonical scenarios.
pub const SOURCE_ID: &str = "tbcd1234";

/// Test context with a shared tracing storage backend.
#[derive(Debug, Clone, Default)]
pub struct TestContext {
    /// Shared storage backend.
    pub storage: Arc<TracingMemoryBackend>,
}

impl TestContext {
    /// Creates a new test context with empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the storage as the trait object the pipeline consumes.
    #[must_use]
    pub fn backend(&self) -> Arc<dyn StorageBackend> {
        self.storage.clone()
    }

    /// Seeds a fragment for `source_id` at `timestamp` (e.g. `20210730T131711.123Z`).
    ///
    /// Returns the fragment key.
    pub async fn seed_fragment(&self, source_id: &str, timestamp: &str, content: &str) -> String {
        let key = fragment_key(source_id, timestamp);
        self.storage.seed(&key, content.to_string()).await;
        key
    }

    /// Seeds the two-fragment day used by the end-to-end scenarios.
    ///
    /// Returns both fragment keys in chronological order.
    pub async fn seed_canonical_day(&self) -> Vec<String> {
        vec![
            self.seed_fragment(SOURCE_ID, "20210730T131711.123Z", "hello")
                .await,
            self.seed_fragment(SOURCE_ID, "20210730T140000Z", "world\n")
                .await,
        ]
    }
}

/// Builds a fragment key under the default `log` root.
#[must_use]
pub fn fragment_key(source_id: &str, timestamp: &str) -> String {
    format!("log/{source_id}/{timestamp}.log")
}

/// The consolidated key for the canonical scenario day (2021-07-30).
#[must_use]
pub fn canonical_consolidated_key() -> String {
    format!("log/2021/07/{SOURCE_ID}-30.log")
}
