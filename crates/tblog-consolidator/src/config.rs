//! Consolidator configuration.

use serde::{Deserialize, Serialize};
use tblog_core::storage_keys::{DEFAULT_ROOT_PREFIX, KeyLayout};

use crate::error::{ConsolidateError, Result};

const DEFAULT_SOURCE_PREFIX: &str = "tbcd";
const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// S3 `DeleteObjects` accepts at most this many keys per request.
pub const MAX_DELETE_BATCH_SIZE: usize = 1000;

fn default_root_prefix() -> String {
    DEFAULT_ROOT_PREFIX.to_string()
}

fn default_source_prefix() -> String {
    DEFAULT_SOURCE_PREFIX.to_string()
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

fn default_delete_batch_size() -> usize {
    MAX_DELETE_BATCH_SIZE
}

/// Configuration for a consolidation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatorConfig {
    /// Root prefix holding both fragments and consolidated logs (no trailing `/`).
    #[serde(default = "default_root_prefix")]
    pub root_prefix: String,

    /// Child prefixes of the root whose name starts with this value (compared
    /// case-insensitively) are treated as loader sources.
    #[serde(default = "default_source_prefix")]
    pub source_prefix: String,

    /// Content type written on consolidated logs.
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Maximum keys per delete request.
    #[serde(default = "default_delete_batch_size")]
    pub delete_batch_size: usize,

    /// Plan and read without writing or deleting.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for ConsolidatorConfig {
    fn default() -> Self {
        Self {
            root_prefix: default_root_prefix(),
            source_prefix: default_source_prefix(),
            content_type: default_content_type(),
            delete_batch_size: default_delete_batch_size(),
            dry_run: false,
        }
    }
}

impl ConsolidatorConfig {
    /// Validates the configuration and builds the key layout it describes.
    ///
    /// # Errors
    ///
    /// Returns `ConsolidateError::Config` if any field is out of range.
    pub fn layout(&self) -> Result<KeyLayout> {
        if self.source_prefix.is_empty() || self.source_prefix.contains('/') {
            return Err(ConsolidateError::Config {
                message: format!(
                    "source_prefix must be non-empty and contain no '/': {:?}",
                    self.source_prefix
                ),
            });
        }
        if self.delete_batch_size == 0 || self.delete_batch_size > MAX_DELETE_BATCH_SIZE {
            return Err(ConsolidateError::Config {
                message: format!(
                    "delete_batch_size must be between 1 and {MAX_DELETE_BATCH_SIZE}, got {}",
                    self.delete_batch_size
                ),
            });
        }
        KeyLayout::new(self.root_prefix.clone()).map_err(|e| ConsolidateError::Config {
            message: e.to_string(),
        })
    }
}
