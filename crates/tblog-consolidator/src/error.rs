//! Consolidation error taxonomy.
//!
//! A missing consolidated artifact is recovered inside the merger and never
//! appears here. Every variant below terminates the current run.

use tblog_core::Error as StorageError;

use crate::summary::DaySummary;

/// Result alias for consolidation operations.
pub type Result<T> = std::result::Result<T, ConsolidateError>;

/// Errors surfaced by the consolidation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ConsolidateError {
    /// Listing the root prefix for sources failed. Nothing was mutated.
    #[error("failed to enumerate sources under {prefix}")]
    Enumeration {
        /// The root prefix that was listed.
        prefix: String,
        /// The underlying storage failure.
        #[source]
        source: StorageError,
    },

    /// Listing one source's fragments failed. Nothing was mutated for it.
    #[error("failed to list fragments for source {source_id}")]
    Listing {
        /// The source whose prefix was listed.
        source_id: String,
        /// The underlying storage failure.
        #[source]
        source: StorageError,
    },

    /// A fragment could not be read. The day's fragments are preserved.
    #[error("failed to read fragment {key}")]
    FragmentRead {
        /// The fragment key.
        key: String,
        /// The underlying storage failure.
        #[source]
        source: StorageError,
    },

    /// The existing consolidated log could not be read. Nothing was written.
    #[error("failed to read consolidated log {key}")]
    PriorRead {
        /// The consolidated key.
        key: String,
        /// The underlying storage failure.
        #[source]
        source: StorageError,
    },

    /// The consolidated log could not be written. No fragments were deleted.
    #[error("failed to write consolidated log {key}")]
    Write {
        /// The consolidated key.
        key: String,
        /// The underlying storage failure.
        #[source]
        source: StorageError,
    },

    /// Deleting merged fragments failed after the consolidated log was written.
    ///
    /// Remaining fragments are already merged; a later run merges them again.
    #[error("wrote {key} but failed to delete {pending} merged fragments")]
    Delete {
        /// The consolidated key that was written.
        key: String,
        /// Fragment keys not confirmed deleted.
        pending: usize,
        /// The underlying storage failure.
        #[source]
        source: StorageError,
    },

    /// The configuration is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },
}

impl ConsolidateError {
    /// Short, stable label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Enumeration { .. } => "enumeration",
            Self::Listing { .. } => "listing",
            Self::FragmentRead { .. } => "fragment_read",
            Self::PriorRead { .. } => "prior_read",
            Self::Write { .. } => "write",
            Self::Delete { .. } => "delete",
            Self::Config { .. } => "config",
        }
    }

    /// Returns true if the store was mutated by the failing unit of work.
    #[must_use]
    pub fn wrote_artifact(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }
}

/// A run that stopped at its first error.
///
/// Day groups completed before the failure stay committed and are reported
/// in `completed`.
#[derive(Debug, thiserror::Error)]
#[error("consolidation stopped after {} completed day groups: {error}", .completed.len())]
pub struct RunFailure {
    /// The first error encountered.
    #[source]
    pub error: ConsolidateError,
    /// Day groups merged before the failure, in processing order.
    pub completed: Vec<DaySummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_failure_reports_written_artifact() {
        let err = ConsolidateError::Delete {
            key: "log/2021/07/tbcd1234-30.log".into(),
            pending: 2,
            source: StorageError::storage("throttled"),
        };
        assert!(err.wrote_artifact());
        assert_eq!(err.kind(), "delete");
        assert_eq!(
            err.to_string(),
            "wrote log/2021/07/tbcd1234-30.log but failed to delete 2 merged fragments"
        );
    }

    #[test]
    fn write_failure_does_not_report_artifact() {
        let err = ConsolidateError::Write {
            key: "log/2021/07/tbcd1234-30.log".into(),
            source: StorageError::storage("denied"),
        };
        assert!(!err.wrote_artifact());
    }

    #[test]
    fn run_failure_display_counts_completed_groups() {
        let failure = RunFailure {
            error: ConsolidateError::Listing {
                source_id: "tbcd0002".into(),
                source: StorageError::storage("timeout"),
            },
            completed: Vec::new(),
        };
        assert_eq!(
            failure.to_string(),
            "consolidation stopped after 0 completed day groups: failed to list fragments for source tbcd0002"
        );
    }
}
