//! Test storage implementations with operation tracing.
//!
//! Provides in-memory storage that records all operations for test assertions
//! and fails selected operations on demand.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tblog_core::error::{Error, Result};
use tblog_core::storage::{ListResult, MemoryBackend, StorageBackend};

/// Record of a storage operation for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    /// Get operation.
    Get {
        /// Path that was read.
        path: String,
    },
    /// Put operation.
    Put {
        /// Path that was written.
        path: String,
        /// Size of data written.
        size: usize,
        /// Content type used.
        content_type: String,
    },
    /// Batch delete operation.
    DeleteMany {
        /// Paths in the batch, in request order.
        paths: Vec<String>,
    },
    /// Recursive list operation.
    List {
        /// Prefix that was listed.
        prefix: String,
    },
    /// Delimited list operation.
    ListWithDelimiter {
        /// Prefix that was listed.
        prefix: String,
    },
}

/// The kind of a storage operation, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// `get`
    Get,
    /// `put`
    Put,
    /// `delete_many`
    DeleteMany,
    /// `list`
    List,
    /// `list_with_delimiter`
    ListWithDelimiter,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    kind: Option<OpKind>,
    prefix: String,
}

/// In-memory storage backend with operation tracing.
///
/// Records all operations for later assertion in tests. Failed operations are
/// not recorded, so `operations()` lists only calls that took effect.
#[derive(Debug, Clone, Default)]
pub struct TracingMemoryBackend {
    inner: MemoryBackend,
    operations: Arc<Mutex<Vec<StorageOp>>>,
    failures: Arc<Mutex<Vec<InjectedFailure>>>,
}

impl TracingMemoryBackend {
    /// Creates a new empty tracing storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object without recording an operation.
    pub async fn seed(&self, path: &str, data: impl Into<Bytes>) {
        self.inner
            .put(path, data.into(), "text/plain")
            .await
            .expect("seed");
    }

    /// Reads an object without recording an operation.
    pub async fn object(&self, path: &str) -> Option<Bytes> {
        self.inner.get(path).await.ok()
    }

    /// Returns every stored key, sorted.
    pub async fn keys(&self) -> Vec<String> {
        self.inner.list("").await.expect("list")
    }

    /// Returns all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StorageOp> {
        self.operations.lock().expect("lock").clone()
    }

    /// Returns recorded puts as `(path, size)` pairs.
    #[must_use]
    pub fn puts(&self) -> Vec<(String, usize)> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                StorageOp::Put { path, size, .. } => Some((path, size)),
                _ => None,
            })
            .collect()
    }

    /// Returns recorded delete batches.
    #[must_use]
    pub fn delete_batches(&self) -> Vec<Vec<String>> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                StorageOp::DeleteMany { paths } => Some(paths),
                _ => None,
            })
            .collect()
    }

    /// Clears recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().expect("lock").clear();
    }

    /// Injects a failure for every operation whose path starts with `prefix`.
    pub fn inject_failure(&self, prefix: impl Into<String>) {
        self.failures.lock().expect("lock").push(InjectedFailure {
            kind: None,
            prefix: prefix.into(),
        });
    }

    /// Injects a failure for one kind of operation on paths starting with `prefix`.
    ///
    /// For `DeleteMany`, the batch fails if any key in it matches.
    pub fn inject_failure_for(&self, kind: OpKind, prefix: impl Into<String>) {
        self.failures.lock().expect("lock").push(InjectedFailure {
            kind: Some(kind),
            prefix: prefix.into(),
        });
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        self.failures.lock().expect("lock").clear();
    }

    fn record(&self, op: StorageOp) {
        self.operations.lock().expect("lock").push(op);
    }

    fn check_failure(&self, kind: OpKind, path: &str) -> Result<()> {
        let failures = self.failures.lock().expect("lock");
        let hit = failures
            .iter()
            .any(|f| f.kind.is_none_or(|k| k == kind) && path.starts_with(&f.prefix));
        if hit {
            return Err(Error::storage(format!(
                "injected {kind:?} failure for path: {path}"
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl StorageBackend for TracingMemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        self.check_failure(OpKind::Get, path)?;
        self.record(StorageOp::Get {
            path: path.to_string(),
        });
        self.inner.get(path).await
    }

    async fn put(&self, path: &str, data: Bytes, content_type: &str) -> Result<()> {
        self.check_failure(OpKind::Put, path)?;
        self.record(StorageOp::Put {
            path: path.to_string(),
            size: data.len(),
            content_type: content_type.to_string(),
        });
        self.inner.put(path, data, content_type).await
    }

    async fn delete_many(&self, paths: &[String]) -> Result<()> {
        for path in paths {
            self.check_failure(OpKind::DeleteMany, path)?;
        }
        self.record(StorageOp::DeleteMany {
            paths: paths.to_vec(),
        });
        self.inner.delete_many(paths).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.check_failure(OpKind::List, prefix)?;
        self.record(StorageOp::List {
            prefix: prefix.to_string(),
        });
        self.inner.list(prefix).await
    }

    async fn list_with_delimiter(&self, prefix: &str) -> Result<ListResult> {
        self.check_failure(OpKind::ListWithDelimiter, prefix)?;
        self.record(StorageOp::ListWithDelimiter {
            prefix: prefix.to_string(),
        });
        self.inner.list_with_delimiter(prefix).await
    }
}
