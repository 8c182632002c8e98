//! Custom assertion helpers for integration tests.

use crate::storage::{StorageOp, TracingMemoryBackend};

/// Asserts that no put or delete reached the store.
///
/// # Panics
///
/// Panics if any mutating operation was recorded.
pub fn assert_no_mutations(storage: &TracingMemoryBackend) {
    let mutations: Vec<StorageOp> = storage
        .operations()
        .into_iter()
        .filter(|op| matches!(op, StorageOp::Put { .. } | StorageOp::DeleteMany { .. }))
        .collect();
    assert!(
        mutations.is_empty(),
        "Expected no writes or deletes, got {mutations:?}"
    );
}

/// Asserts that no delete request reached the store.
///
/// # Panics
///
/// Panics if any delete was recorded.
pub fn assert_no_deletes(storage: &TracingMemoryBackend) {
    let batches = storage.delete_batches();
    assert!(batches.is_empty(), "Expected no deletes, got {batches:?}");
}

/// Asserts that every put to `path` happens before any delete.
///
/// # Panics
///
/// Panics if a delete precedes the put, or if there is no put to `path`.
pub fn assert_put_before_delete(storage: &TracingMemoryBackend, path: &str) {
    let ops = storage.operations();
    let put_idx = ops
        .iter()
        .position(|op| matches!(op, StorageOp::Put { path: p, .. } if p == path))
        .unwrap_or_else(|| panic!("Expected a put to {path}, got {ops:?}"));
    if let Some(delete_idx) = ops
        .iter()
        .position(|op| matches!(op, StorageOp::DeleteMany { .. }))
    {
        assert!(
            put_idx < delete_idx,
            "Expected put to {path} before any delete, got {ops:?}"
        );
    }
}

/// Asserts the flattened set of deleted keys, in request order.
///
/// # Panics
///
/// Panics if the deleted keys differ from `expected`.
pub fn assert_deleted(storage: &TracingMemoryBackend, expected: &[String]) {
    let deleted: Vec<String> = storage.delete_batches().into_iter().flatten().collect();
    assert_eq!(deleted, expected, "Unexpected deleted keys");
}
