//! Daily merge of one day group.
//!
//! # Protocol
//!
//! ```text
//! DailyMerger::merge(group)
//!     │
//!     ├── GET each fragment, in key order        (failure: nothing changes)
//!     │
//!     ├── GET the consolidated log               (missing: treated as empty)
//!     │
//!     ├── PUT prior + new                        (failure: nothing deleted)
//!     │     skipped when no fragment had content
//!     │
//!     └── DELETE fragments, batched              (failure: log already correct)
//! ```
//!
//! The write is a full replace of the consolidated key. Fragments are only
//! deleted after the write succeeded, so a failure at any step before the
//! delete leaves the store exactly as the next run needs to find it. If a
//! delete fails, the leftover fragments are merged a second time on the next
//! run: delivery into the consolidated log is at-least-once.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tblog_core::StorageBackend;

use crate::config::ConsolidatorConfig;
use crate::error::{ConsolidateError, Result};
use crate::partition::DayGroup;
use crate::summary::DaySummary;

/// Fragment content concatenated for one day group.
#[derive(Debug, Default)]
pub struct MergedDay {
    /// Existing consolidated content, newline-terminated when non-empty.
    pub prior_log: Bytes,
    /// This run's fragments, each newline-terminated, in key order.
    pub log: Bytes,
    /// Fragments listed but gone by the time they were read.
    pub missing: usize,
}

impl MergedDay {
    /// The content to write: prior content first, then the new fragments.
    #[must_use]
    pub fn combined(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.prior_log.len() + self.log.len());
        out.extend_from_slice(&self.prior_log);
        out.extend_from_slice(&self.log);
        out.freeze()
    }
}

/// Appends `data` to `out`, adding a trailing newline if it lacks one.
///
/// Empty data contributes nothing.
fn append_line_terminated(out: &mut BytesMut, data: &[u8]) {
    if data.is_empty() {
        return;
    }
    out.extend_from_slice(data);
    if data.last() != Some(&b'\n') {
        out.extend_from_slice(b"\n");
    }
}

/// Merges day groups into their consolidated logs.
#[derive(Clone)]
pub struct DailyMerger {
    storage: Arc<dyn StorageBackend>,
    config: ConsolidatorConfig,
}

impl DailyMerger {
    /// Creates a merger writing through `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, config: ConsolidatorConfig) -> Self {
        Self { storage, config }
    }

    /// Reads the group's fragments and the existing consolidated log.
    ///
    /// # Errors
    ///
    /// Returns `FragmentRead` or `PriorRead` for any read failure other than a
    /// missing object.
    pub async fn read(&self, group: &DayGroup) -> Result<MergedDay> {
        let mut log = BytesMut::new();
        let mut missing = 0;

        for key in &group.members {
            match self.storage.get(key).await {
                Ok(data) => append_line_terminated(&mut log, &data),
                Err(e) if e.is_not_found() => {
                    tracing::warn!(key = %key, "Fragment vanished after listing; skipping");
                    missing += 1;
                }
                Err(source) => {
                    return Err(ConsolidateError::FragmentRead {
                        key: key.clone(),
                        source,
                    });
                }
            }
        }

        let prior_log = match self.storage.get(&group.consolidated_key).await {
            Ok(data) => {
                let mut prior = BytesMut::with_capacity(data.len() + 1);
                append_line_terminated(&mut prior, &data);
                prior.freeze()
            }
            Err(e) if e.is_not_found() => Bytes::new(),
            Err(source) => {
                return Err(ConsolidateError::PriorRead {
                    key: group.consolidated_key.clone(),
                    source,
                });
            }
        };

        Ok(MergedDay {
            prior_log,
            log: log.freeze(),
            missing,
        })
    }

    /// Merges one day group: read, write `prior + new`, then delete fragments.
    ///
    /// In dry-run mode the reads happen and the summary is computed, but
    /// nothing is written or deleted.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error. Fragments are never deleted
    /// unless the write succeeded.
    pub async fn merge(&self, group: &DayGroup) -> Result<DaySummary> {
        let merged = self.read(group).await?;
        let content = merged.combined();

        let mut summary = DaySummary {
            source_id: group.source_id.clone(),
            date: group.date,
            consolidated_key: group.consolidated_key.clone(),
            fragments: group.members.len(),
            fragments_missing: merged.missing,
            new_bytes: merged.log.len(),
            prior_bytes: merged.prior_log.len(),
            written_bytes: if merged.log.is_empty() { 0 } else { content.len() },
            deleted: 0,
            dry_run: self.config.dry_run,
        };

        if self.config.dry_run {
            tracing::info!(
                key = %group.consolidated_key,
                fragments = summary.fragments,
                bytes = summary.written_bytes,
                "Dry run; skipping write and delete"
            );
            return Ok(summary);
        }

        if merged.log.is_empty() {
            tracing::debug!(
                key = %group.consolidated_key,
                missing = summary.fragments_missing,
                "No new content; skipping write"
            );
        } else {
            self.storage
                .put(&group.consolidated_key, content, &self.config.content_type)
                .await
                .map_err(|source| ConsolidateError::Write {
                    key: group.consolidated_key.clone(),
                    source,
                })?;

            tracing::debug!(
                key = %group.consolidated_key,
                bytes = summary.written_bytes,
                "Wrote consolidated log"
            );
        }

        let batch_size = self.config.delete_batch_size.max(1);
        for (idx, batch) in group.members.chunks(batch_size).enumerate() {
            self.storage
                .delete_many(batch)
                .await
                .map_err(|source| ConsolidateError::Delete {
                    key: group.consolidated_key.clone(),
                    pending: group.members.len() - idx * batch_size,
                    source,
                })?;
            summary.deleted += batch.len();
        }

        tracing::info!(
            key = %group.consolidated_key,
            fragments = summary.fragments,
            new_bytes = summary.new_bytes,
            prior_bytes = summary.prior_bytes,
            "Merged day"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tblog_core::KeyLayout;
    use tblog_test_utils::{OpKind, StorageOp, TestContext, assert_no_deletes};

    use crate::partition::partition_by_day;

    async fn canonical_group(ctx: &TestContext) -> DayGroup {
        let keys = ctx.seed_canonical_day().await;
        let mut groups = partition_by_day(&KeyLayout::default(), &keys);
        assert_eq!(groups.len(), 1);
        groups.remove(0)
    }

    fn merger(ctx: &TestContext) -> DailyMerger {
        DailyMerger::new(ctx.backend(), ConsolidatorConfig::default())
    }

    #[test]
    fn line_termination_is_added_once() {
        let mut out = BytesMut::new();
        append_line_terminated(&mut out, b"a");
        append_line_terminated(&mut out, b"b\n");
        append_line_terminated(&mut out, b"");
        append_line_terminated(&mut out, b"c\r\n");
        assert_eq!(&out[..], b"a\nb\nc\r\n");
    }

    #[tokio::test]
    async fn read_concatenates_in_key_order() {
        let ctx = TestContext::new();
        let group = canonical_group(&ctx).await;

        let merged = merger(&ctx).read(&group).await.unwrap();

        assert_eq!(merged.log, Bytes::from("hello\nworld\n"));
        assert!(merged.prior_log.is_empty());
        assert_eq!(merged.missing, 0);
    }

    #[tokio::test]
    async fn prior_content_comes_first() {
        let ctx = TestContext::new();
        let group = canonical_group(&ctx).await;
        ctx.storage
            .seed(&group.consolidated_key, "previous")
            .await;

        let summary = merger(&ctx).merge(&group).await.unwrap();

        assert_eq!(
            ctx.storage.object(&group.consolidated_key).await.unwrap(),
            Bytes::from("previous\nhello\nworld\n")
        );
        assert_eq!(summary.prior_bytes, 9);
        assert_eq!(summary.new_bytes, 12);
        assert_eq!(summary.written_bytes, 21);
    }

    #[tokio::test]
    async fn vanished_fragment_is_skipped() {
        let ctx = TestContext::new();
        let mut group = canonical_group(&ctx).await;
        group
            .members
            .insert(1, "log/tbcd1234/20210730T135000Z.log".to_string());

        let summary = merger(&ctx).merge(&group).await.unwrap();

        assert_eq!(summary.fragments, 3);
        assert_eq!(summary.fragments_missing, 1);
        assert_eq!(summary.deleted, 3);
        assert_eq!(
            ctx.storage.object(&group.consolidated_key).await.unwrap(),
            Bytes::from("hello\nworld\n")
        );
    }

    #[tokio::test]
    async fn fragment_read_failure_leaves_store_untouched() {
        let ctx = TestContext::new();
        let group = canonical_group(&ctx).await;
        ctx.storage
            .inject_failure_for(OpKind::Get, "log/tbcd1234/20210730T140000Z.log");

        let err = merger(&ctx).merge(&group).await.unwrap_err();

        assert!(matches!(err, ConsolidateError::FragmentRead { ref key, .. }
            if key == "log/tbcd1234/20210730T140000Z.log"));
        assert!(ctx.storage.puts().is_empty());
        assert_no_deletes(&ctx.storage);
    }

    #[tokio::test]
    async fn prior_read_failure_is_not_treated_as_empty() {
        let ctx = TestContext::new();
        let group = canonical_group(&ctx).await;
        ctx.storage
            .inject_failure_for(OpKind::Get, group.consolidated_key.clone());

        let err = merger(&ctx).merge(&group).await.unwrap_err();

        assert!(matches!(err, ConsolidateError::PriorRead { .. }));
        assert!(ctx.storage.puts().is_empty());
        assert_no_deletes(&ctx.storage);
    }

    #[tokio::test]
    async fn write_failure_prevents_deletes() {
        let ctx = TestContext::new();
        let group = canonical_group(&ctx).await;
        ctx.storage
            .inject_failure_for(OpKind::Put, group.consolidated_key.clone());

        let err = merger(&ctx).merge(&group).await.unwrap_err();

        assert!(matches!(err, ConsolidateError::Write { .. }));
        assert_no_deletes(&ctx.storage);
        for key in &group.members {
            assert!(ctx.storage.object(key).await.is_some());
        }
    }

    #[tokio::test]
    async fn delete_failure_keeps_written_log() {
        let ctx = TestContext::new();
        let group = canonical_group(&ctx).await;
        ctx.storage
            .inject_failure_for(OpKind::DeleteMany, "log/tbcd1234/");

        let err = merger(&ctx).merge(&group).await.unwrap_err();

        assert!(matches!(err, ConsolidateError::Delete { pending: 2, .. }));
        assert_eq!(
            ctx.storage.object(&group.consolidated_key).await.unwrap(),
            Bytes::from("hello\nworld\n")
        );
    }

    #[tokio::test]
    async fn deletes_are_batched() {
        let ctx = TestContext::new();
        let mut keys = Vec::new();
        for minute in 0..5 {
            keys.push(
                ctx.seed_fragment("tbcd0007", &format!("20210102T00{minute:02}00Z"), "x")
                    .await,
            );
        }
        let group = partition_by_day(&KeyLayout::default(), &keys).remove(0);
        let config = ConsolidatorConfig {
            delete_batch_size: 2,
            ..ConsolidatorConfig::default()
        };

        let summary = DailyMerger::new(ctx.backend(), config)
            .merge(&group)
            .await
            .unwrap();

        assert_eq!(summary.deleted, 5);
        assert_eq!(
            ctx.storage.delete_batches(),
            vec![keys[0..2].to_vec(), keys[2..4].to_vec(), keys[4..].to_vec()]
        );
    }

    #[tokio::test]
    async fn dry_run_reads_but_never_mutates() {
        let ctx = TestContext::new();
        let group = canonical_group(&ctx).await;
        let config = ConsolidatorConfig {
            dry_run: true,
            ..ConsolidatorConfig::default()
        };

        let summary = DailyMerger::new(ctx.backend(), config)
            .merge(&group)
            .await
            .unwrap();

        assert!(summary.dry_run);
        assert_eq!(summary.written_bytes, 12);
        assert_eq!(summary.deleted, 0);
        assert!(
            ctx.storage
                .operations()
                .iter()
                .all(|op| matches!(op, StorageOp::Get { .. }))
        );
    }

    #[tokio::test]
    async fn content_type_is_applied() {
        let ctx = TestContext::new();
        let group = canonical_group(&ctx).await;

        merger(&ctx).merge(&group).await.unwrap();

        assert!(ctx.storage.operations().iter().any(|op| matches!(
            op,
            StorageOp::Put { content_type, .. } if content_type == "text/plain"
        )));
    }

    #[tokio::test]
    async fn day_without_content_is_not_written() {
        let ctx = TestContext::new();
        let empty = ctx.seed_fragment("tbcd1", "20210730T000000Z", "").await;
        let group = DayGroup {
            source_id: "tbcd1".into(),
            date: NaiveDate::from_ymd_opt(2021, 7, 30).unwrap(),
            members: vec![empty.clone(), "log/tbcd1/20210730T010000Z.log".into()],
            consolidated_key: "log/2021/07/tbcd1-30.log".into(),
        };

        let summary = merger(&ctx).merge(&group).await.unwrap();

        assert!(ctx.storage.puts().is_empty());
        assert!(ctx.storage.object(&group.consolidated_key).await.is_none());
        assert_eq!(summary.written_bytes, 0);
        assert_eq!(summary.fragments_missing, 1);
        assert_eq!(ctx.storage.delete_batches(), vec![group.members.clone()]);
        assert!(ctx.storage.object(&empty).await.is_none());
    }
}
