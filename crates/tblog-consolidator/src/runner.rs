//! Sequential consolidation runner.
//!
//! Processes one source at a time and, within a source, one day at a time.
//! The first failure stops the run; everything merged before it stays merged.

use std::sync::Arc;
use std::time::Instant;

use tblog_core::observability::{day_span, source_span};
use tblog_core::{KeyLayout, StorageBackend};
use tracing::Instrument;

use crate::config::ConsolidatorConfig;
use crate::enumerate::enumerate_sources;
use crate::error::{Result, RunFailure};
use crate::listing::list_fragments;
use crate::merge::DailyMerger;
use crate::metrics;
use crate::partition::partition_by_day;
use crate::summary::{DaySummary, RunReport, RunStats};

/// Runs the consolidation pipeline against one store.
#[derive(Clone)]
pub struct Consolidator {
    storage: Arc<dyn StorageBackend>,
    config: ConsolidatorConfig,
    layout: KeyLayout,
    merger: DailyMerger,
}

impl Consolidator {
    /// Creates a consolidator.
    ///
    /// # Errors
    ///
    /// Returns `ConsolidateError::Config` if the configuration is invalid.
    pub fn new(storage: Arc<dyn StorageBackend>, config: ConsolidatorConfig) -> Result<Self> {
        let layout = config.layout()?;
        let merger = DailyMerger::new(Arc::clone(&storage), config.clone());
        Ok(Self {
            storage,
            config,
            layout,
            merger,
        })
    }

    /// Runs the full pipeline once.
    ///
    /// # Errors
    ///
    /// Returns the first error along with the day groups completed before it.
    pub async fn run(&self) -> std::result::Result<RunReport, RunFailure> {
        let start = Instant::now();
        let mut stats = RunStats::default();
        let mut days = Vec::new();

        let outcome = self.run_inner(&mut stats, &mut days).await;

        stats.elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        metrics::record_run(&stats, start.elapsed().as_secs_f64());

        match outcome {
            Ok(()) => {
                tracing::info!(
                    elapsed_ms = stats.elapsed_ms,
                    sources = stats.sources,
                    day_groups = stats.day_groups,
                    fragments = stats.fragments,
                    bytes = stats.bytes,
                    dry_run = self.config.dry_run,
                    "Consolidation complete"
                );
                Ok(RunReport { days, stats })
            }
            Err(error) => {
                metrics::record_error(error.kind());
                tracing::error!(
                    error = %error,
                    kind = error.kind(),
                    completed = days.len(),
                    elapsed_ms = stats.elapsed_ms,
                    "Consolidation stopped"
                );
                Err(RunFailure {
                    error,
                    completed: days,
                })
            }
        }
    }

    async fn run_inner(&self, stats: &mut RunStats, days: &mut Vec<DaySummary>) -> Result<()> {
        let sources =
            enumerate_sources(self.storage.as_ref(), &self.layout, &self.config.source_prefix)
                .await?;
        stats.sources = sources.len();

        for source_id in &sources {
            self.consolidate_source(source_id, stats, days)
                .instrument(source_span(source_id))
                .await?;
        }
        Ok(())
    }

    /// Lists, partitions, and merges every day of one source.
    async fn consolidate_source(
        &self,
        source_id: &str,
        stats: &mut RunStats,
        days: &mut Vec<DaySummary>,
    ) -> Result<()> {
        let keys = list_fragments(self.storage.as_ref(), &self.layout, source_id).await?;
        let groups = partition_by_day(&self.layout, &keys);

        tracing::debug!(keys = keys.len(), day_groups = groups.len(), "Partitioned source");

        for group in &groups {
            let summary = self
                .merger
                .merge(group)
                .instrument(day_span(&group.source_id, group.date))
                .await?;
            stats.record(&summary);
            days.push(summary);
        }
        Ok(())
    }
}
