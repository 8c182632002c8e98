//! Consolidator metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless a
//! recorder is installed (the `serve` command installs a Prometheus one).

use std::net::SocketAddr;
use std::sync::OnceLock;

use ::metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::summary::RunStats;

// ============================================================================
// Metric Names
// ============================================================================

/// Consolidation runs started.
pub const RUNS_TOTAL: &str = "consolidation_runs_total";

/// Runs that stopped on an error, labelled by error kind.
pub const ERRORS_TOTAL: &str = "consolidation_errors_total";

/// Fragment keys merged into consolidated logs.
pub const FRAGMENTS_MERGED_TOTAL: &str = "consolidation_fragments_merged_total";

/// Fragment bytes merged into consolidated logs.
pub const BYTES_MERGED_TOTAL: &str = "consolidation_bytes_merged_total";

/// Day groups merged.
pub const DAY_GROUPS_TOTAL: &str = "consolidation_day_groups_total";

/// Run duration in seconds.
pub const RUN_DURATION: &str = "consolidation_duration_seconds";

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Installs the Prometheus exporter listening on `addr`.
///
/// Safe to call multiple times; subsequent calls are no-ops.
///
/// # Errors
///
/// Returns an error if the exporter cannot bind or a recorder is already set.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    describe_counter!(RUNS_TOTAL, "Total consolidation runs");
    describe_counter!(ERRORS_TOTAL, "Total consolidation runs that stopped on an error");
    describe_counter!(FRAGMENTS_MERGED_TOTAL, "Total fragments merged");
    describe_counter!(BYTES_MERGED_TOTAL, "Total fragment bytes merged");
    describe_counter!(DAY_GROUPS_TOTAL, "Total day groups merged");
    describe_histogram!(RUN_DURATION, "Duration of consolidation runs in seconds");

    let _ = INSTALLED.set(());
    tracing::info!(address = %addr, "Prometheus metrics exporter installed");
    Ok(())
}

/// Records the outcome counters of one run, successful or not.
pub fn record_run(stats: &RunStats, duration_secs: f64) {
    counter!(RUNS_TOTAL).increment(1);
    counter!(FRAGMENTS_MERGED_TOTAL).increment(stats.fragments as u64);
    counter!(BYTES_MERGED_TOTAL).increment(stats.bytes as u64);
    counter!(DAY_GROUPS_TOTAL).increment(stats.day_groups as u64);
    histogram!(RUN_DURATION).record(duration_secs);
}

/// Records a run that stopped on an error.
pub fn record_error(kind: &'static str) {
    counter!(ERRORS_TOTAL, "kind" => kind).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        record_run(&RunStats::default(), 0.01);
        record_error("write");
    }
}
