//! # tblog-consolidator
//!
//! Merges TB-Loader log fragments into daily logs.
//!
//! ## Usage
//!
//! ```bash
//! # One pass (the scheduled-job entry point)
//! tblog-consolidator --storage-bucket s3://acm-stats run
//!
//! # Plan without writing or deleting
//! tblog-consolidator --storage-bucket s3://acm-stats run --dry-run
//!
//! # Run on a timer with a Prometheus endpoint
//! tblog-consolidator --storage-bucket s3://acm-stats serve --interval-secs 3600 --metrics-port 9090
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use tblog_consolidator::{Consolidator, ConsolidatorConfig, metrics};
use tblog_core::storage::{MemoryBackend, ObjectStoreBackend, StorageBackend};
use tblog_core::{LogFormat, init_logging};

// ============================================================================
// CLI Arguments
// ============================================================================

/// TB-Loader daily log consolidator.
#[derive(Debug, Parser)]
#[command(name = "tblog-consolidator")]
#[command(about = "Consolidates TB-Loader log fragments into daily logs")]
#[command(version)]
struct Args {
    /// Object storage bucket (e.g., `s3://acm-stats`, `gs://acm-stats`, `memory://`).
    #[arg(long, env = "TBLOG_STORAGE_BUCKET", global = true)]
    storage_bucket: Option<String>,

    /// Root prefix holding fragments and daily logs.
    #[arg(long, env = "TBLOG_ROOT_PREFIX", default_value = "log", global = true)]
    root_prefix: String,

    /// Name prefix identifying loader directories under the root.
    #[arg(long, env = "TBLOG_SOURCE_PREFIX", default_value = "tbcd", global = true)]
    source_prefix: String,

    /// Maximum keys per delete request.
    #[arg(long, env = "TBLOG_DELETE_BATCH_SIZE", default_value = "1000", global = true)]
    delete_batch_size: usize,

    /// Log output format (`json` or `pretty`).
    #[arg(long, env = "TBLOG_LOG_FORMAT", default_value = "json", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a single consolidation pass and print the report as JSON.
    Run {
        /// Read and plan without writing or deleting.
        #[arg(long)]
        dry_run: bool,
    },

    /// Run consolidation passes on a fixed interval.
    Serve {
        /// Seconds between passes.
        #[arg(long, env = "TBLOG_INTERVAL_SECS", default_value = "3600")]
        interval_secs: u64,

        /// Port for the Prometheus metrics endpoint; disabled when unset.
        #[arg(long, env = "TBLOG_METRICS_PORT")]
        metrics_port: Option<u16>,
    },
}

impl Args {
    fn config(&self, dry_run: bool) -> ConsolidatorConfig {
        ConsolidatorConfig {
            root_prefix: self.root_prefix.clone(),
            source_prefix: self.source_prefix.clone(),
            delete_batch_size: self.delete_batch_size,
            dry_run,
            ..ConsolidatorConfig::default()
        }
    }

    fn storage(&self) -> Result<Arc<dyn StorageBackend>> {
        let bucket = self
            .storage_bucket
            .as_deref()
            .context("missing TBLOG_STORAGE_BUCKET")?;

        if bucket.starts_with("memory://") {
            tracing::warn!("Using in-memory storage; nothing will persist");
            return Ok(Arc::new(MemoryBackend::new()));
        }

        let backend = ObjectStoreBackend::from_bucket(bucket)
            .with_context(|| format!("failed to open storage bucket {bucket}"))?;
        Ok(Arc::new(backend))
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn run_once(consolidator: &Consolidator) -> Result<()> {
    match consolidator.run().await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(failure) => {
            println!("{}", serde_json::to_string_pretty(&failure.completed)?);
            if failure.error.wrote_artifact() {
                tracing::warn!(
                    "Daily log was written but some fragments remain; the next run merges them again"
                );
            } else {
                tracing::warn!("Failing day group left untouched; the next run retries it");
            }
            Err(failure.into())
        }
    }
}

async fn serve(consolidator: Consolidator, interval: Duration) {
    let mut interval_timer = tokio::time::interval(interval);
    interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval_timer.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                return;
            }
        }

        tracing::info!("Starting consolidation pass");
        // Failures are already logged and counted by the runner; the next tick retries.
        let _ = consolidator.run().await;
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_format);

    match args.command {
        Commands::Run { dry_run } => {
            let consolidator = Consolidator::new(args.storage()?, args.config(dry_run))?;
            if dry_run {
                tracing::info!("Dry run mode - no changes will be made");
            }
            run_once(&consolidator).await?;
        }

        Commands::Serve {
            interval_secs,
            metrics_port,
        } => {
            if let Some(port) = metrics_port {
                metrics::init_metrics(SocketAddr::from(([0, 0, 0, 0], port)))?;
            }

            let consolidator = Consolidator::new(args.storage()?, args.config(false))?;
            tracing::info!(
                interval_secs = interval_secs,
                root_prefix = %args.root_prefix,
                source_prefix = %args.source_prefix,
                "Starting consolidator service"
            );
            serve(consolidator, Duration::from_secs(interval_secs.max(1))).await;
        }
    }

    Ok(())
}
