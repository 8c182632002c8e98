//! # tblog-consolidator
//!
//! Consolidates per-session TB-Loader log fragments into one log per loader
//! per calendar day.
//!
//! Loaders upload small fragments named
//! `log/{loader}/{YYYYMMDD}T{HHMMSS[.fff]}Z.log`. Each run folds them, in
//! timestamp order, into `log/{YYYY}/{MM}/{loader}-{DD}.log`, appending to any
//! existing daily log, and then deletes the merged fragments.
//!
//! ## Pipeline
//!
//! ```text
//! enumerate_sources ─► list_fragments ─► partition_by_day ─► DailyMerger::merge
//!      (per run)          (per source)       (per source)          (per day)
//! ```
//!
//! Work is strictly sequential and stops at the first error; see
//! [`Consolidator::run`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tblog_consolidator::{Consolidator, ConsolidatorConfig};
//! use tblog_core::MemoryBackend;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let consolidator = Consolidator::new(Arc::new(MemoryBackend::new()), ConsolidatorConfig::default())?;
//! let report = consolidator.run().await?;
//! println!("merged {} fragments", report.stats.fragments);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod enumerate;
pub mod error;
pub mod listing;
pub mod merge;
pub mod metrics;
pub mod partition;
pub mod runner;
pub mod summary;

pub use config::ConsolidatorConfig;
pub use error::{ConsolidateError, Result, RunFailure};
pub use merge::DailyMerger;
pub use partition::{DayGroup, partition_by_day};
pub use runner::Consolidator;
pub use summary::{DaySummary, RunReport, RunStats};
