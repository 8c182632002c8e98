//! # tblog-core
//!
//! Core abstractions for tblog, the daily log consolidation job.
//!
//! - **Storage Contract**: [`StorageBackend`] with in-memory and cloud implementations
//! - **Key Grammar**: fragment and consolidated key parsing/building
//! - **Error Types**: shared storage errors with a tagged not-found kind
//! - **Observability**: logging initialization and span helpers
//!
//! ## Example
//!
//! ```rust
//! use tblog_core::prelude::*;
//!
//! let layout = KeyLayout::default();
//! assert_eq!(layout.source_dir("tbcd1234"), "log/tbcd1234/");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod observability;
pub mod storage;
pub mod storage_keys;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::storage::{ListResult, MemoryBackend, ObjectStoreBackend, StorageBackend};
    pub use crate::storage_keys::{FragmentKey, KeyLayout};
}

pub use error::{Error, Result};
pub use observability::{LogFormat, init_logging};
pub use storage::{ListResult, MemoryBackend, ObjectStoreBackend, StorageBackend};
pub use storage_keys::{FragmentKey, KeyLayout};
