//! Key grammar for log fragments and consolidated daily logs.
//!
//! # Path Formats
//!
//! | Key | Format |
//! |-----|--------|
//! | Fragment | `{root}/{source_id}/{YYYYMMDD}T{HHMMSS[.fraction]}Z?.log` |
//! | Consolidated | `{root}/{YYYY}/{MM}/{source_id}-{DD}.log` |
//!
//! The default root is `log`. Fragment keys are matched case-insensitively;
//! consolidated keys always use the lowercased source id so repeated runs land
//! on the same object regardless of how the loader cased its prefix.
//!
//! # Example
//!
//! ```rust
//! use tblog_core::storage_keys::KeyLayout;
//!
//! let layout = KeyLayout::default();
//! let key = layout
//!     .parse_fragment("log/tbcd1234/20210730T131711.123Z.log")
//!     .expect("fragment key");
//!
//! assert_eq!(key.source_id(), "tbcd1234");
//! assert_eq!(
//!     layout.consolidated_key(key.source_id(), key.date()),
//!     "log/2021/07/tbcd1234-30.log"
//! );
//! ```

use chrono::NaiveDate;
use regex::Regex;

use crate::error::{Error, Result};

/// Default root prefix for fragments and consolidated logs.
pub const DEFAULT_ROOT_PREFIX: &str = "log";

/// Builds and parses keys under one root prefix.
#[derive(Debug, Clone)]
pub struct KeyLayout {
    root: String,
    fragment_re: Regex,
}

impl KeyLayout {
    /// Creates a layout rooted at `root` (without trailing `/`).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the root is empty or contains a path
    /// separator at either end.
    pub fn new(root: impl Into<String>) -> Result<Self> {
        let root = root.into();
        if root.is_empty() || root.starts_with('/') || root.ends_with('/') {
            return Err(Error::InvalidInput(format!(
                "root prefix must be non-empty without leading or trailing '/': {root:?}"
            )));
        }

        let pattern = format!(
            r"(?i)^{}/([^/]+)/(\d{{4}})(\d{{2}})(\d{{2}})T(\d{{6}}(?:\.\d+)?)Z?\.log$",
            regex::escape(&root)
        );
        let fragment_re = Regex::new(&pattern).map_err(|e| Error::Internal {
            message: format!("fragment pattern failed to compile: {e}"),
        })?;

        Ok(Self { root, fragment_re })
    }

    /// Returns the root prefix.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Returns the listing prefix for the root, e.g. `log/`.
    #[must_use]
    pub fn root_dir(&self) -> String {
        format!("{}/", self.root)
    }

    /// Returns the listing prefix for one source, e.g. `log/tbcd1234/`.
    #[must_use]
    pub fn source_dir(&self, source_id: &str) -> String {
        format!("{}/{source_id}/", self.root)
    }

    /// Returns the consolidated key for a source and calendar day.
    #[must_use]
    pub fn consolidated_key(&self, source_id: &str, date: NaiveDate) -> String {
        format!(
            "{}/{}/{}-{}.log",
            self.root,
            date.format("%Y/%m"),
            source_id.to_ascii_lowercase(),
            date.format("%d")
        )
    }

    /// Parses a fragment key.
    ///
    /// Returns `None` for keys that do not follow the fragment grammar or that
    /// name an impossible calendar date.
    #[must_use]
    pub fn parse_fragment(&self, path: &str) -> Option<FragmentKey> {
        let caps = self.fragment_re.captures(path)?;

        let year = caps.get(2)?.as_str().parse::<i32>().ok()?;
        let month = caps.get(3)?.as_str().parse::<u32>().ok()?;
        let day = caps.get(4)?.as_str().parse::<u32>().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;

        Some(FragmentKey {
            path: path.to_string(),
            source_id: caps.get(1)?.as_str().to_string(),
            date,
            time: caps.get(5)?.as_str().to_string(),
        })
    }
}

impl Default for KeyLayout {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self::new(DEFAULT_ROOT_PREFIX).expect("default root prefix is valid")
    }
}

/// A parsed fragment key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FragmentKey {
    path: String,
    source_id: String,
    date: NaiveDate,
    time: String,
}

impl FragmentKey {
    /// The full object key.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The source id segment, as it appears in the key.
    #[must_use]
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// The calendar day encoded in the timestamp.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// The `HHMMSS[.fraction]` part of the timestamp.
    #[must_use]
    pub fn time(&self) -> &str {
        &self.time
    }

    /// Consumes the key and returns the object path.
    #[must_use]
    pub fn into_path(self) -> String {
        self.path
    }
}

impl AsRef<str> for FragmentKey {
    fn as_ref(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}
