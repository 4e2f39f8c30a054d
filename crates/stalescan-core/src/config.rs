//! Scan configuration types.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ScanError;

/// Default minimum size of a reported directory (10 GiB).
const DEFAULT_MIN_SIZE: u64 = 10 * 1024 * 1024 * 1024;

/// Default age threshold (180 days).
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(180 * 24 * 60 * 60);

/// Default number of error entries retained in a result.
const DEFAULT_ERROR_LIMIT: usize = 200;

/// Which file timestamp decides whether a file was recently touched.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TimeBasis {
    /// Last modification time.
    #[default]
    Mtime,
    /// Last access time.
    Atime,
    /// Last status change time.
    Ctime,
}

/// Configuration for a stale directory scan.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Root path to scan.
    pub root: PathBuf,

    /// Minimum aggregate size, in bytes, for a directory to be reported.
    #[builder(default = "DEFAULT_MIN_SIZE")]
    #[serde(default = "default_min_size")]
    pub min_size: u64,

    /// Minimum time since the most recently touched file in a subtree.
    #[builder(default = "DEFAULT_MAX_AGE")]
    #[serde(default = "default_max_age")]
    pub max_age: Duration,

    /// Timestamp used to judge recency.
    #[builder(default)]
    #[serde(default)]
    pub time_basis: TimeBasis,

    /// Follow symbolic links (cycle detection enabled).
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Stay on the filesystem of the root path.
    #[builder(default = "false")]
    #[serde(default)]
    pub one_filesystem: bool,

    /// Number of workers (1 = sequential).
    #[builder(default = "1")]
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum number of error entries kept in the result.
    #[builder(default = "DEFAULT_ERROR_LIMIT")]
    #[serde(default = "default_error_limit")]
    pub error_limit: usize,

    /// Reference time for ages (None = clock at scan start).
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    pub reference_time: Option<SystemTime>,
}

fn default_min_size() -> u64 {
    DEFAULT_MIN_SIZE
}

fn default_max_age() -> Duration {
    DEFAULT_MAX_AGE
}

fn default_workers() -> usize {
    1
}

fn default_error_limit() -> usize {
    DEFAULT_ERROR_LIMIT
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err("Root path cannot be empty".to_string());
            }
            None => return Err("Root path is required".to_string()),
            Some(_) => {}
        }

        let workers = self.workers.unwrap_or(1);
        if workers == 0 {
            return Err("Worker count must be at least 1".to_string());
        }
        if workers > 1 && self.follow_symlinks.unwrap_or(false) {
            return Err("Parallel workers cannot be combined with following symlinks".to_string());
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a config for scanning a path with default thresholds.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            min_size: DEFAULT_MIN_SIZE,
            max_age: DEFAULT_MAX_AGE,
            time_basis: TimeBasis::default(),
            follow_symlinks: false,
            one_filesystem: false,
            workers: 1,
            error_limit: DEFAULT_ERROR_LIMIT,
            reference_time: None,
        }
    }

    /// Check the invariants that must hold before any traversal starts.
    ///
    /// Configs built through [`ScanConfigBuilder`] are already checked, but
    /// configs assembled by hand or deserialized are not.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.root.as_os_str().is_empty() {
            return Err(ScanError::invalid_config("root path cannot be empty"));
        }
        if self.workers == 0 {
            return Err(ScanError::invalid_config("worker count must be at least 1"));
        }
        if self.is_parallel() && self.follow_symlinks {
            return Err(ScanError::invalid_config(format!(
                "--workers {} cannot be combined with --follow-symlinks",
                self.workers
            )));
        }
        Ok(())
    }

    /// Whether this config fans out over multiple workers.
    pub fn is_parallel(&self) -> bool {
        self.workers > 1
    }

    /// The latest timestamp that still counts as stale relative to `now`.
    pub fn cutoff(&self, now: SystemTime) -> SystemTime {
        now.checked_sub(self.max_age)
            .filter(|t| *t >= SystemTime::UNIX_EPOCH)
            .unwrap_or(SystemTime::UNIX_EPOCH)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
