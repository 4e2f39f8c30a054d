//! Scan results and statistics.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::config::ScanConfig;
use crate::error::ScanWarning;
use crate::record::{DirAggregate, MatchRecord};

/// Counters collected while walking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Directories listed.
    pub dirs_scanned: u64,
    /// Regular files counted.
    pub files_scanned: u64,
    /// Symbolic links skipped because links are not followed.
    pub skipped_symlinks: u64,
    /// Directories skipped because they live on another filesystem.
    pub skipped_other_fs: u64,
    /// Symlinked directories skipped because they lead back to an ancestor.
    pub skipped_cycles: u64,
    /// Total number of per-subtree errors, including ones not retained.
    pub errors: u64,
}

impl ScanStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add another set of counters into this one.
    pub fn merge(&mut self, other: &ScanStats) {
        self.dirs_scanned += other.dirs_scanned;
        self.files_scanned += other.files_scanned;
        self.skipped_symlinks += other.skipped_symlinks;
        self.skipped_other_fs += other.skipped_other_fs;
        self.skipped_cycles += other.skipped_cycles;
        self.errors += other.errors;
    }
}

/// Presentation order for matches.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortOrder {
    /// Largest first, ties by path.
    #[default]
    Size,
    /// Oldest first, ties by path.
    Age,
    /// Path order.
    Path,
}

impl SortOrder {
    /// Sort matches in place. The sort is stable and total, so equal
    /// inputs always produce the same order.
    pub fn sort(self, matches: &mut [MatchRecord]) {
        match self {
            SortOrder::Size => {
                matches.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)))
            }
            SortOrder::Age => {
                matches.sort_by(|a, b| a.newest.cmp(&b.newest).then_with(|| a.path.cmp(&b.path)))
            }
            SortOrder::Path => matches.sort_by(|a, b| a.path.cmp(&b.path)),
        }
    }
}

/// Outcome of a complete scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// Non-overlapping matches, largest first.
    pub matches: Vec<MatchRecord>,

    /// Per-subtree errors (at most `config.error_limit`).
    pub warnings: Vec<ScanWarning>,

    /// Symlinked directories skipped as cycles (at most `config.error_limit`).
    pub cycles: Vec<PathBuf>,

    /// Walk counters.
    pub stats: ScanStats,

    /// Aggregate of the scan root itself.
    pub root: DirAggregate,

    /// Time that ages were measured against.
    pub reference_time: SystemTime,

    /// Duration of the scan.
    pub scan_duration: Duration,

    /// Scan configuration used.
    pub config: ScanConfig,

    /// The scan was stopped before it finished.
    pub interrupted: bool,
}

impl ScanResult {
    /// Check if any directory matched.
    pub fn has_matches(&self) -> bool {
        !self.matches.is_empty()
    }

    /// Check if any subtree could not be read.
    pub fn has_warnings(&self) -> bool {
        self.stats.errors > 0
    }

    /// Combined size of all matches.
    pub fn total_match_size(&self) -> u64 {
        self.matches.iter().map(|m| m.size).sum()
    }

    /// Latest timestamp that counted as stale.
    pub fn cutoff(&self) -> SystemTime {
        self.config.cutoff(self.reference_time)
    }
}
