//! Per-directory aggregates and match records.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::config::ScanConfig;

/// Physical identity of a filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InodeInfo {
    /// Inode number.
    pub inode: u64,
    /// Device ID.
    pub device: u64,
}

impl InodeInfo {
    /// Create new inode info.
    pub fn new(inode: u64, device: u64) -> Self {
        Self { inode, device }
    }
}

/// Size and recency summary of a directory's entire subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirAggregate {
    /// Directory path.
    pub path: PathBuf,
    /// Sum of regular file sizes in the subtree.
    pub size: u64,
    /// Most recent time-basis timestamp of any file in the subtree.
    pub newest: Option<SystemTime>,
    /// Number of files counted in the subtree.
    pub file_count: u64,
    /// Number of directories below this one.
    pub dir_count: u64,
    /// Some part of the subtree could not be read.
    pub has_error: bool,
    /// Physical identity of the directory itself.
    pub identity: InodeInfo,
}

impl DirAggregate {
    /// Create an empty aggregate for a directory.
    pub fn new(path: impl Into<PathBuf>, identity: InodeInfo) -> Self {
        Self {
            path: path.into(),
            size: 0,
            newest: None,
            file_count: 0,
            dir_count: 0,
            has_error: false,
            identity,
        }
    }

    /// Count one regular file directly inside this directory.
    pub fn add_file(&mut self, size: u64, timestamp: Option<SystemTime>) {
        self.size = self.size.saturating_add(size);
        self.file_count += 1;
        if let Some(t) = timestamp {
            self.touch(t);
        }
    }

    /// Raise the recency of this subtree to at least `timestamp`.
    pub fn touch(&mut self, timestamp: SystemTime) {
        if self.newest.is_none_or(|newest| timestamp > newest) {
            self.newest = Some(timestamp);
        }
    }

    /// Fold a finished child subtree into this one.
    pub fn absorb(&mut self, child: &DirAggregate) {
        self.size = self.size.saturating_add(child.size);
        self.file_count += child.file_count;
        self.dir_count += child.dir_count + 1;
        self.has_error |= child.has_error;
        if let Some(t) = child.newest {
            self.touch(t);
        }
    }

    /// Time elapsed since the newest file was touched.
    ///
    /// Timestamps later than `now` give an age of zero.
    pub fn age(&self, now: SystemTime) -> Option<Duration> {
        self.newest
            .map(|newest| now.duration_since(newest).unwrap_or(Duration::ZERO))
    }

    /// Produce a match if this subtree is both large enough and stale enough.
    ///
    /// A subtree without any files has no recency and never matches.
    pub fn evaluate(&self, config: &ScanConfig, now: SystemTime) -> Option<MatchRecord> {
        if self.size < config.min_size {
            return None;
        }
        let newest = self.newest?;
        let age = self.age(now)?;
        if age < config.max_age {
            return None;
        }
        Some(MatchRecord {
            path: self.path.clone(),
            size: self.size,
            newest,
            age,
            file_count: self.file_count,
            incomplete: self.has_error,
        })
    }
}

/// A directory reported as large and stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Directory path.
    pub path: PathBuf,
    /// Aggregate size in bytes.
    pub size: u64,
    /// When the most recently touched file was touched.
    pub newest: SystemTime,
    /// Age of the newest file at scan time.
    pub age: Duration,
    /// Number of files in the subtree.
    pub file_count: u64,
    /// Parts of the subtree could not be read, so the size is a lower bound.
    pub incomplete: bool,
}

impl MatchRecord {
    /// Whether this record's directory strictly contains `path`.
    pub fn contains(&self, path: &Path) -> bool {
        path != self.path && path.starts_with(&self.path)
    }
}
