//! Scan progress reporting.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

/// Files between two progress snapshots.
const PROGRESS_INTERVAL: u64 = 1000;

/// Progress information during a scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Number of files scanned so far.
    pub files_scanned: u64,
    /// Number of directories scanned so far.
    pub dirs_scanned: u64,
    /// Total bytes scanned so far.
    pub bytes_scanned: u64,
    /// Path of the file that triggered this snapshot.
    pub current_path: PathBuf,
    /// Number of errors encountered.
    pub errors_count: u64,
    /// Time elapsed since scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            files_scanned: 0,
            dirs_scanned: 0,
            bytes_scanned: 0,
            current_path: PathBuf::new(),
            errors_count: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Calculate scan rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_scanned as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Get total items scanned (files + dirs).
    pub fn total_items(&self) -> u64 {
        self.files_scanned + self.dirs_scanned
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters shared by every walker of one scan.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    start_time: Instant,
    files_scanned: AtomicU64,
    dirs_scanned: AtomicU64,
    bytes_scanned: AtomicU64,
    errors_count: AtomicU64,
    tx: broadcast::Sender<ScanProgress>,
}

impl ProgressTracker {
    pub fn new(tx: broadcast::Sender<ScanProgress>) -> Self {
        Self {
            start_time: Instant::now(),
            files_scanned: AtomicU64::new(0),
            dirs_scanned: AtomicU64::new(0),
            bytes_scanned: AtomicU64::new(0),
            errors_count: AtomicU64::new(0),
            tx,
        }
    }

    pub fn record_file(&self, size: u64, path: &Path) {
        self.bytes_scanned.fetch_add(size, Ordering::Relaxed);
        let count = self.files_scanned.fetch_add(1, Ordering::Relaxed) + 1;
        if count % PROGRESS_INTERVAL == 0 {
            self.publish(path);
        }
    }

    pub fn record_dir(&self) {
        self.dirs_scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Send a snapshot to subscribers. No subscribers is fine.
    pub fn publish(&self, path: &Path) {
        let _ = self.tx.send(self.snapshot(path));
    }

    pub fn snapshot(&self, path: &Path) -> ScanProgress {
        ScanProgress {
            files_scanned: self.files_scanned.load(Ordering::Relaxed),
            dirs_scanned: self.dirs_scanned.load(Ordering::Relaxed),
            bytes_scanned: self.bytes_scanned.load(Ordering::Relaxed),
            current_path: path.to_path_buf(),
            errors_count: self.errors_count.load(Ordering::Relaxed),
            elapsed: self.start_time.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_publishes_every_interval() {
        let (tx, mut rx) = broadcast::channel(16);
        let tracker = ProgressTracker::new(tx);

        for _ in 0..PROGRESS_INTERVAL - 1 {
            tracker.record_file(2, Path::new("/data/file"));
        }
        assert!(rx.try_recv().is_err());

        tracker.record_file(2, Path::new("/data/last"));
        let progress = rx.try_recv().unwrap();
        assert_eq!(progress.files_scanned, PROGRESS_INTERVAL);
        assert_eq!(progress.bytes_scanned, PROGRESS_INTERVAL * 2);
        assert_eq!(progress.current_path, PathBuf::from("/data/last"));
    }

    #[test]
    fn test_snapshot_counts() {
        let (tx, _) = broadcast::channel(1);
        let tracker = ProgressTracker::new(tx);
        tracker.record_dir();
        tracker.record_dir();
        tracker.record_error();

        let progress = tracker.snapshot(Path::new("/data"));
        assert_eq!(progress.dirs_scanned, 2);
        assert_eq!(progress.errors_count, 1);
        assert_eq!(progress.total_items(), 2);
    }
}
