//! Scan orchestration.

use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use tokio::sync::broadcast;
use tracing::info;

use stalescan_core::{ScanConfig, ScanError, ScanResult};

use crate::aggregate::{AggregatedScan, MatchAggregator};
use crate::meta::{get_dev, identity};
use crate::progress::{ProgressTracker, ScanProgress};
use crate::scheduler::WorkerScheduler;
use crate::walker::DirectoryWalker;

/// Entry point for stale directory scans.
///
/// Validates configuration, then runs either one sequential walker or the
/// worker pool, and returns the merged result.
pub struct ScanEngine {
    progress_tx: broadcast::Sender<ScanProgress>,
    stop: Arc<AtomicBool>,
}

impl ScanEngine {
    /// Create a new engine.
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            progress_tx,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Flag that stops a running scan when set.
    ///
    /// Walkers stop listing new directories and return what they have
    /// counted so far; the result is marked as interrupted.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Perform a scan.
    ///
    /// Configuration conflicts and an inaccessible root are returned as
    /// errors before any traversal; everything that goes wrong below the
    /// root is recorded in the result instead.
    pub fn scan(&self, config: &ScanConfig) -> Result<ScanResult, ScanError> {
        config.validate()?;

        let start = Instant::now();
        let root_path = config
            .root
            .canonicalize()
            .map_err(|e| ScanError::io(&config.root, e))?;

        let root_metadata = fs::metadata(&root_path).map_err(|e| ScanError::io(&root_path, e))?;
        if !root_metadata.is_dir() {
            return Err(ScanError::NotADirectory { path: root_path });
        }
        check_readable(&root_path)?;

        let now = config.reference_time.unwrap_or_else(SystemTime::now);
        let boundary = config.one_filesystem.then(|| get_dev(&root_metadata));
        let tracker = ProgressTracker::new(self.progress_tx.clone());
        let walker = DirectoryWalker::new(config, now, boundary, &tracker, &self.stop);

        let merged: AggregatedScan = if config.is_parallel() {
            WorkerScheduler::new(&walker, config.workers).run(root_path.clone(), identity(&root_metadata))
        } else {
            let outcome = walker.walk_dir(root_path.clone(), identity(&root_metadata));
            let mut aggregator = MatchAggregator::new(config.error_limit);
            let root = aggregator.add_outcome(outcome);
            aggregator.finish(root)
        };

        tracker.publish(&root_path);
        let scan_duration = start.elapsed();

        info!(
            root = %root_path.display(),
            matches = merged.matches.len(),
            dirs = merged.stats.dirs_scanned,
            files = merged.stats.files_scanned,
            errors = merged.stats.errors,
            elapsed_ms = scan_duration.as_millis() as u64,
            "scan finished"
        );

        Ok(ScanResult {
            matches: merged.matches,
            warnings: merged.warnings,
            cycles: merged.cycles,
            stats: merged.stats,
            root: merged.root,
            reference_time: now,
            scan_duration,
            config: config.clone(),
            interrupted: merged.interrupted,
        })
    }
}

impl Default for ScanEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// An unlistable root is fatal, unlike an unlistable subdirectory.
fn check_readable(root: &Path) -> Result<(), ScanError> {
    fs::read_dir(root)
        .map(|_| ())
        .map_err(|e| ScanError::io(root, e))
}
