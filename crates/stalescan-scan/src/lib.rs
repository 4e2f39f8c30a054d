//! Stale directory scanning engine for stalescan.
//!
//! # Overview
//!
//! `stalescan-scan` walks a directory tree once, bottom-up, and reports the
//! shallowest directories that are both large and stale:
//!
//! - **Post-order aggregation**: every directory's size and most recent
//!   timestamp cover its whole subtree
//! - **Pruning**: a matching directory swallows all matches beneath it
//! - **Cycle guard**: symlinked directories are checked against the active
//!   path by (device, inode)
//! - **Worker pool**: top-level subtrees can be spread across threads with
//!   results identical to a sequential run
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use stalescan_scan::{ScanConfig, ScanEngine};
//!
//! let config = ScanConfig::builder()
//!     .root("/data")
//!     .min_size(100u64 * 1024 * 1024 * 1024)
//!     .max_age(Duration::from_secs(60 * 24 * 60 * 60))
//!     .build()
//!     .unwrap();
//!
//! let result = ScanEngine::new().scan(&config).unwrap();
//! for record in &result.matches {
//!     println!("{} {} bytes", record.path.display(), record.size);
//! }
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! use stalescan_scan::ScanEngine;
//!
//! let engine = ScanEngine::new();
//! let mut progress_rx = engine.subscribe();
//!
//! std::thread::spawn(move || {
//!     while let Ok(progress) = progress_rx.blocking_recv() {
//!         println!("Scanned {} files", progress.files_scanned);
//!     }
//! });
//! ```

mod aggregate;
mod cycle;
mod engine;
mod meta;
mod progress;
mod scheduler;
mod walker;

pub use aggregate::{AggregatedScan, MatchAggregator};
pub use cycle::CycleGuard;
pub use engine::ScanEngine;
pub use progress::ScanProgress;
pub use scheduler::WorkerScheduler;
pub use walker::{DirectoryWalker, WalkOutcome, WalkReport};

// Re-export core types for convenience
pub use stalescan_core::{
    DirAggregate, InodeInfo, MatchRecord, ScanConfig, ScanError, ScanResult, ScanStats,
    ScanWarning, SortOrder, TimeBasis, WarningKind,
};
