//! Post-order directory walker.
//!
//! The walker keeps an explicit stack of [`Frame`]s instead of recursing, so
//! deep trees cannot overflow the thread stack. Each frame lists its
//! directory once: files are folded into the frame's aggregate right away and
//! subdirectories are queued. When a frame has no queued children left it is
//! finished, the match rule is applied, and its aggregate and surviving
//! matches are handed to the parent frame.

use std::fs::{self, DirEntry, Metadata};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use tracing::{debug, info, trace};

use stalescan_core::{DirAggregate, InodeInfo, MatchRecord, ScanConfig, ScanStats, ScanWarning};

use crate::cycle::CycleGuard;
use crate::meta::{get_dev, identity, timestamp};
use crate::progress::ProgressTracker;

/// Everything a walk reports besides its aggregate and matches.
#[derive(Debug, Default)]
pub struct WalkReport {
    /// Per-subtree errors, capped at the configured limit.
    pub warnings: Vec<ScanWarning>,
    /// Symlinked directories skipped as cycles, capped at the same limit.
    pub cycles: Vec<PathBuf>,
    /// Walk counters.
    pub stats: ScanStats,
    /// The stop flag was raised before the walk finished.
    pub interrupted: bool,
}

/// Result of walking one subtree.
#[derive(Debug)]
pub struct WalkOutcome {
    /// Aggregate of the subtree root.
    pub aggregate: DirAggregate,
    /// Shallowest matches inside the subtree (or the root alone).
    pub matches: Vec<MatchRecord>,
    /// Errors, cycle skips and counters.
    pub report: WalkReport,
}

/// One directory being processed.
#[derive(Debug)]
pub(crate) struct Frame {
    pub aggregate: DirAggregate,
    /// Subdirectories not yet visited.
    pub pending: Vec<(PathBuf, InodeInfo)>,
    /// Matches surfaced by finished children.
    pub matches: Vec<MatchRecord>,
    /// Whether this directory was entered into the cycle guard.
    guarded: bool,
}

impl Frame {
    fn new(path: PathBuf, identity: InodeInfo, guarded: bool) -> Self {
        Self {
            aggregate: DirAggregate::new(path, identity),
            pending: Vec::new(),
            matches: Vec::new(),
            guarded,
        }
    }

    /// Fold a finished child into this frame.
    pub fn absorb(&mut self, child: &DirAggregate, matches: Vec<MatchRecord>) {
        self.aggregate.absorb(child);
        self.matches.extend(matches);
    }

    /// Apply the match rule to the completed directory.
    ///
    /// A matching directory replaces every match found beneath it.
    pub fn finish(self, config: &ScanConfig, now: SystemTime) -> (DirAggregate, Vec<MatchRecord>) {
        match self.aggregate.evaluate(config, now) {
            Some(record) => {
                if !self.matches.is_empty() {
                    trace!(
                        path = %record.path.display(),
                        subsumed = self.matches.len(),
                        "match subsumes nested matches"
                    );
                }
                (self.aggregate, vec![record])
            }
            None => (self.aggregate, self.matches),
        }
    }
}

/// Walks one subtree, computing aggregates and shallowest matches.
pub struct DirectoryWalker<'a> {
    config: &'a ScanConfig,
    now: SystemTime,
    boundary: Option<u64>,
    progress: &'a ProgressTracker,
    stop: &'a AtomicBool,
}

impl<'a> DirectoryWalker<'a> {
    /// Create a walker.
    ///
    /// `boundary` is the device of the scan root when the walk must stay on
    /// one filesystem.
    pub(crate) fn new(
        config: &'a ScanConfig,
        now: SystemTime,
        boundary: Option<u64>,
        progress: &'a ProgressTracker,
        stop: &'a AtomicBool,
    ) -> Self {
        Self {
            config,
            now,
            boundary,
            progress,
            stop,
        }
    }

    /// Configuration this walker applies.
    pub fn config(&self) -> &ScanConfig {
        self.config
    }

    /// Reference time for ages.
    pub fn now(&self) -> SystemTime {
        self.now
    }

    /// Walk the subtree rooted at `path`, whose identity is already known.
    pub fn walk_dir(&self, path: PathBuf, identity: InodeInfo) -> WalkOutcome {
        debug!(path = %path.display(), "walking subtree");

        let mut report = WalkReport::default();
        let mut guard = CycleGuard::new();

        let guarded = self.config.follow_symlinks && guard.enter(identity);
        let mut current = self.open(path, identity, guarded, &mut report);
        let mut ancestors: Vec<Frame> = Vec::new();

        loop {
            if let Some((child_path, child_id)) = current.pending.pop() {
                let guarded = if self.config.follow_symlinks {
                    if !guard.enter(child_id) {
                        self.record_cycle(child_path, &mut report);
                        continue;
                    }
                    true
                } else {
                    false
                };
                let child = self.open(child_path, child_id, guarded, &mut report);
                ancestors.push(std::mem::replace(&mut current, child));
                continue;
            }

            if current.guarded {
                guard.leave(current.aggregate.identity);
            }
            let (aggregate, matches) = current.finish(self.config, self.now);

            match ancestors.pop() {
                Some(mut parent) => {
                    parent.absorb(&aggregate, matches);
                    current = parent;
                }
                None => {
                    debug_assert!(guard.is_empty(), "cycle guard left unbalanced");
                    return WalkOutcome {
                        aggregate,
                        matches,
                        report,
                    };
                }
            }
        }
    }

    /// Walk the subtree rooted at `path`, reading its identity first.
    ///
    /// An unreadable root yields an empty, errored aggregate.
    pub fn walk(&self, path: &Path) -> WalkOutcome {
        match fs::metadata(path) {
            Ok(metadata) => self.walk_dir(path.to_path_buf(), identity(&metadata)),
            Err(err) => {
                let mut report = WalkReport::default();
                self.record_warning(ScanWarning::metadata_error(path, &err), &mut report);
                let mut aggregate = DirAggregate::new(path, InodeInfo::new(0, 0));
                aggregate.has_error = true;
                WalkOutcome {
                    aggregate,
                    matches: Vec::new(),
                    report,
                }
            }
        }
    }

    /// List a directory without descending: files are counted and
    /// subdirectories are queued on the returned frame.
    pub(crate) fn open(
        &self,
        path: PathBuf,
        identity: InodeInfo,
        guarded: bool,
        report: &mut WalkReport,
    ) -> Frame {
        let mut frame = Frame::new(path, identity, guarded);

        // An unlisted directory may hide fresh files, so anything built on
        // top of it is incomplete.
        if self.stop.load(Ordering::Relaxed) {
            report.interrupted = true;
            frame.aggregate.has_error = true;
            return frame;
        }

        report.stats.dirs_scanned += 1;
        self.progress.record_dir();

        let entries = match fs::read_dir(&frame.aggregate.path) {
            Ok(entries) => entries,
            Err(err) => {
                let warning = ScanWarning::read_error(&frame.aggregate.path, &err);
                self.record_warning(warning, report);
                frame.aggregate.has_error = true;
                return frame;
            }
        };

        for entry_result in entries {
            match entry_result {
                Ok(entry) => self.visit_entry(&entry, &mut frame, report),
                Err(err) => {
                    let warning = ScanWarning::read_error(&frame.aggregate.path, &err);
                    self.record_warning(warning, report);
                    frame.aggregate.has_error = true;
                }
            }
        }

        frame
    }

    /// Classify one directory entry.
    fn visit_entry(&self, entry: &DirEntry, frame: &mut Frame, report: &mut WalkReport) {
        let path = entry.path();

        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(err) => {
                self.record_warning(ScanWarning::metadata_error(&path, &err), report);
                frame.aggregate.has_error = true;
                return;
            }
        };

        if file_type.is_symlink() {
            if !self.config.follow_symlinks {
                report.stats.skipped_symlinks += 1;
                return;
            }
            match fs::metadata(&path) {
                Ok(target) if target.is_dir() => self.queue_dir(path, &target, frame, report),
                Ok(target) if target.is_file() => self.count_file(&path, &target, frame, report),
                Ok(_) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    self.record_warning(ScanWarning::broken_symlink(&path), report);
                }
                Err(err) => {
                    self.record_warning(ScanWarning::metadata_error(&path, &err), report);
                    frame.aggregate.has_error = true;
                }
            }
            return;
        }

        if !file_type.is_dir() && !file_type.is_file() {
            // Sockets, fifos and device nodes hold no data.
            return;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                self.record_warning(ScanWarning::metadata_error(&path, &err), report);
                frame.aggregate.has_error = true;
                return;
            }
        };

        if file_type.is_dir() {
            self.queue_dir(path, &metadata, frame, report);
        } else {
            self.count_file(&path, &metadata, frame, report);
        }
    }

    fn queue_dir(&self, path: PathBuf, metadata: &Metadata, frame: &mut Frame, report: &mut WalkReport) {
        if let Some(device) = self.boundary {
            if get_dev(metadata) != device {
                trace!(path = %path.display(), "skipping other filesystem");
                report.stats.skipped_other_fs += 1;
                return;
            }
        }
        frame.pending.push((path, identity(metadata)));
    }

    fn count_file(&self, path: &Path, metadata: &Metadata, frame: &mut Frame, report: &mut WalkReport) {
        let size = metadata.len();
        frame
            .aggregate
            .add_file(size, timestamp(metadata, self.config.time_basis));
        report.stats.files_scanned += 1;
        self.progress.record_file(size, path);
    }

    fn record_cycle(&self, path: PathBuf, report: &mut WalkReport) {
        info!(path = %path.display(), "skipping symlink cycle");
        report.stats.skipped_cycles += 1;
        if report.cycles.len() < self.config.error_limit {
            report.cycles.push(path);
        }
    }

    pub(crate) fn record_warning(&self, warning: ScanWarning, report: &mut WalkReport) {
        debug!(path = %warning.path.display(), kind = ?warning.kind, "{}", warning.message);
        report.stats.errors += 1;
        self.progress.record_error();
        if report.warnings.len() < self.config.error_limit {
            report.warnings.push(warning);
        }
    }
}
