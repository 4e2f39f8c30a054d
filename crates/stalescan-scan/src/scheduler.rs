//! Fan-out of top-level subtrees across a pool of workers.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, warn};

use stalescan_core::{DirAggregate, InodeInfo, ScanWarning};

use crate::aggregate::{AggregatedScan, MatchAggregator};
use crate::walker::{DirectoryWalker, WalkOutcome, WalkReport};

/// A top-level subdirectory tagged with its position in the root listing.
type Assignment = (usize, PathBuf, InodeInfo);

/// Runs one walker per top-level subdirectory on a fixed pool.
///
/// Workers share nothing but the walker's read-only configuration and the
/// progress counters. Each child outcome is joined back in listing order and
/// the root is decided exactly as the sequential walker would decide it.
pub struct WorkerScheduler<'w, 'a> {
    walker: &'w DirectoryWalker<'a>,
    workers: usize,
}

impl<'w, 'a> WorkerScheduler<'w, 'a> {
    /// Create a scheduler with `workers` threads.
    pub fn new(walker: &'w DirectoryWalker<'a>, workers: usize) -> Self {
        Self {
            walker,
            workers: workers.max(1),
        }
    }

    /// Scan `root` with the pool.
    pub fn run(&self, root: PathBuf, identity: InodeInfo) -> AggregatedScan {
        self.run_with(root, identity, &|path, id| self.walker.walk_dir(path, id))
    }

    /// Scan `root`, walking each top-level subdirectory with `walk`.
    fn run_with<F>(&self, root: PathBuf, identity: InodeInfo, walk: &F) -> AggregatedScan
    where
        F: Fn(PathBuf, InodeInfo) -> WalkOutcome + Sync,
    {
        let config = self.walker.config();

        // Files directly in the root land in this frame; its subdirectories
        // become the work to distribute.
        let mut root_report = WalkReport::default();
        let mut root_frame = self.walker.open(root, identity, false, &mut root_report);
        let children = std::mem::take(&mut root_frame.pending);

        let buckets = partition(children, self.workers);
        debug!(
            workers = self.workers,
            buckets = buckets.len(),
            "distributing top-level directories"
        );

        let mut outcomes = self.execute(buckets, walk);
        outcomes.sort_by_key(|(index, _)| *index);

        let mut aggregator = MatchAggregator::new(config.error_limit);
        aggregator.add_report(root_report);

        for (_, outcome) in outcomes {
            root_frame.absorb(&outcome.aggregate, outcome.matches);
            aggregator.add_report(outcome.report);
        }

        let (aggregate, matches) = root_frame.finish(config, self.walker.now());
        aggregator.add_matches(matches);
        aggregator.finish(aggregate)
    }

    fn execute<F>(&self, buckets: Vec<Vec<Assignment>>, walk: &F) -> Vec<(usize, WalkOutcome)>
    where
        F: Fn(PathBuf, InodeInfo) -> WalkOutcome + Sync,
    {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("stalescan-worker-{i}"))
            .build();

        match pool {
            Ok(pool) => pool.install(|| {
                buckets
                    .into_par_iter()
                    .flat_map_iter(|bucket| self.run_bucket(bucket, walk))
                    .collect()
            }),
            Err(err) => {
                warn!(error = %err, "could not start worker pool, scanning on the current thread");
                buckets
                    .into_iter()
                    .flat_map(|bucket| self.run_bucket(bucket, walk))
                    .collect()
            }
        }
    }

    fn run_bucket<F>(&self, bucket: Vec<Assignment>, walk: &F) -> Vec<(usize, WalkOutcome)>
    where
        F: Fn(PathBuf, InodeInfo) -> WalkOutcome + Sync,
    {
        bucket
            .into_iter()
            .map(|(index, path, identity)| (index, self.run_child(path, identity, walk)))
            .collect()
    }

    /// Walk one child, downgrading a panic to a warning for that child.
    fn run_child<F>(&self, path: PathBuf, identity: InodeInfo, walk: &F) -> WalkOutcome
    where
        F: Fn(PathBuf, InodeInfo) -> WalkOutcome + Sync,
    {
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| walk(path.clone(), identity)));

        match attempt {
            Ok(outcome) => outcome,
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                warn!(path = %path.display(), reason, "worker failed");

                let mut report = WalkReport::default();
                self.walker
                    .record_warning(ScanWarning::worker_failed(&path, reason), &mut report);
                let mut aggregate = DirAggregate::new(path, identity);
                aggregate.has_error = true;
                WalkOutcome {
                    aggregate,
                    matches: Vec::new(),
                    report,
                }
            }
        }
    }
}

/// Deal directories round-robin into at most `workers` buckets of near-equal
/// count. Sizes are unknown before scanning, so count is all there is.
fn partition(children: Vec<(PathBuf, InodeInfo)>, workers: usize) -> Vec<Vec<Assignment>> {
    let bucket_count = workers.min(children.len());
    let mut buckets: Vec<Vec<Assignment>> = (0..bucket_count).map(|_| Vec::new()).collect();
    for (index, (path, identity)) in children.into_iter().enumerate() {
        buckets[index % bucket_count].push((index, path, identity));
    }
    buckets
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
