//! Merging partial walk results into one ordered match list.

use std::path::PathBuf;

use stalescan_core::{DirAggregate, MatchRecord, ScanStats, ScanWarning, SortOrder};

use crate::walker::{WalkOutcome, WalkReport};

/// Merged output of one or more walks.
#[derive(Debug)]
pub struct AggregatedScan {
    /// Aggregate of the scan root.
    pub root: DirAggregate,
    /// Non-overlapping matches, largest first.
    pub matches: Vec<MatchRecord>,
    /// Per-subtree errors, capped.
    pub warnings: Vec<ScanWarning>,
    /// Cycle skips, capped.
    pub cycles: Vec<PathBuf>,
    /// Summed counters.
    pub stats: ScanStats,
    /// Any walk was interrupted.
    pub interrupted: bool,
}

/// Collects matches and diagnostics from walkers over disjoint subtrees.
#[derive(Debug)]
pub struct MatchAggregator {
    error_limit: usize,
    matches: Vec<MatchRecord>,
    warnings: Vec<ScanWarning>,
    cycles: Vec<PathBuf>,
    stats: ScanStats,
    interrupted: bool,
}

impl MatchAggregator {
    /// Create an aggregator that keeps at most `error_limit` log entries.
    pub fn new(error_limit: usize) -> Self {
        Self {
            error_limit,
            matches: Vec::new(),
            warnings: Vec::new(),
            cycles: Vec::new(),
            stats: ScanStats::new(),
            interrupted: false,
        }
    }

    /// Add the matches of one walk.
    pub fn add_matches(&mut self, matches: Vec<MatchRecord>) {
        self.matches.extend(matches);
    }

    /// Add the errors, cycle skips and counters of one walk.
    pub fn add_report(&mut self, report: WalkReport) {
        let room = self.error_limit.saturating_sub(self.warnings.len());
        self.warnings.extend(report.warnings.into_iter().take(room));

        let room = self.error_limit.saturating_sub(self.cycles.len());
        self.cycles.extend(report.cycles.into_iter().take(room));

        self.stats.merge(&report.stats);
        self.interrupted |= report.interrupted;
    }

    /// Add a whole walk and hand back its root aggregate.
    pub fn add_outcome(&mut self, outcome: WalkOutcome) -> DirAggregate {
        self.add_matches(outcome.matches);
        self.add_report(outcome.report);
        outcome.aggregate
    }

    /// Sort the matches and check that none contains another.
    ///
    /// # Panics
    ///
    /// Panics if one match is an ancestor of another. Walkers only ever run
    /// over disjoint subtrees, so an overlap is a bug in the caller.
    pub fn finish(mut self, root: DirAggregate) -> AggregatedScan {
        assert_disjoint(&mut self.matches);
        SortOrder::Size.sort(&mut self.matches);

        AggregatedScan {
            root,
            matches: self.matches,
            warnings: self.warnings,
            cycles: self.cycles,
            stats: self.stats,
            interrupted: self.interrupted,
        }
    }
}

/// After sorting by path, any ancestor is immediately followed by one of its
/// descendants, so checking neighbours is enough.
fn assert_disjoint(matches: &mut [MatchRecord]) {
    SortOrder::Path.sort(matches);
    for pair in matches.windows(2) {
        assert!(
            !pair[0].contains(&pair[1].path) && pair[0].path != pair[1].path,
            "overlapping matches: {} and {}",
            pair[0].path.display(),
            pair[1].path.display()
        );
    }
}
