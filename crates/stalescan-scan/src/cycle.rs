//! Symlink cycle detection.

use std::collections::HashSet;

use stalescan_core::InodeInfo;

/// Tracks the physical directories on the active descent path.
///
/// When symlinks are followed, a link that resolves to a directory already on
/// the path would recurse forever. The guard keys on (inode, device) rather
/// than on path strings, and follows stack discipline: a directory is only
/// rejected while one of its own ancestors holds it, so reaching the same
/// directory through an unrelated link elsewhere in the tree is allowed.
#[derive(Debug, Default)]
pub struct CycleGuard {
    active: HashSet<InodeInfo>,
}

impl CycleGuard {
    /// Create an empty guard.
    pub fn new() -> Self {
        Self {
            active: HashSet::new(),
        }
    }

    /// Push a directory onto the active path.
    ///
    /// Returns `false` if the directory is already on the path, meaning
    /// descending into it would close a cycle.
    pub fn enter(&mut self, info: InodeInfo) -> bool {
        self.active.insert(info)
    }

    /// Pop a directory off the active path when backtracking.
    pub fn leave(&mut self, info: InodeInfo) {
        self.active.remove(&info);
    }

    /// Check if no directory is on the active path.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
