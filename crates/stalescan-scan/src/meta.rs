//! Cross-platform metadata helpers.

use std::fs::Metadata;
use std::time::SystemTime;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use stalescan_core::{InodeInfo, TimeBasis};

/// Physical identity of the object described by `metadata`.
pub(crate) fn identity(metadata: &Metadata) -> InodeInfo {
    InodeInfo::new(get_ino(metadata), get_dev(metadata))
}

/// Read the configured timestamp, if the platform provides it.
pub(crate) fn timestamp(metadata: &Metadata, basis: TimeBasis) -> Option<SystemTime> {
    match basis {
        TimeBasis::Mtime => metadata.modified().ok(),
        TimeBasis::Atime => metadata.accessed().ok(),
        TimeBasis::Ctime => get_ctime(metadata),
    }
}

/// Get the device ID from metadata.
#[cfg(unix)]
pub(crate) fn get_dev(metadata: &Metadata) -> u64 {
    metadata.dev()
}

#[cfg(not(unix))]
pub(crate) fn get_dev(_metadata: &Metadata) -> u64 {
    0 // Windows doesn't have device IDs in the same way
}

/// Get the inode number from metadata.
#[cfg(unix)]
fn get_ino(metadata: &Metadata) -> u64 {
    metadata.ino()
}

#[cfg(not(unix))]
fn get_ino(_metadata: &Metadata) -> u64 {
    0 // Windows doesn't have inodes
}

/// Get the status change time from metadata.
#[cfg(unix)]
fn get_ctime(metadata: &Metadata) -> Option<SystemTime> {
    use std::time::Duration;

    let secs = metadata.ctime();
    let nanos = u32::try_from(metadata.ctime_nsec()).ok()?;
    if secs >= 0 {
        SystemTime::UNIX_EPOCH.checked_add(Duration::new(secs.unsigned_abs(), nanos))
    } else {
        SystemTime::UNIX_EPOCH
            .checked_sub(Duration::from_secs(secs.unsigned_abs()))?
            .checked_add(Duration::from_nanos(u64::from(nanos)))
    }
}

#[cfg(not(unix))]
fn get_ctime(metadata: &Metadata) -> Option<SystemTime> {
    // No status change time outside Unix; modification time is the closest.
    metadata.modified().ok()
}
