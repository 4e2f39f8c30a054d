use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use filetime::FileTime;
use stalescan_scan::{MatchRecord, ScanConfig, ScanEngine, ScanResult, TimeBasis};
use tempfile::TempDir;

const DAY: u64 = 24 * 60 * 60;

fn days_ago(now: SystemTime, days: u64) -> FileTime {
    FileTime::from_system_time(now - Duration::from_secs(days * DAY))
}

/// Write a file of `size` bytes whose atime and mtime are `age_days` old.
fn write_file(path: &Path, size: usize, age_days: u64, now: SystemTime) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, vec![0u8; size]).unwrap();
    let t = days_ago(now, age_days);
    filetime::set_file_times(path, t, t).unwrap();
}

fn config(root: &Path, min_size: u64, older_than_days: u64, now: SystemTime) -> ScanConfig {
    ScanConfig::builder()
        .root(root)
        .min_size(min_size)
        .max_age(Duration::from_secs(older_than_days * DAY))
        .reference_time(now)
        .build()
        .unwrap()
}

fn scan(config: &ScanConfig) -> ScanResult {
    ScanEngine::new().scan(config).unwrap()
}

fn root_of(temp: &TempDir) -> PathBuf {
    temp.path().canonicalize().unwrap()
}

fn paths(matches: &[MatchRecord]) -> Vec<PathBuf> {
    matches.iter().map(|m| m.path.clone()).collect()
}

/// The root's newest file should be `days` old, give or take timestamp
/// precision of the filesystem.
fn assert_age_about(result: &ScanResult, now: SystemTime, days: u64) {
    let age = result.root.age(now).unwrap();
    assert!(age + Duration::from_secs(1) >= Duration::from_secs(days * DAY), "{age:?}");
    assert!(age <= Duration::from_secs(days * DAY + 1), "{age:?}");
}

fn assert_no_overlap(matches: &[MatchRecord]) {
    for a in matches {
        for b in matches {
            if a.path != b.path {
                assert!(!b.path.starts_with(&a.path), "{:?} contains {:?}", a.path, b.path);
            }
        }
    }
}

/// old/ holds 150 bytes in total, 50 of them in old/sub, all 200 days old.
fn old_tree(now: SystemTime) -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_file(&root.join("old/a.bin"), 60, 200, now);
    write_file(&root.join("old/b.bin"), 40, 200, now);
    write_file(&root.join("old/sub/c.bin"), 50, 200, now);
    temp
}

#[test]
fn test_shallowest_match_only() {
    let now = SystemTime::now();
    let temp = old_tree(now);
    // A fresh file at the top keeps the scan root out of the picture.
    write_file(&temp.path().join("fresh.txt"), 1, 0, now);

    let result = scan(&config(temp.path(), 100, 60, now));

    assert_eq!(paths(&result.matches), vec![root_of(&temp).join("old")]);
    assert_eq!(result.matches[0].size, 150);
    assert_eq!(result.matches[0].file_count, 3);
    assert!(result.matches[0].age >= Duration::from_secs(200 * DAY));
    assert!(!result.matches[0].incomplete);
}

#[test]
fn test_fresh_file_blocks_whole_branch() {
    let now = SystemTime::now();
    let temp = old_tree(now);
    write_file(&temp.path().join("old/sub/new.bin"), 1, 1, now);

    let result = scan(&config(temp.path(), 100, 60, now));

    assert!(result.matches.is_empty());
    assert_age_about(&result, now, 1);
}

#[test]
fn test_aggregate_correctness() {
    let now = SystemTime::now();
    let temp = old_tree(now);
    write_file(&temp.path().join("top.bin"), 7, 3, now);
    fs::create_dir(temp.path().join("empty")).unwrap();

    let result = scan(&config(temp.path(), u64::MAX, 60, now));

    assert_eq!(result.root.size, 157);
    assert_eq!(result.root.file_count, 4);
    assert_eq!(result.root.dir_count, 3);
    assert_eq!(result.stats.files_scanned, 4);
    assert_eq!(result.stats.dirs_scanned, 4);
    assert_age_about(&result, now, 3);
}

#[test]
fn test_empty_directory_never_matches() {
    let now = SystemTime::now();
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("a/b/c")).unwrap();

    let result = scan(&config(temp.path(), 0, 0, now));
    assert!(result.matches.is_empty());
}

#[test]
fn test_nested_and_sibling_matches() {
    let now = SystemTime::now();
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    // projects/ is fresh overall, but two of its children are stale.
    write_file(&root.join("projects/active/main.rs"), 10, 0, now);
    write_file(&root.join("projects/archive/2019/data.bin"), 200, 400, now);
    write_file(&root.join("projects/archive/2020/data.bin"), 300, 400, now);
    write_file(&root.join("projects/scratch/deep/er/blob.bin"), 120, 90, now);
    write_file(&root.join("projects/small/tiny.bin"), 5, 400, now);

    let result = scan(&config(root, 100, 60, now));
    let root = root_of(&temp);

    assert_eq!(
        paths(&result.matches),
        vec![
            root.join("projects/archive"),
            root.join("projects/scratch"),
        ]
    );
    assert_eq!(result.matches[0].size, 500);
    assert_eq!(result.matches[1].size, 120);
    assert_no_overlap(&result.matches);
}

#[test]
fn test_minimality() {
    let now = SystemTime::now();
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_file(&root.join("a/x/1.bin"), 100, 100, now);
    write_file(&root.join("a/y/2.bin"), 100, 100, now);
    write_file(&root.join("a/fresh.bin"), 1, 0, now);
    write_file(&root.join("b/1.bin"), 50, 100, now);
    write_file(&root.join("b/c/2.bin"), 60, 100, now);

    let result = scan(&config(root, 100, 60, now));
    let root = root_of(&temp);

    // a is fresh, so its two stale children surface; b qualifies as a whole
    // and hides nothing because b/c alone is too small.
    assert_eq!(
        paths(&result.matches),
        vec![root.join("b"), root.join("a/x"), root.join("a/y")]
    );
    for record in &result.matches {
        assert!(record.size >= 100);
        assert!(record.age >= Duration::from_secs(60 * DAY));
    }
}

#[test]
fn test_idempotent() {
    let now = SystemTime::now();
    let temp = old_tree(now);
    write_file(&temp.path().join("other/x.bin"), 500, 90, now);

    let config = config(temp.path(), 100, 60, now);
    let first = scan(&config);
    let second = scan(&config);

    assert_eq!(first.matches, second.matches);
    assert_eq!(first.root, second.root);
}

fn wide_tree(now: SystemTime) -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    for i in 0..9u64 {
        let age = if i % 3 == 0 { 5 } else { 120 + i };
        write_file(&root.join(format!("d{i}/f.bin")), 80 + i as usize, age, now);
        write_file(&root.join(format!("d{i}/nested/g.bin")), 40, 200, now);
        write_file(&root.join(format!("d{i}/nested/deeper/h.bin")), 110, 300, now);
    }
    write_file(&root.join("loose.bin"), 3, 400, now);
    temp
}

#[test]
fn test_parallel_parity() {
    let now = SystemTime::now();
    let temp = wide_tree(now);

    let sequential = scan(&config(temp.path(), 100, 60, now));
    for workers in [2usize, 3, 8] {
        let mut parallel_config = config(temp.path(), 100, 60, now);
        parallel_config.workers = workers;
        let parallel = scan(&parallel_config);

        assert_eq!(sequential.matches, parallel.matches, "workers = {workers}");
        assert_eq!(sequential.root, parallel.root);
        assert_eq!(sequential.stats, parallel.stats);
    }
    assert!(!sequential.matches.is_empty());
    assert_no_overlap(&sequential.matches);
}

#[test]
fn test_parallel_root_match_discards_children() {
    let now = SystemTime::now();
    let temp = TempDir::new().unwrap();
    write_file(&temp.path().join("a/big.bin"), 200, 300, now);
    write_file(&temp.path().join("b/big.bin"), 200, 300, now);
    write_file(&temp.path().join("root.bin"), 10, 300, now);

    let mut config = config(temp.path(), 100, 60, now);
    config.workers = 4;
    let result = scan(&config);

    assert_eq!(paths(&result.matches), vec![root_of(&temp)]);
    assert_eq!(result.matches[0].size, 410);
}

#[test]
fn test_parallel_counts_root_files() {
    let now = SystemTime::now();
    let temp = TempDir::new().unwrap();
    write_file(&temp.path().join("only.bin"), 150, 300, now);

    let mut config = config(temp.path(), 100, 60, now);
    config.workers = 3;
    let result = scan(&config);

    assert_eq!(paths(&result.matches), vec![root_of(&temp)]);
    assert_eq!(result.root.file_count, 1);
}

#[test]
fn test_time_basis_atime() {
    let now = SystemTime::now();
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("data/blob.bin");
    write_file(&file, 200, 0, now);
    // Read long ago, modified just now.
    filetime::set_file_times(&file, days_ago(now, 300), days_ago(now, 0)).unwrap();

    let mut config = config(temp.path(), 100, 60, now);
    assert!(scan(&config).matches.is_empty());

    config.time_basis = TimeBasis::Atime;
    let result = scan(&config);
    assert_eq!(result.matches.len(), 1);
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::os::unix::fs::{symlink, PermissionsExt};

    #[test]
    fn test_time_basis_ctime() {
        // Backdating mtime bumps ctime to the present, so the same tree is
        // stale by mtime and fresh by ctime.
        let now = SystemTime::now() + Duration::from_secs(60);
        let temp = old_tree(now);

        let by_mtime = scan(&config(temp.path(), 100, 60, now));
        assert_eq!(by_mtime.matches.len(), 1);

        let mut config = config(temp.path(), 100, 60, now);
        config.time_basis = TimeBasis::Ctime;
        let by_ctime = scan(&config);

        assert!(by_ctime.matches.is_empty());
        assert!(by_ctime.root.age(now).unwrap() < Duration::from_secs(DAY));
    }

    #[test]
    fn test_symlinks_skipped_by_default() {
        let now = SystemTime::now();
        let temp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        write_file(&outside.path().join("huge.bin"), 500, 300, now);
        write_file(&temp.path().join("own.bin"), 10, 300, now);
        symlink(outside.path(), temp.path().join("link")).unwrap();
        symlink(outside.path().join("huge.bin"), temp.path().join("file-link")).unwrap();

        let result = scan(&config(temp.path(), 100, 60, now));
        assert_eq!(result.root.size, 10);
        assert_eq!(result.stats.skipped_symlinks, 2);
        assert!(result.matches.is_empty());
    }

    #[test]
    fn test_followed_symlinks_count() {
        let now = SystemTime::now();
        let temp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        write_file(&outside.path().join("huge.bin"), 500, 300, now);
        write_file(&temp.path().join("own.bin"), 10, 300, now);
        symlink(outside.path(), temp.path().join("link")).unwrap();
        symlink(outside.path().join("huge.bin"), temp.path().join("file-link")).unwrap();

        let mut config = config(temp.path(), 100, 60, now);
        config.follow_symlinks = true;
        let result = scan(&config);

        assert_eq!(result.root.size, 1010);
        assert_eq!(paths(&result.matches), vec![root_of(&temp)]);
    }

    #[test]
    fn test_symlink_cycle_terminates() {
        let now = SystemTime::now();
        let temp = TempDir::new().unwrap();
        write_file(&temp.path().join("a/b/data.bin"), 30, 300, now);
        symlink(temp.path(), temp.path().join("a/b/back-to-root")).unwrap();
        symlink(temp.path().join("a"), temp.path().join("a/self")).unwrap();

        let mut config = config(temp.path(), 1, 60, now);
        config.follow_symlinks = true;
        let result = scan(&config);

        assert_eq!(result.stats.skipped_cycles, 2);
        assert_eq!(result.cycles.len(), 2);
        assert_eq!(result.root.size, 30);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_non_cyclic_revisit_allowed() {
        let now = SystemTime::now();
        let temp = TempDir::new().unwrap();
        write_file(&temp.path().join("shared/data.bin"), 40, 300, now);
        fs::create_dir(temp.path().join("elsewhere")).unwrap();
        symlink(temp.path().join("shared"), temp.path().join("elsewhere/alias")).unwrap();

        let mut config = config(temp.path(), u64::MAX, 60, now);
        config.follow_symlinks = true;
        let result = scan(&config);

        assert_eq!(result.root.size, 80);
        assert_eq!(result.stats.skipped_cycles, 0);
    }

    #[test]
    fn test_broken_symlink_is_warning() {
        let now = SystemTime::now();
        let temp = TempDir::new().unwrap();
        write_file(&temp.path().join("data.bin"), 5, 300, now);
        symlink(temp.path().join("missing"), temp.path().join("dangling")).unwrap();

        let mut config = config(temp.path(), 1, 60, now);
        config.follow_symlinks = true;
        let result = scan(&config);

        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].kind, stalescan_scan::WarningKind::BrokenSymlink);
        assert_eq!(result.matches.len(), 1);
    }

    #[test]
    fn test_unreadable_subtree_is_recovered() {
        let now = SystemTime::now();
        let temp = TempDir::new().unwrap();
        write_file(&temp.path().join("ok/data.bin"), 200, 300, now);
        write_file(&temp.path().join("locked/secret.bin"), 999, 300, now);
        let locked = temp.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can read it anyway; nothing to test then.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let mut config = config(temp.path(), 100, 60, now);
        let sequential = scan(&config);
        config.workers = 2;
        let parallel = scan(&config);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        for result in [&sequential, &parallel] {
            assert_eq!(result.stats.errors, 1);
            assert_eq!(result.warnings[0].kind, stalescan_scan::WarningKind::PermissionDenied);
            assert_eq!(result.root.size, 200);
            assert!(result.root.has_error);
            // The root is incomplete but still qualifies on what was readable.
            assert_eq!(paths(&result.matches), vec![root_of(&temp)]);
            assert!(result.matches[0].incomplete);
        }
    }
}
