//! Reconciliation scan.
//!
//! Walks the full directory tree under a registry's root and tracks any
//! trackable file the registry has not seen, covering files present before
//! the watch started and events the watcher missed. Idempotent: a second
//! scan with no filesystem change discovers nothing.

use std::sync::atomic::{AtomicU64, Ordering};

use walkdir::WalkDir;

use crate::registry::{DirectoryRegistry, FileSnapshot};

/// Scan statistics.
#[derive(Debug, Default)]
pub struct ScanStats {
    pub files_found: AtomicU64,
    pub files_tracked: AtomicU64,
    pub files_skipped: AtomicU64,
    pub errors: AtomicU64,
}

impl ScanStats {
    /// Create new stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> ScanStatsSnapshot {
        ScanStatsSnapshot {
            files_found: self.files_found.load(Ordering::Relaxed),
            files_tracked: self.files_tracked.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of scan stats.
#[derive(Debug, Clone, Copy)]
pub struct ScanStatsSnapshot {
    pub files_found: u64,
    pub files_tracked: u64,
    pub files_skipped: u64,
    pub errors: u64,
}

/// Walk the registry's root and track newly discovered files.
///
/// Untrackable directories are pruned from the walk; untrackable files and
/// paths already tracked are skipped. Construction failures are logged and
/// the walk continues. Returns the newly tracked files.
pub fn scan(registry: &DirectoryRegistry) -> Vec<FileSnapshot> {
    let stats = ScanStats::new();
    let mut discovered = Vec::new();

    tracing::info!(registry = %registry.alias(), root = %registry.root().display(), "starting reconciliation scan");

    let walker = WalkDir::new(registry.root()).into_iter().filter_entry(|e| {
        !e.file_type().is_dir() || registry.filter().is_directory_trackable(e.path())
    });

    for entry in walker {
        match entry {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    continue;
                }

                stats.files_found.fetch_add(1, Ordering::Relaxed);
                let path = entry.path();

                if !registry.filter().is_file_trackable(path) || registry.contains_path(path) {
                    stats.files_skipped.fetch_add(1, Ordering::Relaxed);
                    continue;
                }

                match registry.track(path) {
                    Ok(Some(snapshot)) => {
                        stats.files_tracked.fetch_add(1, Ordering::Relaxed);
                        discovered.push(snapshot);
                    }
                    Ok(None) => {
                        // A live event tracked the same name mid-scan.
                        stats.files_skipped.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        stats.errors.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(
                            registry = %registry.alias(),
                            path = %path.display(),
                            error = %e,
                            "failed to construct tracked file during scan"
                        );
                    }
                }
            }
            Err(e) => {
                stats.errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(registry = %registry.alias(), error = %e, "error walking directory");
            }
        }
    }

    let snapshot = stats.snapshot();
    tracing::info!(
        registry = %registry.alias(),
        found = snapshot.files_found,
        tracked = snapshot.files_tracked,
        skipped = snapshot.files_skipped,
        errors = snapshot.errors,
        "reconciliation scan complete"
    );

    discovered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{DuplicatePolicy, Thresholds};
    use crate::watcher::{FilterRules, PathFilter};
    use std::fs;
    use tempfile::TempDir;

    fn registry(tmp: &TempDir) -> DirectoryRegistry {
        let rules = FilterRules::new(
            vec![],
            vec![".tmp".to_string()],
            vec!["quarantine".to_string()],
            vec![],
            vec![],
        );
        DirectoryRegistry::new(
            tmp.path(),
            PathFilter::new(rules),
            Thresholds::default(),
            DuplicatePolicy::RenameWithTimestamp,
        )
    }

    #[test]
    fn test_scan_discovers_existing_files() {
        let tmp = TempDir::new().unwrap();
        let sub = tmp.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(tmp.path().join("a.csv"), b"a").unwrap();
        fs::write(sub.join("b.csv"), b"b").unwrap();

        let reg = registry(&tmp);
        let discovered = scan(&reg);

        assert_eq!(discovered.len(), 2);
        assert_eq!(reg.len(), 2);
        assert!(reg.get("a.csv").is_some());
        assert!(reg.get("b.csv").is_some());
    }

    #[test]
    fn test_scan_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.csv"), b"a").unwrap();

        let reg = registry(&tmp);
        assert_eq!(scan(&reg).len(), 1);
        assert!(scan(&reg).is_empty());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_scan_skips_filtered_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("keep.csv"), b"k").unwrap();
        fs::write(tmp.path().join("skip.tmp"), b"s").unwrap();

        let reg = registry(&tmp);
        let discovered = scan(&reg);

        assert_eq!(discovered.len(), 1);
        assert_eq!(discovered[0].name, "keep.csv");
    }

    #[test]
    fn test_scan_prunes_ignored_directories() {
        let tmp = TempDir::new().unwrap();
        let quarantine = tmp.path().join("quarantine");
        fs::create_dir(&quarantine).unwrap();
        fs::write(quarantine.join("bad.csv"), b"b").unwrap();
        fs::write(tmp.path().join("good.csv"), b"g").unwrap();

        let reg = registry(&tmp);
        let discovered = scan(&reg);

        assert_eq!(discovered.len(), 1);
        assert_eq!(discovered[0].name, "good.csv");
    }

    #[test]
    fn test_scan_picks_up_new_files_only() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.csv"), b"a").unwrap();

        let reg = registry(&tmp);
        scan(&reg);

        fs::write(tmp.path().join("b.csv"), b"b").unwrap();
        let discovered = scan(&reg);

        assert_eq!(discovered.len(), 1);
        assert_eq!(discovered[0].name, "b.csv");
    }
}
