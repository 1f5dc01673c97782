//! Filesystem event dispatch.
//!
//! Routes typed [`FsEvent`]s to per-kind handlers that mutate the
//! [`DirectoryRegistry`]. Events failing path validation are dropped before
//! any handler runs. Handlers stay cheap: registry map mutation plus at most
//! one stat, since they run on the event-delivery path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::registry::DirectoryRegistry;

use super::events::FsEvent;

/// Statistics for event dispatch.
#[derive(Debug, Default)]
pub struct DispatchStats {
    pub events_seen: AtomicU64,
    pub events_dropped: AtomicU64,
    pub files_tracked: AtomicU64,
    pub files_removed: AtomicU64,
    pub errors: AtomicU64,
}

impl DispatchStats {
    /// Create a new stats tracker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get a snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            events_seen: self.events_seen.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            files_tracked: self.files_tracked.load(Ordering::Relaxed),
            files_removed: self.files_removed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatch stats.
#[derive(Debug, Clone, Copy)]
pub struct DispatchStatsSnapshot {
    pub events_seen: u64,
    pub events_dropped: u64,
    pub files_tracked: u64,
    pub files_removed: u64,
    pub errors: u64,
}

/// Routes validated events into registry mutations.
pub struct EventDispatcher {
    registry: Arc<DirectoryRegistry>,
    stats: Arc<DispatchStats>,
}

impl EventDispatcher {
    /// Create a dispatcher feeding `registry`.
    #[must_use]
    pub fn new(registry: Arc<DirectoryRegistry>, stats: Arc<DispatchStats>) -> Self {
        Self { registry, stats }
    }

    /// Current stats handle.
    #[must_use]
    pub fn stats(&self) -> Arc<DispatchStats> {
        Arc::clone(&self.stats)
    }

    /// Validate and route one event.
    ///
    /// Directory-kind events are screened with the directory predicate,
    /// file-kind events with the file predicate; an event failing its check
    /// is dropped with no state mutation.
    pub fn dispatch(&self, event: &FsEvent) {
        self.stats.events_seen.fetch_add(1, Ordering::Relaxed);

        if !self.validate(event) {
            self.stats.events_dropped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                registry = %self.registry.alias(),
                kind = event.kind(),
                path = %event.source_path().display(),
                "dropped event failing path validation"
            );
            return;
        }

        tracing::debug!(
            registry = %self.registry.alias(),
            kind = event.kind(),
            path = %event.source_path().display(),
            "handling event"
        );

        match event {
            FsEvent::FileCreated(path) => self.handle_file_created(path),
            FsEvent::FileDeleted(path) => self.handle_file_deleted(path),
            FsEvent::FileModified(path) => {
                // Content change is detected by the poller's stat-diffing;
                // the event itself is only observed.
                tracing::debug!(
                    registry = %self.registry.alias(),
                    path = %path.display(),
                    "file modified"
                );
            }
            FsEvent::FileMoved { from, to } => {
                let dest_trackable = self.registry.filter().is_file_trackable(to);
                self.registry.handle_move(from, to, dest_trackable);
            }
            FsEvent::DirCreated(path)
            | FsEvent::DirDeleted(path)
            | FsEvent::DirModified(path) => {
                tracing::debug!(
                    registry = %self.registry.alias(),
                    kind = event.kind(),
                    path = %path.display(),
                    "directory event observed"
                );
            }
            FsEvent::DirMoved { from, to } => {
                // Children are reconciled by the next scan.
                tracing::debug!(
                    registry = %self.registry.alias(),
                    from = %from.display(),
                    to = %to.display(),
                    "directory moved"
                );
            }
        }
    }

    fn validate(&self, event: &FsEvent) -> bool {
        let filter = self.registry.filter();
        if event.is_dir_event() {
            return filter.is_directory_trackable(event.source_path());
        }

        // A move counts if either endpoint is trackable: out-of-scope
        // sources renamed into scope (temp-file-then-rename producers)
        // must still reach the move handler.
        filter.is_file_trackable(event.source_path())
            || event
                .dest_path()
                .is_some_and(|to| filter.is_file_trackable(to))
    }

    fn handle_file_created(&self, path: &std::path::Path) {
        match self.registry.track(path) {
            Ok(Some(snapshot)) => {
                self.stats.files_tracked.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    registry = %self.registry.alias(),
                    name = %snapshot.name,
                    "tracking created file"
                );
            }
            Ok(None) => {}
            Err(e) => {
                // No partial entry; further modify events or the scanner
                // will retry this file.
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    registry = %self.registry.alias(),
                    path = %path.display(),
                    error = %e,
                    "failed to construct tracked file"
                );
            }
        }
    }

    fn handle_file_deleted(&self, path: &std::path::Path) {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return;
        };

        if self.registry.remove_by_name(name).is_some() {
            self.stats.files_removed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{DuplicatePolicy, Thresholds};
    use crate::watcher::{FilterRules, PathFilter};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn dispatcher(tmp: &TempDir) -> (EventDispatcher, Arc<DirectoryRegistry>) {
        let rules = FilterRules::new(
            vec![],
            vec![".tmp".to_string()],
            vec!["quarantine".to_string()],
            vec![],
            vec![],
        );
        let registry = Arc::new(DirectoryRegistry::new(
            tmp.path(),
            PathFilter::new(rules),
            Thresholds::default(),
            DuplicatePolicy::RenameWithTimestamp,
        ));
        let dispatcher = EventDispatcher::new(Arc::clone(&registry), DispatchStats::new());
        (dispatcher, registry)
    }

    fn write(tmp: &TempDir, name: &str) -> PathBuf {
        let path = tmp.path().join(name);
        fs::write(&path, b"contents").unwrap();
        path
    }

    #[test]
    fn test_file_created_tracks() {
        let tmp = TempDir::new().unwrap();
        let (dispatcher, registry) = dispatcher(&tmp);
        let path = write(&tmp, "report.csv");

        dispatcher.dispatch(&FsEvent::FileCreated(path));

        assert!(registry.get("report.csv").is_some());
        let stats = dispatcher.stats().snapshot();
        assert_eq!(stats.events_seen, 1);
        assert_eq!(stats.files_tracked, 1);
        assert_eq!(stats.events_dropped, 0);
    }

    #[test]
    fn test_ignored_extension_event_dropped() {
        let tmp = TempDir::new().unwrap();
        let (dispatcher, registry) = dispatcher(&tmp);
        let path = write(&tmp, "report.tmp");

        dispatcher.dispatch(&FsEvent::FileCreated(path));

        assert!(registry.is_empty());
        let stats = dispatcher.stats().snapshot();
        assert_eq!(stats.events_dropped, 1);
        assert_eq!(stats.files_tracked, 0);
    }

    #[test]
    fn test_duplicate_create_is_noop() {
        let tmp = TempDir::new().unwrap();
        let (dispatcher, registry) = dispatcher(&tmp);
        let path = write(&tmp, "report.csv");

        dispatcher.dispatch(&FsEvent::FileCreated(path.clone()));
        dispatcher.dispatch(&FsEvent::FileCreated(path));

        assert_eq!(registry.len(), 1);
        assert_eq!(dispatcher.stats().snapshot().files_tracked, 1);
    }

    #[test]
    fn test_file_deleted_removes() {
        let tmp = TempDir::new().unwrap();
        let (dispatcher, registry) = dispatcher(&tmp);
        let path = write(&tmp, "report.csv");

        dispatcher.dispatch(&FsEvent::FileCreated(path.clone()));
        dispatcher.dispatch(&FsEvent::FileDeleted(path));

        assert!(registry.is_empty());
        assert_eq!(dispatcher.stats().snapshot().files_removed, 1);
    }

    #[test]
    fn test_delete_of_untracked_is_noop() {
        let tmp = TempDir::new().unwrap();
        let (dispatcher, registry) = dispatcher(&tmp);

        dispatcher.dispatch(&FsEvent::FileDeleted(tmp.path().join("never-seen.csv")));

        assert!(registry.is_empty());
        assert_eq!(dispatcher.stats().snapshot().files_removed, 0);
    }

    #[test]
    fn test_modified_mutates_nothing() {
        let tmp = TempDir::new().unwrap();
        let (dispatcher, registry) = dispatcher(&tmp);
        let path = write(&tmp, "report.csv");

        dispatcher.dispatch(&FsEvent::FileModified(path));

        assert!(registry.is_empty());
        assert_eq!(dispatcher.stats().snapshot().events_dropped, 0);
    }

    #[test]
    fn test_file_moved_rekeys() {
        let tmp = TempDir::new().unwrap();
        let (dispatcher, registry) = dispatcher(&tmp);
        let from = write(&tmp, "a.csv");
        dispatcher.dispatch(&FsEvent::FileCreated(from.clone()));
        let id = registry.get("a.csv").unwrap().id;

        let to = tmp.path().join("b.csv");
        fs::rename(&from, &to).unwrap();
        dispatcher.dispatch(&FsEvent::FileMoved { from, to });

        assert!(registry.get("a.csv").is_none());
        assert_eq!(registry.get("b.csv").unwrap().id, id);
    }

    #[test]
    fn test_file_moved_to_ignored_extension_untracks() {
        let tmp = TempDir::new().unwrap();
        let (dispatcher, registry) = dispatcher(&tmp);
        let from = write(&tmp, "a.csv");
        dispatcher.dispatch(&FsEvent::FileCreated(from.clone()));

        let to = tmp.path().join("a.tmp");
        fs::rename(&from, &to).unwrap();
        dispatcher.dispatch(&FsEvent::FileMoved { from, to });

        assert!(registry.is_empty());
    }

    #[test]
    fn test_file_moved_into_scope_is_tracked() {
        let tmp = TempDir::new().unwrap();
        let (dispatcher, registry) = dispatcher(&tmp);

        // Producer writes to a temp name, then renames into scope. The
        // source never passed the filter, so no entry exists yet.
        let from = write(&tmp, "a.tmp");
        dispatcher.dispatch(&FsEvent::FileCreated(from.clone()));
        assert!(registry.is_empty());

        let to = tmp.path().join("a.csv");
        fs::rename(&from, &to).unwrap();
        dispatcher.dispatch(&FsEvent::FileMoved { from, to });

        assert!(registry.get("a.csv").is_some());
    }

    #[test]
    fn test_file_moved_fully_out_of_scope_dropped() {
        let tmp = TempDir::new().unwrap();
        let (dispatcher, registry) = dispatcher(&tmp);
        let from = write(&tmp, "a.tmp");

        let to = tmp.path().join("b.tmp");
        fs::rename(&from, &to).unwrap();
        dispatcher.dispatch(&FsEvent::FileMoved { from, to });

        assert!(registry.is_empty());
        assert_eq!(dispatcher.stats().snapshot().events_dropped, 1);
    }

    #[test]
    fn test_ignored_directory_event_dropped() {
        let tmp = TempDir::new().unwrap();
        let (dispatcher, _registry) = dispatcher(&tmp);

        dispatcher.dispatch(&FsEvent::DirCreated(tmp.path().join("quarantine")));

        assert_eq!(dispatcher.stats().snapshot().events_dropped, 1);
    }

    #[test]
    fn test_directory_events_observed_only() {
        let tmp = TempDir::new().unwrap();
        let (dispatcher, registry) = dispatcher(&tmp);

        dispatcher.dispatch(&FsEvent::DirCreated(tmp.path().join("sub")));
        dispatcher.dispatch(&FsEvent::DirModified(tmp.path().join("sub")));
        dispatcher.dispatch(&FsEvent::DirDeleted(tmp.path().join("sub")));
        dispatcher.dispatch(&FsEvent::DirMoved {
            from: tmp.path().join("sub"),
            to: tmp.path().join("sub2"),
        });

        assert!(registry.is_empty());
        assert_eq!(dispatcher.stats().snapshot().events_seen, 4);
        assert_eq!(dispatcher.stats().snapshot().events_dropped, 0);
    }
}
