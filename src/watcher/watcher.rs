//! Filesystem observation source using notify-rs.
//!
//! Bridges raw `notify` events into the typed [`FsEvent`] kinds the
//! dispatcher routes on, delivered over a tokio channel.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::events::FsEvent;
use crate::error::WatchError;
use crate::Result;

/// Channel capacity for pending events.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Watches directory trees and yields typed filesystem events.
pub struct DirectoryWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::Receiver<FsEvent>,
    watched_dirs: Arc<Mutex<Vec<PathBuf>>>,
}

impl DirectoryWatcher {
    /// Create a new watcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watch backend cannot be created.
    pub fn new() -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let watched_dirs = Arc::new(Mutex::new(Vec::new()));
        let watched_dirs_clone = Arc::clone(&watched_dirs);

        let watcher = RecommendedWatcher::new(
            move |result: std::result::Result<Event, notify::Error>| match result {
                Ok(event) => {
                    for fs_event in translate(event) {
                        let dirs = watched_dirs_clone.lock();
                        if !is_under_watched(&dirs, fs_event.source_path()) {
                            continue;
                        }
                        drop(dirs);

                        if event_tx.blocking_send(fs_event).is_err() {
                            tracing::warn!("event channel closed, discarding event");
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "watch backend error");
                }
            },
            notify::Config::default(),
        )
        .map_err(|e| WatchError::WatchFailed {
            path: "init".to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            watcher,
            event_rx,
            watched_dirs,
        })
    }

    /// Add a directory to watch recursively.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory does not exist or cannot be watched.
    pub fn watch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(WatchError::WatchFailed {
                path: path.display().to_string(),
                reason: "directory does not exist".to_string(),
            }
            .into());
        }

        self.watcher
            .watch(&path, RecursiveMode::Recursive)
            .map_err(|e| WatchError::WatchFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        self.watched_dirs.lock().push(path.clone());
        tracing::info!(path = %path.display(), "watching directory");

        Ok(())
    }

    /// Stop watching a directory.
    ///
    /// # Errors
    ///
    /// Returns an error if unwatching fails.
    pub fn unwatch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        self.watcher
            .unwatch(path)
            .map_err(|e| WatchError::WatchFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        self.watched_dirs.lock().retain(|p| p != path);

        tracing::info!(path = %path.display(), "stopped watching directory");
        Ok(())
    }

    /// Receive the next event.
    ///
    /// Returns `None` if the watcher has been dropped.
    pub async fn recv(&mut self) -> Option<FsEvent> {
        self.event_rx.recv().await
    }

    /// Get the list of watched directories.
    #[must_use]
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        self.watched_dirs.lock().clone()
    }
}

/// Translate one raw notify event into typed events.
///
/// Access notifications and kinds with no lifecycle meaning are discarded.
/// For kinds where the backend does not say whether the subject is a file or
/// a directory, a stat on the (still existing) path decides; removed paths
/// default to file-kind.
fn translate(event: Event) -> Vec<FsEvent> {
    match event.kind {
        EventKind::Create(kind) => event
            .paths
            .into_iter()
            .map(|path| match kind {
                CreateKind::Folder => FsEvent::DirCreated(path),
                CreateKind::File => FsEvent::FileCreated(path),
                _ if path.is_dir() => FsEvent::DirCreated(path),
                _ => FsEvent::FileCreated(path),
            })
            .collect(),
        EventKind::Remove(kind) => event
            .paths
            .into_iter()
            .map(|path| match kind {
                RemoveKind::Folder => FsEvent::DirDeleted(path),
                _ => FsEvent::FileDeleted(path),
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => translate_rename(mode, event.paths),
        EventKind::Modify(_) => event
            .paths
            .into_iter()
            .map(|path| {
                if path.is_dir() {
                    FsEvent::DirModified(path)
                } else {
                    FsEvent::FileModified(path)
                }
            })
            .collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

fn translate_rename(mode: RenameMode, mut paths: Vec<PathBuf>) -> Vec<FsEvent> {
    match mode {
        RenameMode::Both if paths.len() == 2 => {
            let to = paths.pop().unwrap_or_default();
            let from = paths.pop().unwrap_or_default();
            if to.is_dir() {
                vec![FsEvent::DirMoved { from, to }]
            } else {
                vec![FsEvent::FileMoved { from, to }]
            }
        }
        // Unpaired rename halves degrade to delete/create.
        RenameMode::From => paths.into_iter().map(FsEvent::FileDeleted).collect(),
        RenameMode::To | RenameMode::Any | RenameMode::Other | RenameMode::Both => paths
            .into_iter()
            .map(|path| {
                if path.is_dir() {
                    FsEvent::DirCreated(path)
                } else {
                    FsEvent::FileCreated(path)
                }
            })
            .collect(),
    }
}

/// Check if a path is under any watched directory.
fn is_under_watched(watched: &[PathBuf], path: &Path) -> bool {
    watched.iter().any(|dir| path.starts_with(dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_is_under_watched() {
        let watched = vec![PathBuf::from("/data/inbound"), PathBuf::from("/var/drop")];

        assert!(is_under_watched(
            &watched,
            Path::new("/data/inbound/sub/report.csv")
        ));
        assert!(is_under_watched(&watched, Path::new("/var/drop/file.txt")));
        assert!(!is_under_watched(&watched, Path::new("/tmp/other.txt")));
    }

    #[test]
    fn test_watcher_nonexistent_dir() {
        let mut watcher = DirectoryWatcher::new().unwrap();

        let result = watcher.watch("/nonexistent/directory");
        assert!(result.is_err());
    }

    #[test]
    fn test_watcher_watch_and_unwatch() {
        let tmp = TempDir::new().unwrap();
        let mut watcher = DirectoryWatcher::new().unwrap();

        watcher.watch(tmp.path()).unwrap();
        assert_eq!(watcher.watched_dirs().len(), 1);

        watcher.unwatch(tmp.path()).unwrap();
        assert!(watcher.watched_dirs().is_empty());
    }

    #[test]
    fn test_translate_create_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.csv");
        fs::write(&path, b"x").unwrap();

        let event = Event::new(EventKind::Create(CreateKind::File)).add_path(path.clone());
        assert_eq!(translate(event), vec![FsEvent::FileCreated(path)]);
    }

    #[test]
    fn test_translate_create_folder() {
        let event =
            Event::new(EventKind::Create(CreateKind::Folder)).add_path(PathBuf::from("/d/sub"));
        assert_eq!(
            translate(event),
            vec![FsEvent::DirCreated(PathBuf::from("/d/sub"))]
        );
    }

    #[test]
    fn test_translate_remove_defaults_to_file() {
        let event =
            Event::new(EventKind::Remove(RemoveKind::Any)).add_path(PathBuf::from("/d/a.csv"));
        assert_eq!(
            translate(event),
            vec![FsEvent::FileDeleted(PathBuf::from("/d/a.csv"))]
        );
    }

    #[test]
    fn test_translate_rename_both() {
        let tmp = TempDir::new().unwrap();
        let to = tmp.path().join("b.csv");
        fs::write(&to, b"x").unwrap();

        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(tmp.path().join("a.csv"))
            .add_path(to.clone());

        assert_eq!(
            translate(event),
            vec![FsEvent::FileMoved {
                from: tmp.path().join("a.csv"),
                to,
            }]
        );
    }

    #[test]
    fn test_translate_access_discarded() {
        let event = Event::new(EventKind::Access(notify::event::AccessKind::Read))
            .add_path(PathBuf::from("/d/a.csv"));
        assert!(translate(event).is_empty());
    }
}
