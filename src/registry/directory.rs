//! Registry of tracked files for one watched root.
//!
//! The registry is the single ownership boundary for per-file state: the
//! event dispatcher, the reconciliation scanner, and polling consumers all
//! mutate tracked files through it, never directly. One mutex guards the
//! name-keyed map; the workload is I/O-bound, so finer-grained locking buys
//! nothing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::RegistryError;
use crate::watcher::PathFilter;

use super::tracked_file::{DuplicatePolicy, FileSnapshot, Thresholds, TrackedFile};

/// Owns the set of [`TrackedFile`]s under one watched root, keyed by name.
#[derive(Debug)]
pub struct DirectoryRegistry {
    root: PathBuf,
    alias: String,
    filter: PathFilter,
    defaults: Thresholds,
    duplicate_policy: DuplicatePolicy,
    files: Mutex<HashMap<String, TrackedFile>>,
}

impl DirectoryRegistry {
    /// Create a registry for `root` with the given filter rules and
    /// per-file threshold defaults.
    pub fn new(
        root: impl Into<PathBuf>,
        filter: PathFilter,
        defaults: Thresholds,
        duplicate_policy: DuplicatePolicy,
    ) -> Self {
        let root: PathBuf = root.into();
        let alias = root.file_name().map_or_else(
            || root.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        );

        Self {
            root,
            alias,
            filter,
            defaults,
            duplicate_policy,
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Watched root path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Short label for logs, the root's base name.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Path filter rule sets for this root.
    #[must_use]
    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    /// Start tracking the file at `path`.
    ///
    /// Returns `Ok(None)` if a file of the same name is already tracked (the
    /// existing entry wins; reconciliation and live events routinely race).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidPath`] if no tracked file can be
    /// constructed from `path`; no partial entry is left behind.
    pub fn track(&self, path: impl Into<PathBuf>) -> Result<Option<FileSnapshot>, RegistryError> {
        let file = TrackedFile::new(path, self.defaults)?;
        let mut files = self.files.lock();

        if files.contains_key(file.name()) {
            tracing::debug!(registry = %self.alias, name = %file.name(), "already tracked");
            return Ok(None);
        }

        let snapshot = file.snapshot();
        tracing::debug!(registry = %self.alias, name = %file.name(), "tracking file");
        files.insert(file.name().to_string(), file);
        Ok(Some(snapshot))
    }

    /// Stop tracking `name`. Returns the final snapshot if it was present.
    pub fn remove_by_name(&self, name: &str) -> Option<FileSnapshot> {
        let removed = self.files.lock().remove(name).map(|f| f.snapshot());
        if removed.is_some() {
            tracing::debug!(registry = %self.alias, name, "removed from registry");
        } else {
            tracing::debug!(registry = %self.alias, name, "removal requested but not tracked");
        }
        removed
    }

    /// Look up a tracked file by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<FileSnapshot> {
        self.files.lock().get(name).map(TrackedFile::snapshot)
    }

    /// Whether any tracked file currently points at `path`.
    #[must_use]
    pub fn contains_path(&self, path: &Path) -> bool {
        self.files
            .lock()
            .values()
            .any(|f| f.path() == Some(path))
    }

    /// Names of all tracked files.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.files.lock().keys().cloned().collect()
    }

    /// Snapshots of all tracked files.
    #[must_use]
    pub fn snapshot_all(&self) -> Vec<FileSnapshot> {
        self.files.lock().values().map(TrackedFile::snapshot).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }

    /// Refresh stats for every tracked file and return those satisfying all
    /// upload readiness predicates.
    #[must_use]
    pub fn uploadable(&self) -> Vec<FileSnapshot> {
        let mut files = self.files.lock();
        let uploadable: Vec<FileSnapshot> = files
            .values_mut()
            .filter_map(|file| {
                file.refresh();
                file.upload_eligible().then(|| file.snapshot())
            })
            .collect();

        tracing::debug!(
            registry = %self.alias,
            count = uploadable.len(),
            "uploadable files"
        );
        uploadable
    }

    /// Tracked files that have resided long enough to be safely removed.
    #[must_use]
    pub fn deletable(&self) -> Vec<FileSnapshot> {
        let files = self.files.lock();
        files
            .values()
            .filter(|f| f.delete_eligible())
            .map(TrackedFile::snapshot)
            .collect()
    }

    /// Tracked files that have lingered past the upload-fail window.
    #[must_use]
    pub fn upload_failures(&self) -> Vec<FileSnapshot> {
        let files = self.files.lock();
        files
            .values()
            .filter(|f| f.upload_failed())
            .map(TrackedFile::snapshot)
            .collect()
    }

    /// Atomically re-check upload eligibility and stamp the attempt.
    ///
    /// The check and the stamp happen under one lock acquisition, so two
    /// concurrent pollers cannot both claim the same file: the first claim
    /// stamps `last_upload_attempt_at`, which makes the second claim's
    /// eligibility check fail.
    pub fn claim_upload(&self, name: &str) -> bool {
        let mut files = self.files.lock();
        let Some(file) = files.get_mut(name) else {
            return false;
        };

        if file.upload_eligible() {
            file.mark_upload_attempted();
            tracing::debug!(registry = %self.alias, name, "claimed for upload");
            true
        } else {
            false
        }
    }

    /// Record a successful upload reported by the consumer.
    pub fn mark_uploaded(&self, name: &str) -> bool {
        let mut files = self.files.lock();
        files.get_mut(name).is_some_and(|file| {
            file.mark_uploaded();
            true
        })
    }

    /// Delete the tracked file from disk and, on success, drop it from the
    /// registry (a deleted file never remains tracked).
    pub fn mark_deleted(&self, name: &str) -> bool {
        let mut files = self.files.lock();
        let Some(file) = files.get_mut(name) else {
            return false;
        };

        if file.delete_from_disk() {
            files.remove(name);
            tracing::debug!(registry = %self.alias, name, "deleted and dropped from registry");
            true
        } else {
            false
        }
    }

    /// Move a tracked file into `dest_dir`, re-keying the entry in place.
    ///
    /// The entry keeps its id; a duplicate name at the destination is
    /// resolved per the registry's configured policy.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] under
    /// [`DuplicatePolicy::Fail`]; the entry is left untouched.
    pub fn mark_moved(&self, name: &str, dest_dir: &Path) -> Result<bool, RegistryError> {
        let mut files = self.files.lock();
        let Some(mut file) = files.remove(name) else {
            return Ok(false);
        };

        let result = file.move_to(dest_dir, self.duplicate_policy);
        let key = file.name().to_string();
        files.insert(key, file);
        result
    }

    /// Apply an externally observed move (a `FileMoved` event).
    ///
    /// The entry is re-keyed in place when the destination is still
    /// trackable, dropped when it moved out of tracked scope, and freshly
    /// tracked when an untracked file moved into scope.
    pub fn handle_move(&self, from: &Path, to: &Path, dest_trackable: bool) {
        let from_name = from.file_name().map(|n| n.to_string_lossy().into_owned());

        let mut files = self.files.lock();
        let tracked = from_name.as_deref().and_then(|n| files.remove(n));

        match (tracked, dest_trackable) {
            (Some(mut file), true) => match file.relocate(to.to_path_buf()) {
                Ok(()) => {
                    files.insert(file.name().to_string(), file);
                }
                Err(e) => {
                    tracing::error!(
                        registry = %self.alias,
                        to = %to.display(),
                        error = %e,
                        "dropping entry, moved to unusable path"
                    );
                }
            },
            (Some(file), false) => {
                tracing::debug!(
                    registry = %self.alias,
                    name = %file.name(),
                    to = %to.display(),
                    "moved out of tracked scope"
                );
            }
            (None, true) => {
                drop(files);
                match self.track(to) {
                    Ok(Some(snapshot)) => {
                        tracing::debug!(
                            registry = %self.alias,
                            name = %snapshot.name,
                            "moved into tracked scope"
                        );
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(
                            registry = %self.alias,
                            to = %to.display(),
                            error = %e,
                            "failed to track moved-in file"
                        );
                    }
                }
            }
            (None, false) => {}
        }
    }
}
