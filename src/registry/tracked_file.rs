//! Per-file lifecycle state machine.
//!
//! A [`TrackedFile`] is one monitored file under a watched root: a stat
//! snapshot, a tagged lifecycle state, and the timers that drive readiness.
//! Fallible disk operations (stat, move, delete) log on failure and report a
//! success indicator; the caller retries on a later poll.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::RegistryError;

/// Lifecycle thresholds, per file or inherited from the directory defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Minimum elapsed time between upload attempts.
    pub min_upload_attempt_interval: Duration,
    /// Elapsed time since discovery after which a never-uploaded file is
    /// reported as failed.
    pub min_elapsed_for_upload_fail: Duration,
    /// Elapsed time since directory entry before a file is delete-eligible.
    pub min_elapsed_for_delete: Duration,
    /// Time the size must hold steady before input is considered complete.
    pub min_elapsed_for_input_complete: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_upload_attempt_interval: Duration::from_secs(1),
            min_elapsed_for_upload_fail: Duration::from_secs(3),
            min_elapsed_for_delete: Duration::ZERO,
            min_elapsed_for_input_complete: Duration::from_secs(1),
        }
    }
}

/// How to handle a move into a directory that already holds the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Rename the file with a `<unix-timestamp>-` prefix and proceed.
    RenameWithTimestamp,
    /// Surface a [`RegistryError::DuplicateName`].
    Fail,
}

/// Tagged lifecycle state.
///
/// Replaces the independent `input_complete` / `ready_for_upload` /
/// `uploaded` / `deleted` flags of earlier designs; readiness is derived
/// from this state, so contradictory combinations cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, no successful stat yet.
    Discovered,
    /// At least one successful stat; size may still be changing.
    Stabilizing,
    /// Size held steady across the configured window.
    InputComplete,
    /// The consumer reported a successful upload.
    Uploaded { at: DateTime<Utc> },
    /// Removed from disk. Terminal.
    Deleted { at: DateTime<Utc> },
}

impl LifecycleState {
    /// Short label for logs and snapshots.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Stabilizing => "stabilizing",
            Self::InputComplete => "input-complete",
            Self::Uploaded { .. } => "uploaded",
            Self::Deleted { .. } => "deleted",
        }
    }
}

/// Stat fields that can be diffed against the cached snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatField {
    Size,
    Created,
    Accessed,
    Modified,
}

/// A single stat value, unified across fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatValue {
    Size(u64),
    Time(DateTime<Utc>),
}

/// A recorded change of one stat field against the cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatDiff {
    pub field: StatField,
    pub previous: Option<StatValue>,
    pub current: StatValue,
}

/// Point-in-time stat reading for a file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatSnapshot {
    pub size: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub accessed_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Serializable handle to a tracked file, handed to consumers.
#[derive(Debug, Clone, Serialize)]
pub struct FileSnapshot {
    pub id: Uuid,
    pub name: String,
    pub path: Option<PathBuf>,
    pub directory: String,
    pub size: Option<u64>,
    pub state: &'static str,
    pub discovered_at: DateTime<Utc>,
}

/// One monitored file under a watched root.
#[derive(Debug, Clone)]
pub struct TrackedFile {
    id: Uuid,
    name: String,
    path: Option<PathBuf>,
    directory: String,
    state: LifecycleState,
    size: Option<u64>,
    created_at: Option<DateTime<Utc>>,
    accessed_at: Option<DateTime<Utc>>,
    modified_at: Option<DateTime<Utc>>,
    last_stat_check_at: Option<DateTime<Utc>>,
    last_stat_diff_at: Option<DateTime<Utc>>,
    last_size_check_clean: bool,
    discovered_at: DateTime<Utc>,
    directory_entry_at: DateTime<Utc>,
    last_upload_attempt_at: Option<DateTime<Utc>>,
    thresholds: Thresholds,
}

impl std::fmt::Display for TrackedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<TrackedFile-{}>", self.name)
    }
}

impl TrackedFile {
    /// Construct a tracked file from a path.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidPath`] if the path has no usable file
    /// name.
    pub fn new(path: impl Into<PathBuf>, thresholds: Thresholds) -> Result<Self, RegistryError> {
        let path: PathBuf = path.into();
        let name = path
            .file_name()
            .ok_or_else(|| RegistryError::invalid_path(path.display().to_string(), "no file name"))?
            .to_str()
            .ok_or_else(|| {
                RegistryError::invalid_path(path.display().to_string(), "file name is not UTF-8")
            })?
            .to_string();
        let directory = path.parent().map_or_else(String::new, directory_label);

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            path: Some(path),
            directory,
            state: LifecycleState::Discovered,
            size: None,
            created_at: None,
            accessed_at: None,
            modified_at: None,
            last_stat_check_at: None,
            last_stat_diff_at: None,
            last_size_check_clean: false,
            discovered_at: now,
            directory_entry_at: now,
            last_upload_attempt_at: None,
            thresholds,
        })
    }

    /// Generated unique id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// File base name, unique within its registry.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current on-disk path. `None` once deleted.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Owning directory label.
    #[must_use]
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Cached size from the latest successful stat.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    #[must_use]
    pub fn discovered_at(&self) -> DateTime<Utc> {
        self.discovered_at
    }

    /// Reset whenever the file is (re)classified into a directory.
    #[must_use]
    pub fn directory_entry_at(&self) -> DateTime<Utc> {
        self.directory_entry_at
    }

    #[must_use]
    pub fn last_upload_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.last_upload_attempt_at
    }

    #[must_use]
    pub fn last_stat_diff_at(&self) -> Option<DateTime<Utc>> {
        self.last_stat_diff_at
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        matches!(self.state, LifecycleState::Deleted { .. })
    }

    #[must_use]
    pub fn is_uploaded(&self) -> bool {
        matches!(self.state, LifecycleState::Uploaded { .. })
    }

    /// Whether the producer is judged to have finished writing.
    #[must_use]
    pub fn input_complete(&self) -> bool {
        matches!(
            self.state,
            LifecycleState::InputComplete | LifecycleState::Uploaded { .. }
        )
    }

    /// Whether the file still exists on disk.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.as_ref().is_some_and(|p| p.exists())
    }

    /// Read the current stats from disk.
    ///
    /// Returns `None` if the file is gone or the stat call fails; failures
    /// are logged, never propagated.
    #[must_use]
    pub fn current_stats(&self) -> Option<StatSnapshot> {
        let path = self.path.as_ref()?;
        match fs::metadata(path) {
            Ok(metadata) => Some(StatSnapshot {
                size: metadata.len(),
                created_at: metadata.created().ok().map(DateTime::from),
                accessed_at: metadata.accessed().ok().map(DateTime::from),
                modified_at: metadata.modified().ok().map(DateTime::from),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::error!(file = %self, error = %e, "stat check failed");
                None
            }
        }
    }

    /// Compare one stat field against the cached value and update the cache.
    ///
    /// A recorded *size* diff also stamps the diff timestamp that drives the
    /// input-complete window. Returns `None` when the field is unchanged or
    /// the file could not be statted.
    pub fn stat_diff(&mut self, field: StatField) -> Option<StatDiff> {
        let stats = self.current_stats();
        self.last_stat_check_at = Some(Utc::now());

        let Some(stats) = stats else {
            if field == StatField::Size {
                self.last_size_check_clean = false;
            }
            tracing::debug!(file = %self, ?field, "no stats, file missing on disk");
            return None;
        };

        match field {
            StatField::Size => self.apply_size_check(stats.size),
            StatField::Created => {
                Self::diff_time_field(field, &mut self.created_at, stats.created_at)
            }
            StatField::Accessed => {
                Self::diff_time_field(field, &mut self.accessed_at, stats.accessed_at)
            }
            StatField::Modified => {
                Self::diff_time_field(field, &mut self.modified_at, stats.modified_at)
            }
        }
    }

    /// Refresh the full stat snapshot and advance the lifecycle state.
    ///
    /// Returns `true` if the stat succeeded.
    pub fn refresh(&mut self) -> bool {
        let stats = self.current_stats();
        self.last_stat_check_at = Some(Utc::now());

        let Some(stats) = stats else {
            self.last_size_check_clean = false;
            tracing::debug!(file = %self, "refresh found no stats");
            return false;
        };

        let diff = self.apply_size_check(stats.size);
        self.created_at = stats.created_at.or(self.created_at);
        self.accessed_at = stats.accessed_at.or(self.accessed_at);
        self.modified_at = stats.modified_at.or(self.modified_at);

        tracing::debug!(
            file = %self,
            size = stats.size,
            size_changed = diff.is_some(),
            state = self.state.label(),
            "refreshed stats"
        );
        true
    }

    /// Whether the file satisfies every upload readiness predicate.
    ///
    /// Never true before a successful stat: the state cannot leave
    /// `Discovered` without one.
    #[must_use]
    pub fn upload_eligible(&self) -> bool {
        if self.state != LifecycleState::InputComplete || !self.last_size_check_clean {
            return false;
        }

        self.last_upload_attempt_at.map_or(true, |attempted| {
            elapsed_since(attempted) > self.thresholds.min_upload_attempt_interval
        })
    }

    /// Whether the file has resided long enough to be safely removed.
    #[must_use]
    pub fn delete_eligible(&self) -> bool {
        !self.is_deleted()
            && elapsed_since(self.directory_entry_at) > self.thresholds.min_elapsed_for_delete
    }

    /// Diagnostic: the file has lingered past the upload-fail window without
    /// being deleted. The consumer decides what to do about it.
    #[must_use]
    pub fn upload_failed(&self) -> bool {
        !self.is_deleted()
            && elapsed_since(self.discovered_at) > self.thresholds.min_elapsed_for_upload_fail
    }

    /// Stamp an upload attempt.
    pub fn mark_upload_attempted(&mut self) {
        self.last_upload_attempt_at = Some(Utc::now());
    }

    /// Record a successful upload reported by the consumer.
    pub fn mark_uploaded(&mut self) {
        if self.is_deleted() {
            tracing::debug!(file = %self, "ignoring upload mark on deleted file");
            return;
        }

        self.state = LifecycleState::Uploaded { at: Utc::now() };
        tracing::debug!(file = %self, "marked uploaded");
    }

    /// Remove the underlying file from disk.
    ///
    /// On success the state becomes `Deleted` and the path is cleared;
    /// irreversible. Failures are logged and leave the state unchanged.
    pub fn delete_from_disk(&mut self) -> bool {
        let Some(path) = self.path.clone() else {
            tracing::debug!(file = %self, "delete skipped, no path");
            return false;
        };

        match fs::remove_file(&path) {
            Ok(()) => {
                self.state = LifecycleState::Deleted { at: Utc::now() };
                self.path = None;
                tracing::debug!(file = %self, "deleted from disk");
                true
            }
            Err(e) => {
                tracing::error!(file = %self, path = %path.display(), error = %e, "delete failed");
                false
            }
        }
    }

    /// Move the file into another directory.
    ///
    /// Resets the directory-entry timestamp and updates path and directory
    /// label on success. A duplicate name at the destination is either
    /// resolved with a timestamp-prefixed rename or surfaced, per `policy`.
    /// Transient I/O failures are logged and reported as `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] under [`DuplicatePolicy::Fail`].
    pub fn move_to(
        &mut self,
        dest_dir: &Path,
        policy: DuplicatePolicy,
    ) -> Result<bool, RegistryError> {
        let Some(current) = self.path.clone() else {
            tracing::debug!(file = %self, "move skipped, no path");
            return Ok(false);
        };

        let mut new_name = self.name.clone();
        if dest_dir.join(&new_name).exists() {
            match policy {
                DuplicatePolicy::Fail => {
                    return Err(RegistryError::DuplicateName {
                        name: new_name,
                        directory: directory_label(dest_dir),
                    });
                }
                DuplicatePolicy::RenameWithTimestamp => {
                    new_name = format!("{}-{}", Utc::now().timestamp(), self.name);
                }
            }
        }

        let dest = dest_dir.join(&new_name);
        match fs::rename(&current, &dest) {
            Ok(()) => {
                tracing::debug!(
                    file = %self,
                    from = %current.display(),
                    to = %dest.display(),
                    "moved directories"
                );
                self.name = new_name;
                self.path = Some(dest);
                self.directory = directory_label(dest_dir);
                self.directory_entry_at = Utc::now();
                Ok(true)
            }
            Err(e) => {
                tracing::error!(
                    file = %self,
                    from = %current.display(),
                    to = %dest.display(),
                    error = %e,
                    "move failed"
                );
                Ok(false)
            }
        }
    }

    /// Adopt a path the file was moved to by an external actor.
    ///
    /// No disk I/O: the filesystem already performed the move. Updates name,
    /// path, and directory label, and resets the directory-entry timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidPath`] if the new path has no usable
    /// file name.
    pub fn relocate(&mut self, new_path: PathBuf) -> Result<(), RegistryError> {
        let name = new_path
            .file_name()
            .ok_or_else(|| {
                RegistryError::invalid_path(new_path.display().to_string(), "no file name")
            })?
            .to_str()
            .ok_or_else(|| {
                RegistryError::invalid_path(
                    new_path.display().to_string(),
                    "file name is not UTF-8",
                )
            })?
            .to_string();

        tracing::debug!(file = %self, to = %new_path.display(), "relocated");
        self.directory = new_path.parent().map_or_else(String::new, directory_label);
        self.name = name;
        self.path = Some(new_path);
        self.directory_entry_at = Utc::now();
        Ok(())
    }

    /// Serializable handle for consumers and diagnostics.
    #[must_use]
    pub fn snapshot(&self) -> FileSnapshot {
        FileSnapshot {
            id: self.id,
            name: self.name.clone(),
            path: self.path.clone(),
            directory: self.directory.clone(),
            size: self.size,
            state: self.state.label(),
            discovered_at: self.discovered_at,
        }
    }

    fn apply_size_check(&mut self, current_size: u64) -> Option<StatDiff> {
        let previous = self.size;

        if previous == Some(current_size) {
            self.last_size_check_clean = true;
            if self.state == LifecycleState::Stabilizing {
                let stable_for = self.last_stat_diff_at.map_or(Duration::ZERO, elapsed_since);
                if stable_for >= self.thresholds.min_elapsed_for_input_complete {
                    self.state = LifecycleState::InputComplete;
                    tracing::debug!(file = %self, "input complete");
                }
            }
            return None;
        }

        self.size = Some(current_size);
        self.last_size_check_clean = false;
        self.last_stat_diff_at = Some(Utc::now());
        if self.state == LifecycleState::Discovered {
            self.state = LifecycleState::Stabilizing;
        }

        Some(StatDiff {
            field: StatField::Size,
            previous: previous.map(StatValue::Size),
            current: StatValue::Size(current_size),
        })
    }

    fn diff_time_field(
        field: StatField,
        cached: &mut Option<DateTime<Utc>>,
        current: Option<DateTime<Utc>>,
    ) -> Option<StatDiff> {
        let current = current?;
        if *cached == Some(current) {
            return None;
        }

        let previous = cached.map(StatValue::Time);
        *cached = Some(current);
        Some(StatDiff {
            field,
            previous,
            current: StatValue::Time(current),
        })
    }
}

fn elapsed_since(t: DateTime<Utc>) -> Duration {
    (Utc::now() - t).to_std().unwrap_or(Duration::ZERO)
}

fn directory_label(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |n| n.to_string_lossy().into_owned(),
    )
}
