//! Typed filesystem change events.

use std::path::{Path, PathBuf};

/// A filesystem change notification, one of the eight kinds the dispatcher
/// routes on. `Moved` variants carry both endpoints of the move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    DirCreated(PathBuf),
    DirDeleted(PathBuf),
    DirModified(PathBuf),
    DirMoved { from: PathBuf, to: PathBuf },
    FileCreated(PathBuf),
    FileDeleted(PathBuf),
    FileModified(PathBuf),
    FileMoved { from: PathBuf, to: PathBuf },
}

impl FsEvent {
    /// The path the event originated from.
    #[must_use]
    pub fn source_path(&self) -> &Path {
        match self {
            Self::DirCreated(p)
            | Self::DirDeleted(p)
            | Self::DirModified(p)
            | Self::FileCreated(p)
            | Self::FileDeleted(p)
            | Self::FileModified(p) => p,
            Self::DirMoved { from, .. } | Self::FileMoved { from, .. } => from,
        }
    }

    /// The destination path, for `Moved` variants.
    #[must_use]
    pub fn dest_path(&self) -> Option<&Path> {
        match self {
            Self::DirMoved { to, .. } | Self::FileMoved { to, .. } => Some(to),
            _ => None,
        }
    }

    /// Whether this is a directory-kind event (vs file-kind).
    #[must_use]
    pub fn is_dir_event(&self) -> bool {
        matches!(
            self,
            Self::DirCreated(_) | Self::DirDeleted(_) | Self::DirModified(_) | Self::DirMoved { .. }
        )
    }

    /// Short kind label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DirCreated(_) => "dir-created",
            Self::DirDeleted(_) => "dir-deleted",
            Self::DirModified(_) => "dir-modified",
            Self::DirMoved { .. } => "dir-moved",
            Self::FileCreated(_) => "file-created",
            Self::FileDeleted(_) => "file-deleted",
            Self::FileModified(_) => "file-modified",
            Self::FileMoved { .. } => "file-moved",
        }
    }
}
