//! Tracked-file state and the per-root registry.
//!
//! This module provides:
//! - [`TrackedFile`], the per-file lifecycle state machine
//! - [`DirectoryRegistry`], the mutex-guarded owner of all tracked files
//!   for one watched root

mod directory;
mod tracked_file;

pub use directory::DirectoryRegistry;
pub use tracked_file::{
    DuplicatePolicy, FileSnapshot, LifecycleState, StatDiff, StatField, StatSnapshot, StatValue,
    Thresholds, TrackedFile,
};
