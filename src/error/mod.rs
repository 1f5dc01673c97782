//! Error types and Result aliases for outbox.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.
//!
//! Transient I/O failures inside file lifecycle operations (stat, move,
//! delete) are deliberately *not* part of this hierarchy: those operations
//! log and return a success indicator so the caller can retry on the next
//! poll. The only domain error that crosses the public boundary is a
//! duplicate-name conflict on move.

use thiserror::Error;

/// Result type alias using outbox's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for outbox operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Tracked-file registry error.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watch(#[from] WatchError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Registry-specific errors.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A path could not be turned into a tracked file.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A move collided with an existing file of the same name.
    #[error("duplicate file name '{name}' in directory '{directory}'")]
    DuplicateName { name: String, directory: String },
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatchError {
    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl RegistryError {
    /// Create an invalid-path error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests;
