//! Core error types for arbor-core
//!
//! This module provides error types shared by the arbor explorer crates.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use toml::de::Error as TomlError;

/// Core errors that can occur in the arbor explorer.
///
/// These errors represent failures in foundational operations such as
/// node lookup, buffer tracking, settings access, and event delivery.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A node id no longer resolves to a live node.
    ///
    /// This occurs when an async operation resumes after the tree was
    /// reloaded or the target subtree was pruned. Callers discard the
    /// stale result rather than treating this as fatal.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// A tracked buffer has unsaved modifications.
    ///
    /// Removing such a buffer requires an explicit force flag; this
    /// error is recoverable and expected to be surfaced to the user.
    #[error("buffer modified: {0:?}")]
    BufferModified(PathBuf),

    /// No tracked buffer exists for the given path.
    #[error("buffer not found: {0:?}")]
    BufferNotFound(PathBuf),

    /// A settings key holds a value of the wrong type or shape.
    #[error("invalid setting {key}: {message}")]
    InvalidSetting {
        /// Dotted option key, e.g. `file.column.time.format`.
        key: String,
        /// Human-readable description of the problem.
        message: String,
    },

    /// Event delivery failed.
    #[error("event error: {0}")]
    EventError(String),

    /// Underlying IO error bubbled up from filesystem operations.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Settings file could not be parsed.
    #[error("invalid settings file at {path:?}: {source}")]
    SettingsParse {
        /// Path of the offending TOML file.
        path: PathBuf,
        /// Underlying TOML deserialization error.
        source: TomlError,
    },
}

/// Result type alias using [`CoreError`].
pub type CoreResult<T> = Result<T, CoreError>;
