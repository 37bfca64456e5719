//! Error types for the arbor-git crate

use thiserror::Error;

/// Git-specific errors
#[derive(Error, Debug)]
pub enum GitError {
    /// Git executable not found on PATH
    #[error("git executable not available")]
    GitUnavailable,

    /// Spawned git command exited with a failure
    #[error("git {command} failed: {stderr}")]
    CommandFailed {
        /// Subcommand that was run, e.g. `status`
        command: String,
        /// Captured stderr, trimmed
        stderr: String,
    },

    /// IO operation failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Git operations
pub type GitResult<T> = Result<T, GitError>;
