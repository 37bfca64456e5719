//! Error types for filesystem collaboration

use std::io;
use thiserror::Error;

/// Errors from the filesystem collaborator.
#[derive(Debug, Error)]
pub enum FsError {
    /// Underlying IO error from a directory read.
    ///
    /// Per-entry stat failures degrade to absent facts instead of
    /// raising this; only a failed directory listing itself surfaces.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A hidden-rule pattern failed to compile.
    ///
    /// Surfaced once as a configuration error; the rule set is then
    /// treated as empty.
    #[error("invalid hidden pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The pattern as written in the configuration.
        pattern: String,
        /// Regex compile error.
        source: regex::Error,
    },

    /// A settings key consulted by the collaborator was malformed.
    #[error(transparent)]
    Settings(#[from] arbor_core::CoreError),
}

/// Result type alias using [`FsError`].
pub type FsResult<T> = Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: FsError = io_err.into();
        assert!(matches!(err, FsError::Io(_)));
    }

    #[test]
    fn test_invalid_pattern_display() {
        let source = regex::Regex::new("[").unwrap_err();
        let err = FsError::InvalidPattern {
            pattern: "[".to_string(),
            source,
        };
        assert!(err.to_string().starts_with("invalid hidden pattern"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FsError>();
    }
}
