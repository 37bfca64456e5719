//! Error types for the view crate

use arbor_core::node::NodeKind;
use thiserror::Error;

/// Errors produced while composing templates or rendering
#[derive(Error, Debug)]
pub enum ViewError {
    /// A template referenced a column name nobody registered
    #[error("unknown column '{name}' in {kind} template")]
    UnknownColumn {
        /// Which template kind referenced the name
        kind: NodeKind,
        /// The unresolved column name
        name: String,
    },

    /// The template text itself is malformed
    #[error("template parse error: {0}")]
    TemplateParse(String),

    /// Error from the core crate
    #[error(transparent)]
    Core(#[from] arbor_core::CoreError),

    /// Error from the filesystem collaborator
    #[error(transparent)]
    Fs(#[from] arbor_fs::FsError),

    /// Error from the git collaborator
    #[error(transparent)]
    Git(#[from] arbor_git::GitError),
}

/// Result alias for view operations
pub type ViewResult<T> = Result<T, ViewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_column_display() {
        let err = ViewError::UnknownColumn {
            kind: NodeKind::Child,
            name: "nope".to_string(),
        };
        assert_eq!(err.to_string(), "unknown column 'nope' in child template");
    }

    #[test]
    fn test_template_parse_display() {
        let err = ViewError::TemplateParse("unbalanced ']'".to_string());
        assert_eq!(err.to_string(), "template parse error: unbalanced ']'");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ViewError>();
    }
}
