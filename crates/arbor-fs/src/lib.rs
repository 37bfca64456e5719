//! # arbor-fs
//!
//! Filesystem collaborator for the arbor tree explorer.
//!
//! The render engine consumes directories through [`list_dir`] and
//! single entries through [`read_node`]; both capture node facts
//! (directory, symlink, permissions, stat snapshot) at list time and
//! degrade to absent facts when the filesystem refuses an answer.
//!
//! ## Example
//!
//! ```no_run
//! use arbor_fs::{list_dir, HiddenRules};
//! use std::path::Path;
//!
//! # async fn demo() -> arbor_fs::FsResult<()> {
//! let rules = HiddenRules::default();
//! let nodes = list_dir(Path::new("/tmp"), 1, &rules).await?;
//! for node in &nodes {
//!     println!("{} dir={}", node.name, node.directory);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod hidden;
pub mod list;

pub use error::{FsError, FsResult};
pub use hidden::HiddenRules;
pub use list::{list_dir, read_node, read_root, sort_nodes};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        let rules = HiddenRules::default();
        assert!(rules.matches(".git"));
        let _ = FsError::Io(std::io::Error::other("x"));
    }
}
