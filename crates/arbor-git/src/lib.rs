//! arbor-git - Git status integration for the arbor tree explorer
//!
//! This crate shells out to the `git` binary and keeps an in-memory
//! cache of working tree status per repository root, so the tree view can
//! annotate nodes without blocking on a subprocess per redraw.
//!
//! # Features
//!
//! - Porcelain status parsing with rename and quoted-path support
//! - Directory status aggregation by severity
//! - A refresh-gated cache that publishes [`arbor_core::Event::GitRefreshed`]
//! - Streaming `git log` for commit pickers
//!
//! # Example
//!
//! ```no_run
//! use arbor_core::EventBus;
//! use arbor_git::GitStatusCache;
//! use std::path::Path;
//!
//! # async fn demo() -> arbor_git::GitResult<()> {
//! let cache = GitStatusCache::new(EventBus::default());
//! cache.refresh(Path::new("."), false).await?;
//! let status = cache.mixed_status(Path::new("./src/main.rs"), false);
//! # let _ = status;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod log;
pub mod status;

pub use cache::{GitRootStatus, GitStatusCache};
pub use error::{GitError, GitResult};
pub use log::{stream_log, CommitLine};
pub use status::{parse_status_output, GitFormat, GitMixedStatus};
