//! arbor-view - Column pipeline and render engine for the arbor tree explorer
//!
//! This crate turns the node tree into text. Columns draw fragments of a
//! row, templates arrange columns into pipelines, and the engine renders
//! the visible part of the tree into a line buffer, re-drawing only the
//! smallest line range an update touches. Byte-range marks recorded
//! during drawing feed category jumps like "next git change".
//!
//! # Features
//!
//! - A [`Column`] trait with per-pass draw handles and a registrar keyed
//!   by node kind
//! - Template parsing with `[bracket]` groups that concatenate tightly
//! - A [`MarkIndex`] that shifts with line insertions and removals
//! - [`ViewEngine`] with expand, collapse, compact, reveal, reload and
//!   passive re-render on bus events
//!
//! # Example
//!
//! ```no_run
//! use arbor_core::{EventBus, MemoryBuffer, Settings};
//! use arbor_view::{register_builtins, ColumnRegistrar, ViewEngine};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn demo() -> arbor_view::ViewResult<()> {
//! let mut registrar = ColumnRegistrar::new();
//! register_builtins(&mut registrar);
//! let engine = ViewEngine::open(
//!     Path::new("."),
//!     Arc::new(Settings::empty()),
//!     EventBus::default(),
//!     Box::new(MemoryBuffer::new()),
//!     registrar,
//! )
//! .await?;
//! println!("{} lines", engine.line_count());
//! # Ok(())
//! # }
//! ```

pub mod column;
pub mod columns;
pub mod error;
pub mod marks;
pub mod row;
pub mod select;
pub mod template;
pub mod view;

pub use column::{Column, ColumnContext, ColumnFactory, ColumnRegistrar, DrawContext, DrawHandle};
pub use columns::register_builtins;
pub use error::{ViewError, ViewResult};
pub use marks::MarkIndex;
pub use row::{AddOpts, HighlightRange, MarkRange, RenderedRow, Row};
pub use select::{ClipRegister, SelectionSet};
pub use template::{
    Pipeline, Template, DEFAULT_CHILD_LABELING_TEMPLATE, DEFAULT_CHILD_TEMPLATE,
    DEFAULT_ROOT_LABELING_TEMPLATE, DEFAULT_ROOT_TEMPLATE,
};
pub use view::{CollapseOption, DirtySet, ExpandOption, RenderedLine, ViewEngine};
