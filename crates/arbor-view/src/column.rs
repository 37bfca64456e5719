//! Column registry and draw contracts
//!
//! A column is registered per node kind under a name the template can
//! reference. The registrar is an explicit object handed to the engine
//! at construction, so separate explorer instances never share state.
//!
//! Columns are resolved once when a template is composed: the factory
//! builds the column, `init` caches its configuration, and an
//! unavailable column is skipped without error. Each render pass then
//! asks every resolved column for a [`DrawHandle`] over the nodes of
//! that pass.
//!
//! # Example
//!
//! ```
//! use arbor_core::node::{Node, NodeKind};
//! use arbor_view::column::{Column, ColumnRegistrar, DrawHandle};
//! use arbor_view::row::AddOpts;
//! use async_trait::async_trait;
//!
//! struct NameColumn;
//!
//! #[async_trait]
//! impl Column for NameColumn {
//!     async fn draw(&self, _nodes: &[Node]) -> DrawHandle {
//!         DrawHandle::new(|row, ctx| {
//!             row.add(&ctx.node.name, AddOpts::default().unicode());
//!         })
//!     }
//! }
//!
//! let mut registrar = ColumnRegistrar::new();
//! registrar.register(NodeKind::Child, "name", |_ctx| Box::new(NameColumn));
//! assert!(registrar.contains(NodeKind::Child, "name"));
//! ```

use crate::error::{ViewError, ViewResult};
use crate::row::Row;
use crate::select::{ClipRegister, SelectionSet};
use arbor_core::node::{Node, NodeKind};
use arbor_core::{BufferRegistry, Settings};
use arbor_git::GitStatusCache;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Shared handles a column factory may capture
///
/// Everything is reference counted; columns keep what they need and the
/// caches outlive any single tree rebuild.
#[derive(Clone)]
pub struct ColumnContext {
    /// Dotted-key configuration store
    pub settings: Arc<Settings>,
    /// Git status cache, shared with the engine
    pub git: Arc<GitStatusCache>,
    /// Buffer modification tracker
    pub buffers: Arc<BufferRegistry>,
    /// Copy/cut register
    pub clip: Arc<ClipRegister>,
    /// Multi-select state
    pub selection: Arc<SelectionSet>,
    /// Which template kind this context builds columns for
    pub kind: NodeKind,
}

impl ColumnContext {
    /// The same context rebound to another node kind
    pub fn with_kind(&self, kind: NodeKind) -> Self {
        ColumnContext {
            kind,
            ..self.clone()
        }
    }
}

/// Per-node data handed to a draw closure
pub struct DrawContext<'a> {
    /// The node being drawn
    pub node: &'a Node,
    /// Position of the node within this pass's slice
    pub index: usize,
    /// True when drawing label lines instead of tree rows
    pub labeling: bool,
    /// Whether hidden files are currently shown
    pub show_hidden: bool,
}

/// Per-node draw closure type
pub type DrawFn = Box<dyn Fn(&mut Row, &DrawContext<'_>) + Send>;

/// Label-line visibility predicate type
pub type LabelVisibleFn = Box<dyn Fn(&Node) -> bool + Send>;

/// The capabilities a column resolves to for one render pass
///
/// `draw_node` is mandatory; the label fields only matter when the
/// engine renders a node's label lines. `label_only` marks columns
/// whose label name alone carries the meaning, like `readonly`.
pub struct DrawHandle {
    /// Draws one node into a row
    pub draw_node: DrawFn,
    /// In labeling output, show the label name without content
    pub label_only: bool,
    /// Skips the label line when the predicate rejects the node
    pub label_visible: Option<LabelVisibleFn>,
}

impl DrawHandle {
    /// Wraps a draw closure with default label capabilities
    pub fn new<F>(draw: F) -> Self
    where
        F: Fn(&mut Row, &DrawContext<'_>) + Send + 'static,
    {
        DrawHandle {
            draw_node: Box::new(draw),
            label_only: false,
            label_visible: None,
        }
    }

    /// Marks the column as label-name-only in labeling output
    pub fn with_label_only(mut self) -> Self {
        self.label_only = true;
        self
    }

    /// Attaches a label visibility predicate
    pub fn with_label_visible<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Node) -> bool + Send + 'static,
    {
        self.label_visible = Some(Box::new(predicate));
        self
    }

    /// Applies the visibility predicate, defaulting to visible
    pub fn visible_for(&self, node: &Node) -> bool {
        match &self.label_visible {
            Some(predicate) => predicate(node),
            None => true,
        }
    }
}

/// A named, registered renderer for one slice of every row
#[async_trait]
pub trait Column: Send + Sync {
    /// One-time setup after construction
    ///
    /// Reads and caches configuration. A failure here is a
    /// configuration error; the composer logs it once and drops the
    /// column from the pipeline.
    async fn init(&mut self) -> ViewResult<()> {
        Ok(())
    }

    /// Whether the column can contribute at all
    ///
    /// An unavailable column is omitted silently, e.g. the git column
    /// without a git executable.
    async fn available(&self) -> bool {
        true
    }

    /// Resolves the draw capabilities for one render pass
    ///
    /// Receives every node the pass will draw so per-node work, like
    /// the indent guide prefixes, can be computed up front.
    async fn draw(&self, nodes: &[Node]) -> DrawHandle;
}

impl fmt::Debug for dyn Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn Column")
    }
}

/// Factory producing a column from its context
pub type ColumnFactory = Box<dyn Fn(&ColumnContext) -> Box<dyn Column> + Send + Sync>;

/// Name-to-factory registry, keyed per node kind
#[derive(Default)]
pub struct ColumnRegistrar {
    factories: HashMap<(NodeKind, String), ColumnFactory>,
}

impl ColumnRegistrar {
    /// Creates an empty registrar
    pub fn new() -> Self {
        ColumnRegistrar::default()
    }

    /// Registers a factory under a kind and name
    ///
    /// Re-registering a name replaces the previous factory, which is
    /// how a caller overrides a built-in column.
    pub fn register<S, F>(&mut self, kind: NodeKind, name: S, factory: F)
    where
        S: Into<String>,
        F: Fn(&ColumnContext) -> Box<dyn Column> + Send + Sync + 'static,
    {
        self.factories.insert((kind, name.into()), Box::new(factory));
    }

    /// True when a name is registered for the kind
    pub fn contains(&self, kind: NodeKind, name: &str) -> bool {
        self.factories.contains_key(&(kind, name.to_string()))
    }

    /// Registered names for a kind, sorted
    pub fn names(&self, kind: NodeKind) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Builds a column instance for a template reference
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::UnknownColumn`] when nothing is registered
    /// under the name; the composer surfaces that once and treats the
    /// template as empty.
    pub fn create(
        &self,
        kind: NodeKind,
        name: &str,
        ctx: &ColumnContext,
    ) -> ViewResult<Box<dyn Column>> {
        match self.factories.get(&(kind, name.to_string())) {
            Some(factory) => Ok(factory(ctx)),
            None => Err(ViewError::UnknownColumn {
                kind,
                name: name.to_string(),
            }),
        }
    }
}
