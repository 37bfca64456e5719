//! Render engine
//!
//! [`ViewEngine`] owns the node tree, the rendered line list, the mark
//! index and the text buffer, and keeps all four consistent while the
//! tree changes underneath them. Every mutation funnels into a render
//! pass that re-draws the smallest line range covering the change and
//! splices it into the buffer, so an expand deep in a large tree
//! touches a handful of lines rather than the whole view.
//!
//! # Features
//!
//! - Expand and collapse with plain, recursive, compacting and
//!   single-chain variants
//! - A minimal-range render planner that diffs the visible uid
//!   sequence against the previous pass
//! - Passive re-render on git, buffer and settings events published on
//!   the [`EventBus`]
//! - Reload that rebuilds the tree from disk and restores expansion by
//!   uid
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
//!     Path::new("/tmp"),
//!     Arc::new(Settings::empty()),
//!     EventBus::default(),
//!     Box::new(MemoryBuffer::new()),
//!     registrar,
//! )
//! .await?;
//! for line in engine.lines_in(0..engine.line_count()) {
//!     println!("{}", line.text);
//! }
//! # Ok(())
//! # }
//! ```

use crate::column::{ColumnContext, ColumnRegistrar};
use crate::error::ViewResult;
use crate::marks::MarkIndex;
use crate::row::{HighlightRange, RenderedRow};
use crate::select::{ClipRegister, SelectionSet};
use crate::template::{
    Pipeline, Template, DEFAULT_CHILD_LABELING_TEMPLATE, DEFAULT_CHILD_TEMPLATE,
    DEFAULT_ROOT_LABELING_TEMPLATE, DEFAULT_ROOT_TEMPLATE,
};
use arbor_core::node::{normalize_path, Node, NodeArena, NodeId, NodeKind, NodeUid};
use arbor_core::{debounce, BufferRegistry, CoreError, Event, EventBus, Settings, TextBuffer};
use arbor_fs::{list_dir, read_root, HiddenRules};
use arbor_git::GitStatusCache;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

/// How far the cursor-independent modified events are coalesced before
/// a re-render.
const MODIFIED_DEBOUNCE: Duration = Duration::from_millis(500);

/// Expansion variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpandOption {
    /// Expand one level, loading children on first use
    #[default]
    Plain,
    /// Expand the whole loaded-or-loadable subtree
    Recursive,
    /// Merge single-directory chains into one `a/b/c` node
    Compact,
    /// Undo a previous compact and expand the base directory
    Uncompact,
    /// Follow single-directory chains downward, one node per level
    RecursiveSingle,
}

/// Collapse variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollapseOption {
    /// Fold the node, keeping loaded children for a cheap re-expand
    #[default]
    Plain,
    /// Fold and drop the subtree so the next expand reloads from disk
    Recursive,
    /// Fold every node except the root
    All,
}

/// What a render pass must re-evaluate
#[derive(Debug, Clone)]
pub enum DirtySet {
    /// Every visible line is stale
    Full,
    /// Only lines belonging to these uids changed
    Nodes(HashSet<NodeUid>),
}

impl DirtySet {
    /// Builds a node-level dirty set from any uid collection
    pub fn nodes<I>(uids: I) -> Self
    where
        I: IntoIterator<Item = NodeUid>,
    {
        DirtySet::Nodes(uids.into_iter().collect())
    }

    fn merge(self, other: DirtySet) -> DirtySet {
        match (self, other) {
            (DirtySet::Full, _) | (_, DirtySet::Full) => DirtySet::Full,
            (DirtySet::Nodes(mut left), DirtySet::Nodes(right)) => {
                left.extend(right);
                DirtySet::Nodes(left)
            }
        }
    }
}

/// One rendered view line
#[derive(Debug, Clone)]
pub struct RenderedLine {
    /// Uid of the node the line belongs to
    pub uid: NodeUid,
    /// Composed text
    pub text: String,
    /// Byte-range highlight groups within `text`
    pub highlights: Vec<HighlightRange>,
}

/// Composed pipelines for both node kinds plus their labeling forms
struct Pipelines {
    child: Pipeline,
    root: Pipeline,
    child_labeling: Pipeline,
    root_labeling: Pipeline,
}

impl Pipelines {
    fn empty() -> Self {
        Pipelines {
            child: Pipeline::empty(),
            root: Pipeline::empty(),
            child_labeling: Pipeline::empty(),
            root_labeling: Pipeline::empty(),
        }
    }
}

/// Everything the render pass reads and writes, behind one lock
struct ViewState {
    arena: NodeArena,
    root: NodeId,
    by_uid: HashMap<NodeUid, NodeId>,
    rendered: Vec<RenderedLine>,
    marks: MarkIndex,
    show_hidden: bool,
    git_filter: bool,
    pending: Option<DirtySet>,
    rendering: bool,
    loading: HashMap<NodeUid, u64>,
    tree_rev: u64,
    epoch: u64,
}

/// Snapshot a render pass works from once the state lock is released
struct PassPlan {
    start: usize,
    old_end: usize,
    new_end: usize,
    nodes: Vec<Node>,
    tree_rev: u64,
    show_hidden: bool,
}

/// The tree-view engine
///
/// Created with [`ViewEngine::open`] and shared behind an [`Arc`]; all
/// methods take `&self`. Locks are never held across awaits, so tree
/// mutations may interleave with an in-flight render pass. The pass
/// detects that through a tree revision counter and re-queues itself.
pub struct ViewEngine {
    root_path: PathBuf,
    settings: Arc<Settings>,
    bus: EventBus,
    git: Arc<GitStatusCache>,
    buffers: Arc<BufferRegistry>,
    clip: Arc<ClipRegister>,
    selection: Arc<SelectionSet>,
    registrar: ColumnRegistrar,
    hidden_rules: Mutex<Arc<HiddenRules>>,
    pipelines: Mutex<Arc<Pipelines>>,
    buffer: Mutex<Box<dyn TextBuffer>>,
    state: Mutex<ViewState>,
}

impl ViewEngine {
    /// Opens a view rooted at `root` and renders the first level
    ///
    /// Constructs the git cache, buffer registry, clip register and
    /// selection set internally; accessors hand them out to callers
    /// that feed them. Git status is not fetched here, call
    /// [`refresh_git`](Self::refresh_git) once the view is up.
    ///
    /// # Errors
    ///
    /// Returns an error when the hidden-file or show-hidden settings
    /// are malformed.
    pub async fn open(
        root: &Path,
        settings: Arc<Settings>,
        bus: EventBus,
        buffer: Box<dyn TextBuffer>,
        registrar: ColumnRegistrar,
    ) -> ViewResult<Arc<ViewEngine>> {
        let show_hidden = settings.get_bool("file.showHiddenFiles", false)?;
        let rules = Arc::new(HiddenRules::from_settings(&settings)?);
        let git = Arc::new(GitStatusCache::new(bus.clone()));
        let buffers = Arc::new(BufferRegistry::new(bus.clone()));

        let root_node = read_root(root).await;
        let root_path = root_node.path.clone();
        let root_uid = root_node.uid.clone();
        let mut arena = NodeArena::new();
        let root_id = arena.insert(root_node);
        let mut by_uid = HashMap::new();
        by_uid.insert(root_uid.clone(), root_id);

        let engine = Arc::new(ViewEngine {
            root_path,
            settings,
            bus,
            git,
            buffers,
            clip: Arc::new(ClipRegister::new()),
            selection: Arc::new(SelectionSet::new()),
            registrar,
            hidden_rules: Mutex::new(rules),
            pipelines: Mutex::new(Arc::new(Pipelines::empty())),
            buffer: Mutex::new(buffer),
            state: Mutex::new(ViewState {
                arena,
                root: root_id,
                by_uid,
                rendered: Vec::new(),
                marks: MarkIndex::new(),
                show_hidden,
                git_filter: false,
                pending: None,
                rendering: false,
                loading: HashMap::new(),
                tree_rev: 0,
                epoch: 0,
            }),
        });

        let pipelines = engine.compose_pipelines().await;
        *engine.pipelines.lock() = Arc::new(pipelines);
        engine.expand(&root_uid, ExpandOption::Plain).await?;
        engine.spawn_event_loop();
        Ok(engine)
    }

    /// Uid of the root node
    pub fn root_uid(&self) -> NodeUid {
        NodeUid::from_path(&self.root_path)
    }

    /// Path the view is rooted at
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Shared git status cache
    pub fn git(&self) -> Arc<GitStatusCache> {
        Arc::clone(&self.git)
    }

    /// Shared buffer registry
    pub fn buffers(&self) -> Arc<BufferRegistry> {
        Arc::clone(&self.buffers)
    }

    /// Shared clip register
    pub fn clip(&self) -> Arc<ClipRegister> {
        Arc::clone(&self.clip)
    }

    /// Shared selection set
    pub fn selection(&self) -> Arc<SelectionSet> {
        Arc::clone(&self.selection)
    }

    /// Settings the engine reads from
    pub fn settings(&self) -> Arc<Settings> {
        Arc::clone(&self.settings)
    }

    /// Refreshes git status for the root, honoring `git.showIgnored`
    ///
    /// The cache publishes [`Event::GitRefreshed`] when done and the
    /// event loop re-renders the affected lines.
    ///
    /// # Errors
    ///
    /// Propagates git process failures and a malformed
    /// `git.showIgnored` setting.
    pub async fn refresh_git(&self) -> ViewResult<()> {
        let include_ignored = self.settings.get_bool("git.showIgnored", false)?;
        self.git.refresh(&self.root_path, include_ignored).await?;
        Ok(())
    }

    // ---- line and cursor queries -------------------------------------

    /// Number of rendered lines
    pub fn line_count(&self) -> usize {
        self.state.lock().rendered.len()
    }

    /// Rendered lines within `range`, clamped to the line count
    pub fn lines_in(&self, range: Range<usize>) -> Vec<RenderedLine> {
        let state = self.state.lock();
        let end = range.end.min(state.rendered.len());
        let start = range.start.min(end);
        state.rendered[start..end].to_vec()
    }

    /// Line a node is rendered on, if visible
    pub fn line_of(&self, uid: &NodeUid) -> Option<usize> {
        let state = self.state.lock();
        state.rendered.iter().position(|line| &line.uid == uid)
    }

    /// Uid rendered on `line`
    pub fn uid_at(&self, line: usize) -> Option<NodeUid> {
        let state = self.state.lock();
        state.rendered.get(line).map(|rendered| rendered.uid.clone())
    }

    /// Snapshot of the node rendered on `line`
    pub fn node_at(&self, line: usize) -> Option<Node> {
        let state = self.state.lock();
        let uid = &state.rendered.get(line)?.uid;
        let id = *state.by_uid.get(uid)?;
        state.arena.get(id).cloned()
    }

    /// Lines carrying a mark of `category`, ascending
    pub fn mark_lines(&self, category: &str) -> Vec<usize> {
        self.state.lock().marks.lines(category)
    }

    /// Line the cursor is on
    pub fn cursor_line(&self) -> usize {
        self.buffer.lock().cursor().0
    }

    /// Puts the cursor on `line`, column zero
    pub fn set_cursor_line(&self, line: usize) {
        self.buffer.lock().set_cursor(line, 0);
    }

    /// Moves the cursor by `delta` lines and returns where it landed
    pub fn move_cursor(&self, delta: isize) -> usize {
        let mut buffer = self.buffer.lock();
        let (line, _) = buffer.cursor();
        buffer.set_cursor(line.saturating_add_signed(delta), 0);
        buffer.cursor().0
    }

    /// Runs `f` against the backing text buffer
    pub fn with_buffer<R>(&self, f: impl FnOnce(&mut dyn TextBuffer) -> R) -> R {
        let mut buffer = self.buffer.lock();
        f(buffer.as_mut())
    }

    /// Jumps the cursor to the next `category` mark after the cursor
    ///
    /// Does not wrap. Returns the line jumped to, `None` when there is
    /// no later mark.
    pub fn next_mark(&self, category: &str) -> Option<usize> {
        let from = self.buffer.lock().cursor().0;
        let line = self.state.lock().marks.next(category, from)?;
        self.buffer.lock().set_cursor(line, 0);
        Some(line)
    }

    /// Jumps the cursor to the previous `category` mark before the cursor
    pub fn prev_mark(&self, category: &str) -> Option<usize> {
        let from = self.buffer.lock().cursor().0;
        let line = self.state.lock().marks.prev(category, from)?;
        self.buffer.lock().set_cursor(line, 0);
        Some(line)
    }

    /// Puts the cursor on a node's line
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NodeNotFound`] when the node is not
    /// currently rendered.
    pub fn goto_node(&self, uid: &NodeUid) -> ViewResult<usize> {
        let line = self
            .line_of(uid)
            .ok_or_else(|| CoreError::NodeNotFound(uid.to_string()))?;
        self.buffer.lock().set_cursor(line, 0);
        Ok(line)
    }

    /// Whether hidden nodes are currently shown
    pub fn show_hidden(&self) -> bool {
        self.state.lock().show_hidden
    }

    /// Whether the view is restricted to git-dirty nodes
    pub fn git_filter(&self) -> bool {
        self.state.lock().git_filter
    }

    // ---- tree mutations ----------------------------------------------

    /// Expands a node
    ///
    /// Children load lazily on the first expand and stay cached across
    /// a plain collapse. A failed directory listing logs a warning and
    /// leaves the node expanded over an empty child list.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NodeNotFound`] for a uid the tree does not
    /// contain.
    pub async fn expand(&self, uid: &NodeUid, option: ExpandOption) -> ViewResult<()> {
        match option {
            ExpandOption::Plain => self.expand_plain(uid).await?,
            ExpandOption::Recursive => {
                self.expand_plain(uid).await?;
                let mut queue = self.expandable_children(uid);
                while let Some(next) = queue.pop() {
                    // children can vanish mid-walk, skip rather than abort
                    if self.expand_plain(&next).await.is_ok() {
                        queue.extend(self.expandable_children(&next));
                    }
                }
            }
            ExpandOption::RecursiveSingle => {
                self.expand_plain(uid).await?;
                let mut current = uid.clone();
                while let Some(next) = self.single_expandable_child(&current) {
                    if self.expand_plain(&next).await.is_err() {
                        break;
                    }
                    current = next;
                }
            }
            ExpandOption::Compact => self.expand_compact(uid).await?,
            ExpandOption::Uncompact => self.expand_uncompact(uid).await?,
        }
        self.request_render(DirtySet::nodes([uid.clone()])).await;
        Ok(())
    }

    /// Collapses a node
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NodeNotFound`] for a uid the tree does not
    /// contain. [`CollapseOption::All`] ignores the uid argument.
    pub async fn collapse(&self, uid: &NodeUid, option: CollapseOption) -> ViewResult<()> {
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            match option {
                CollapseOption::Plain => {
                    let id = Self::known(state, uid)?;
                    if let Some(node) = state.arena.get_mut(id) {
                        if node.expanded {
                            node.expanded = false;
                            state.tree_rev += 1;
                        }
                    }
                }
                CollapseOption::Recursive => {
                    let id = Self::known(state, uid)?;
                    let mut stale = Vec::new();
                    subtree_uids(&state.arena, id, &mut stale);
                    state.arena.prune_children(id);
                    for gone in &stale {
                        state.by_uid.remove(gone);
                        state.loading.remove(gone);
                    }
                    state.tree_rev += 1;
                }
                CollapseOption::All => {
                    let mut ids = Vec::new();
                    loaded_ids(&state.arena, state.root, &mut ids);
                    let root = state.root;
                    let mut changed = false;
                    for id in ids {
                        if id == root {
                            continue;
                        }
                        if let Some(node) = state.arena.get_mut(id) {
                            if node.expanded {
                                node.expanded = false;
                                changed = true;
                            }
                        }
                    }
                    if changed {
                        state.tree_rev += 1;
                    }
                }
            }
        }
        let dirty = match option {
            CollapseOption::All => DirtySet::Full,
            _ => DirtySet::nodes([uid.clone()]),
        };
        self.request_render(dirty).await;
        Ok(())
    }

    /// Expands a collapsed node, collapses an expanded one
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NodeNotFound`] for an unknown uid.
    pub async fn toggle(&self, uid: &NodeUid) -> ViewResult<()> {
        let expanded = {
            let state = self.state.lock();
            let id = Self::known(&state, uid)?;
            state.arena.get(id).map(|node| node.expanded).unwrap_or(false)
        };
        if expanded {
            self.collapse(uid, CollapseOption::Plain).await
        } else {
            self.expand(uid, ExpandOption::Plain).await
        }
    }

    /// Shows or hides hidden nodes
    pub async fn set_show_hidden(&self, show: bool) {
        let changed = {
            let mut state = self.state.lock();
            if state.show_hidden == show {
                false
            } else {
                state.show_hidden = show;
                state.tree_rev += 1;
                true
            }
        };
        if changed {
            self.request_render(DirtySet::Full).await;
        }
    }

    /// Flips hidden-node visibility and returns the new value
    pub async fn toggle_hidden(&self) -> bool {
        let show = !self.show_hidden();
        self.set_show_hidden(show).await;
        show
    }

    /// Restricts the view to nodes with git status, or lifts that
    pub async fn set_git_filter(&self, filter: bool) {
        let changed = {
            let mut state = self.state.lock();
            if state.git_filter == filter {
                false
            } else {
                state.git_filter = filter;
                state.tree_rev += 1;
                true
            }
        };
        if changed {
            self.request_render(DirtySet::Full).await;
        }
    }

    /// Rebuilds the tree from disk, restoring expansion by uid
    ///
    /// Nodes expanded before the reload are re-expanded when a node
    /// with the same uid still exists. Compacted chains come back as
    /// plain collapsed directories.
    ///
    /// # Errors
    ///
    /// Currently infallible in practice; listing failures degrade to
    /// empty directories with a logged warning.
    pub async fn reload(&self) -> ViewResult<()> {
        let (expanded, epoch) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            state.epoch += 1;
            state.loading.clear();
            let mut expanded = HashSet::new();
            expanded_uids(&state.arena, state.root, &mut expanded);
            (expanded, state.epoch)
        };

        let mut fresh = read_root(&self.root_path).await;
        fresh.expanded = false;
        let root_uid = fresh.uid.clone();
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.epoch != epoch {
                return Ok(());
            }
            state.arena = NodeArena::new();
            state.by_uid.clear();
            let root_id = state.arena.insert(fresh);
            state.root = root_id;
            state.by_uid.insert(root_uid.clone(), root_id);
            state.tree_rev += 1;
        }

        let mut queue = Vec::new();
        if expanded.contains(&root_uid) {
            queue.push(root_uid);
        }
        while let Some(current) = queue.pop() {
            if self.state.lock().epoch != epoch {
                return Ok(());
            }
            if self.expand_plain(&current).await.is_err() {
                continue;
            }
            for child in self.expandable_children(&current) {
                if expanded.contains(&child) {
                    queue.push(child);
                }
            }
        }
        self.request_render(DirtySet::Full).await;
        Ok(())
    }

    /// Expands ancestors until `path` is visible and puts the cursor on it
    ///
    /// Turns on hidden-node display when the target or one of its
    /// ancestors is hidden.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NodeNotFound`] when `path` lies outside the
    /// root or does not exist on disk.
    pub async fn reveal(&self, path: &Path) -> ViewResult<usize> {
        let relative = path
            .strip_prefix(&self.root_path)
            .map_err(|_| CoreError::NodeNotFound(path.display().to_string()))?;
        self.expand(&self.root_uid(), ExpandOption::Plain).await?;

        let components: Vec<_> = relative.components().collect();
        let mut current = self.root_path.clone();
        let mut needs_hidden = false;
        let ancestors = components.len().saturating_sub(1);
        for component in &components[..ancestors] {
            current.push(component);
            let uid = NodeUid::from_path(&current);
            self.expand(&uid, ExpandOption::Plain).await?;
            needs_hidden |= self.node_hidden(&uid);
        }

        let uid = NodeUid::from_path(path);
        {
            let state = self.state.lock();
            Self::known(&state, &uid)?;
        }
        needs_hidden |= self.node_hidden(&uid);
        if needs_hidden {
            self.set_show_hidden(true).await;
        }
        self.goto_node(&uid)
    }

    /// Renders a node's labeling rows, one `label: content` per column
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NodeNotFound`] for an unknown uid.
    pub async fn describe(&self, uid: &NodeUid) -> ViewResult<Vec<RenderedRow>> {
        let (node, show_hidden) = {
            let state = self.state.lock();
            let id = Self::known(&state, uid)?;
            let node = state
                .arena
                .get(id)
                .cloned()
                .ok_or_else(|| CoreError::NodeNotFound(uid.to_string()))?;
            (node, state.show_hidden)
        };
        let pipelines = {
            let guard = self.pipelines.lock();
            Arc::clone(&guard)
        };
        let pipeline = match node.kind {
            NodeKind::Root => &pipelines.root_labeling,
            NodeKind::Child => &pipelines.child_labeling,
        };
        let nodes = vec![node];
        let handles = pipeline.resolve(&nodes).await;
        Ok(handles.label_rows(&nodes[0], 0, show_hidden))
    }

    // ---- rendering ---------------------------------------------------

    /// Schedules a render for `dirty`, coalescing with an in-flight pass
    ///
    /// When no pass is running this renders inline and returns once the
    /// lines and marks are up to date. When one is running the dirty
    /// set merges into its pending work instead.
    pub async fn request_render(&self, dirty: DirtySet) {
        {
            let mut state = self.state.lock();
            if state.rendering {
                state.pending = Some(match state.pending.take() {
                    Some(pending) => pending.merge(dirty),
                    None => dirty,
                });
                return;
            }
            state.rendering = true;
        }
        let mut next = dirty;
        loop {
            self.render_pass(next).await;
            let pending = {
                let mut state = self.state.lock();
                match state.pending.take() {
                    Some(pending) => Some(pending),
                    None => {
                        state.rendering = false;
                        None
                    }
                }
            };
            match pending {
                Some(pending) => next = pending,
                None => break,
            }
        }
    }

    async fn render_pass(&self, dirty: DirtySet) {
        let plan = {
            let state = self.state.lock();
            self.plan_pass(&state, &dirty)
        };
        let Some(plan) = plan else { return };

        let pipelines = {
            let guard = self.pipelines.lock();
            Arc::clone(&guard)
        };
        let child = pipelines.child.resolve(&plan.nodes).await;
        let root = pipelines.root.resolve(&plan.nodes).await;
        let mut rows = Vec::with_capacity(plan.new_end - plan.start);
        for index in plan.start..plan.new_end {
            let node = &plan.nodes[index];
            let handles = match node.kind {
                NodeKind::Root => &root,
                NodeKind::Child => &child,
            };
            rows.push(handles.draw_row(node, index, plan.show_hidden));
        }

        let texts: Vec<String> = rows.iter().map(|row| row.text.clone()).collect();
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.tree_rev != plan.tree_rev {
                // tree moved under the pass, redo with the same dirty set
                state.pending = Some(match state.pending.take() {
                    Some(pending) => pending.merge(dirty),
                    None => dirty,
                });
                return;
            }
            for line in plan.start..plan.old_end {
                state.marks.clear_line(line);
            }
            let delta = plan.new_end as isize - plan.old_end as isize;
            state.marks.shift(plan.old_end, delta);
            let mut lines = Vec::with_capacity(rows.len());
            for (offset, row) in rows.into_iter().enumerate() {
                let line = plan.start + offset;
                state.marks.set_line(line, row.categories());
                lines.push(RenderedLine {
                    uid: plan.nodes[line].uid.clone(),
                    text: row.text,
                    highlights: row.highlights,
                });
            }
            state.rendered.splice(plan.start..plan.old_end, lines);
            let count = state.rendered.len();
            state.marks.truncate(count);
        }
        self.buffer.lock().replace_lines(plan.start..plan.old_end, texts);
    }

    /// Computes the minimal line envelope a pass must redraw
    ///
    /// Diffs the previous visible uid sequence against the current one
    /// from both ends, then widens the envelope to cover every dirty
    /// uid. `None` means nothing changed.
    fn plan_pass(&self, state: &ViewState, dirty: &DirtySet) -> Option<PassPlan> {
        let ids = self.visible_ids(state);
        let mut nodes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(node) = state.arena.get(id) {
                nodes.push(node.clone());
            }
        }
        let old = &state.rendered;
        let old_len = old.len();
        let new_len = nodes.len();

        let (start, mut old_end, mut new_end) = match dirty {
            DirtySet::Full => (0, old_len, new_len),
            DirtySet::Nodes(uids) => {
                let shared = old_len.min(new_len);
                let mut prefix = 0;
                while prefix < shared && old[prefix].uid == nodes[prefix].uid {
                    prefix += 1;
                }
                let mut suffix = 0;
                while suffix < shared
                    && old[old_len - 1 - suffix].uid == nodes[new_len - 1 - suffix].uid
                {
                    suffix += 1;
                }
                let mut start = prefix;
                let mut tail = suffix;
                let old_index: HashMap<&NodeUid, usize> = old
                    .iter()
                    .enumerate()
                    .map(|(line, rendered)| (&rendered.uid, line))
                    .collect();
                let new_index: HashMap<&NodeUid, usize> = nodes
                    .iter()
                    .enumerate()
                    .map(|(line, node)| (&node.uid, line))
                    .collect();
                for uid in uids {
                    if let Some(&at) = old_index.get(uid) {
                        start = start.min(at);
                        tail = tail.min(old_len - at - 1);
                    }
                    if let Some(&at) = new_index.get(uid) {
                        start = start.min(at);
                        tail = tail.min(new_len - at - 1);
                    }
                }
                (start, old_len - tail, new_len - tail)
            }
        };
        // prefix and suffix overlap when the sequences are identical
        old_end = old_end.max(start);
        new_end = new_end.max(start);
        if start == old_end && start == new_end {
            return None;
        }
        Some(PassPlan {
            start,
            old_end,
            new_end,
            nodes,
            tree_rev: state.tree_rev,
            show_hidden: state.show_hidden,
        })
    }

    /// Depth-first visible node ids honoring hidden and git filters
    fn visible_ids(&self, state: &ViewState) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![state.root];
        while let Some(id) = stack.pop() {
            let Some(node) = state.arena.get(id) else { continue };
            if node.kind == NodeKind::Child {
                if node.hidden && !state.show_hidden {
                    continue;
                }
                if state.git_filter && self.git.mixed_status(&node.path, node.directory).is_none() {
                    continue;
                }
            }
            out.push(id);
            if node.expanded {
                if let Some(children) = &node.children {
                    for &child in children.iter().rev() {
                        stack.push(child);
                    }
                }
            }
        }
        out
    }

    // ---- expansion internals -----------------------------------------

    fn known(state: &ViewState, uid: &NodeUid) -> ViewResult<NodeId> {
        state
            .by_uid
            .get(uid)
            .copied()
            .ok_or_else(|| CoreError::NodeNotFound(uid.to_string()).into())
    }

    fn node_hidden(&self, uid: &NodeUid) -> bool {
        let state = self.state.lock();
        state
            .by_uid
            .get(uid)
            .and_then(|&id| state.arena.get(id))
            .map(|node| node.hidden)
            .unwrap_or(false)
    }

    async fn expand_plain(&self, uid: &NodeUid) -> ViewResult<()> {
        let load = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let id = Self::known(state, uid)?;
            let Some(node) = state.arena.get(id) else {
                return Ok(());
            };
            if !node.expandable {
                return Ok(());
            }
            if node.children.is_some() || state.loading.contains_key(uid) {
                None
            } else {
                let path = node.path.clone();
                let level = node.level;
                let epoch = state.epoch;
                state.loading.insert(uid.clone(), epoch);
                Some((id, path, level, epoch))
            }
        };
        if let Some((id, path, level, epoch)) = load {
            self.load_children(id, uid, &path, level, epoch).await;
        }
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(&id) = state.by_uid.get(uid) else {
                return Ok(());
            };
            if let Some(node) = state.arena.get_mut(id) {
                if node.expandable && node.children.is_some() && !node.expanded {
                    node.expanded = true;
                    state.tree_rev += 1;
                }
            }
        }
        Ok(())
    }

    /// Lists a directory off-lock and attaches the children
    ///
    /// A stale epoch or a pruned node discards the listing. Failures
    /// degrade to an empty child list so the node still expands.
    async fn load_children(&self, id: NodeId, uid: &NodeUid, path: &Path, level: usize, epoch: u64) {
        let rules = Arc::clone(&self.hidden_rules.lock());
        let listed = list_dir(path, level + 1, &rules).await;
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.loading.get(uid) == Some(&epoch) {
            state.loading.remove(uid);
        }
        if state.epoch != epoch || !state.arena.contains(id) {
            return;
        }
        let children = match listed {
            Ok(children) => children,
            Err(error) => {
                warn!(path = %path.display(), %error, "directory listing failed");
                Vec::new()
            }
        };
        let mut ids = Vec::with_capacity(children.len());
        for child in children {
            let child_uid = child.uid.clone();
            let child_id = state.arena.insert(child);
            state.by_uid.insert(child_uid, child_id);
            ids.push(child_id);
        }
        state.arena.set_children(id, ids);
        state.tree_rev += 1;
    }

    /// Merges single-directory chains into one `a/b/c` node
    async fn expand_compact(&self, uid: &NodeUid) -> ViewResult<()> {
        let marker = uid.clone();
        let (id, mut path, level, epoch) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let id = Self::known(state, uid)?;
            if state.loading.contains_key(uid) {
                return Ok(());
            }
            let Some(node) = state.arena.get(id) else {
                return Ok(());
            };
            if !node.expandable || node.symlink {
                return Ok(());
            }
            let path = node.path.clone();
            let level = node.level;
            if node.children.is_some() {
                let mut stale = Vec::new();
                subtree_uids(&state.arena, id, &mut stale);
                state.arena.prune_children(id);
                for gone in &stale {
                    state.by_uid.remove(gone);
                    state.loading.remove(gone);
                }
                state.tree_rev += 1;
            }
            let epoch = state.epoch;
            state.loading.insert(marker.clone(), epoch);
            (id, path, level, epoch)
        };

        loop {
            let rules = Arc::clone(&self.hidden_rules.lock());
            let listed = list_dir(&path, level + 1, &rules).await;
            let children = match listed {
                Ok(children) => children,
                Err(error) => {
                    warn!(path = %path.display(), %error, "directory listing failed");
                    Vec::new()
                }
            };
            let merge = children.len() == 1
                && children[0].directory
                && children[0].expandable
                && !children[0].symlink;

            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.epoch != epoch || !state.arena.contains(id) {
                state.loading.remove(&marker);
                return Ok(());
            }
            if merge {
                let Some(child) = children.into_iter().next() else {
                    state.loading.remove(&marker);
                    return Ok(());
                };
                let Some(node) = state.arena.get_mut(id) else {
                    state.loading.remove(&marker);
                    return Ok(());
                };
                let old_uid = node.uid.clone();
                if node.compacted_from.is_none() {
                    node.compacted_from = Some(node.path.clone());
                }
                node.name = format!("{}/{}", node.name, child.name);
                node.path = child.path.clone();
                node.uid = NodeUid::from_path(&node.path);
                let new_uid = node.uid.clone();
                state.by_uid.remove(&old_uid);
                state.by_uid.insert(new_uid, id);
                state.tree_rev += 1;
                drop(guard);
                path = child.path;
                continue;
            }
            let mut ids = Vec::with_capacity(children.len());
            for child in children {
                let child_uid = child.uid.clone();
                let child_id = state.arena.insert(child);
                state.by_uid.insert(child_uid, child_id);
                ids.push(child_id);
            }
            state.arena.set_children(id, ids);
            if let Some(node) = state.arena.get_mut(id) {
                node.expanded = true;
            }
            state.loading.remove(&marker);
            state.tree_rev += 1;
            return Ok(());
        }
    }

    /// Restores a compacted node to its base directory and expands it
    async fn expand_uncompact(&self, uid: &NodeUid) -> ViewResult<()> {
        let restored = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let id = Self::known(state, uid)?;
            let Some(node) = state.arena.get(id) else {
                return Ok(());
            };
            let Some(base) = node.compacted_from.clone() else {
                return Ok(());
            };
            let mut stale = Vec::new();
            subtree_uids(&state.arena, id, &mut stale);
            state.arena.prune_children(id);
            for gone in &stale {
                state.by_uid.remove(gone);
                state.loading.remove(gone);
            }
            let Some(node) = state.arena.get_mut(id) else {
                return Ok(());
            };
            let old_uid = node.uid.clone();
            node.name = base
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| normalize_path(&base));
            node.path = base;
            node.uid = NodeUid::from_path(&node.path);
            node.compacted_from = None;
            let new_uid = node.uid.clone();
            state.by_uid.remove(&old_uid);
            state.by_uid.insert(new_uid.clone(), id);
            state.tree_rev += 1;
            new_uid
        };
        self.expand_plain(&restored).await
    }

    fn expandable_children(&self, uid: &NodeUid) -> Vec<NodeUid> {
        let state = self.state.lock();
        let Some(&id) = state.by_uid.get(uid) else {
            return Vec::new();
        };
        let Some(node) = state.arena.get(id) else {
            return Vec::new();
        };
        let Some(children) = &node.children else {
            return Vec::new();
        };
        children
            .iter()
            .filter_map(|&child| state.arena.get(child))
            .filter(|child| child.directory && child.expandable && !child.symlink)
            .map(|child| child.uid.clone())
            .collect()
    }

    fn single_expandable_child(&self, uid: &NodeUid) -> Option<NodeUid> {
        let state = self.state.lock();
        let &id = state.by_uid.get(uid)?;
        let node = state.arena.get(id)?;
        let children = node.children.as_ref()?;
        if children.len() != 1 {
            return None;
        }
        let child = state.arena.get(children[0])?;
        (child.directory && child.expandable && !child.symlink).then(|| child.uid.clone())
    }

    // ---- settings and events -----------------------------------------

    async fn compose_pipelines(&self) -> Pipelines {
        let child_ctx = ColumnContext {
            settings: Arc::clone(&self.settings),
            git: Arc::clone(&self.git),
            buffers: Arc::clone(&self.buffers),
            clip: Arc::clone(&self.clip),
            selection: Arc::clone(&self.selection),
            kind: NodeKind::Child,
        };
        let root_ctx = child_ctx.with_kind(NodeKind::Root);
        Pipelines {
            child: self
                .compose_one("file.child.template", DEFAULT_CHILD_TEMPLATE, &child_ctx)
                .await,
            child_labeling: self
                .compose_one(
                    "file.child.labelingTemplate",
                    DEFAULT_CHILD_LABELING_TEMPLATE,
                    &child_ctx,
                )
                .await,
            root: self
                .compose_one("file.root.template", DEFAULT_ROOT_TEMPLATE, &root_ctx)
                .await,
            root_labeling: self
                .compose_one(
                    "file.root.labelingTemplate",
                    DEFAULT_ROOT_LABELING_TEMPLATE,
                    &root_ctx,
                )
                .await,
        }
    }

    /// Reads, parses and composes one template setting
    ///
    /// An unreadable setting falls back to the default text. A parse
    /// or composition failure leaves that pipeline empty so the view
    /// renders blank lines instead of crashing.
    async fn compose_one(&self, key: &str, default: &str, ctx: &ColumnContext) -> Pipeline {
        let text = match self.settings.get_str(key, default) {
            Ok(text) => text,
            Err(error) => {
                warn!(key, %error, "template setting unreadable, using default");
                default.to_string()
            }
        };
        let template = match Template::parse(&text) {
            Ok(template) => template,
            Err(error) => {
                warn!(key, %error, "template does not parse, view stays empty");
                return Pipeline::empty();
            }
        };
        match template.compose(&self.registrar, ctx).await {
            Ok(pipeline) => pipeline,
            Err(error) => {
                warn!(key, %error, "template composition failed, view stays empty");
                Pipeline::empty()
            }
        }
    }

    /// Re-reads templates and hidden rules after a settings change
    async fn apply_settings(&self) {
        let pipelines = self.compose_pipelines().await;
        *self.pipelines.lock() = Arc::new(pipelines);
        match HiddenRules::from_settings(&self.settings) {
            Ok(rules) => *self.hidden_rules.lock() = Arc::new(rules),
            Err(error) => warn!(%error, "hidden rules unreadable, keeping previous"),
        }
        self.request_render(DirtySet::Full).await;
    }

    /// Re-renders lines whose git status could have changed
    ///
    /// That is every line that carried a git mark before plus every
    /// rendered node that has status now. Under the git filter the
    /// visible set itself depends on status, so everything is redone.
    async fn render_git_change(&self) {
        let dirty = {
            let state = self.state.lock();
            if state.git_filter {
                None
            } else {
                let mut uids = HashSet::new();
                for line in state.marks.lines("git") {
                    if let Some(rendered) = state.rendered.get(line) {
                        uids.insert(rendered.uid.clone());
                    }
                }
                for rendered in &state.rendered {
                    let Some(&id) = state.by_uid.get(&rendered.uid) else {
                        continue;
                    };
                    let Some(node) = state.arena.get(id) else {
                        continue;
                    };
                    if node.kind == NodeKind::Root
                        || self.git.mixed_status(&node.path, node.directory).is_some()
                    {
                        uids.insert(node.uid.clone());
                    }
                }
                Some(uids)
            }
        };
        match dirty {
            None => self.request_render(DirtySet::Full).await,
            Some(uids) if uids.is_empty() => {}
            Some(uids) => self.request_render(DirtySet::Nodes(uids)).await,
        }
    }

    /// Re-renders lines whose buffer-modified indicator could have changed
    async fn render_buffer_reload(&self) {
        let dirty = {
            let state = self.state.lock();
            let mut uids = HashSet::new();
            for line in state.marks.lines("modified") {
                if let Some(rendered) = state.rendered.get(line) {
                    uids.insert(rendered.uid.clone());
                }
            }
            for rendered in &state.rendered {
                let Some(&id) = state.by_uid.get(&rendered.uid) else {
                    continue;
                };
                let Some(node) = state.arena.get(id) else {
                    continue;
                };
                let dirty_now = if node.directory {
                    !node.expanded && self.buffers.modified_under(&node.path)
                } else {
                    self.buffers.modified(&node.path)
                };
                if dirty_now {
                    uids.insert(node.uid.clone());
                }
            }
            uids
        };
        if !dirty.is_empty() {
            self.request_render(DirtySet::Nodes(dirty)).await;
        }
    }

    /// Re-renders the nodes owning a batch of modified paths
    async fn render_modified(&self, paths: Vec<PathBuf>) {
        let dirty = {
            let state = self.state.lock();
            let mut uids = HashSet::new();
            for path in &paths {
                // a change deep in a collapsed directory surfaces on the
                // nearest rendered ancestor
                for ancestor in path.ancestors() {
                    let uid = NodeUid::from_path(ancestor);
                    if state.by_uid.contains_key(&uid) {
                        uids.insert(uid);
                    }
                }
            }
            uids
        };
        if !dirty.is_empty() {
            self.request_render(DirtySet::Nodes(dirty)).await;
        }
    }

    /// Subscribes to the bus and re-renders passively
    ///
    /// Holds only a weak reference so dropping the last engine handle
    /// ends the task. Buffer-modified events are debounced because
    /// editors fire them on every keystroke.
    fn spawn_event_loop(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let mut rx = self.bus.subscribe();
        let pending: Arc<Mutex<HashSet<PathBuf>>> = Arc::new(Mutex::new(HashSet::new()));
        let flush = {
            let weak = Weak::clone(&weak);
            let pending = Arc::clone(&pending);
            debounce(MODIFIED_DEBOUNCE, move |_: ()| {
                let Some(engine) = weak.upgrade() else { return };
                let paths: Vec<PathBuf> = pending.lock().drain().collect();
                if paths.is_empty() {
                    return;
                }
                tokio::spawn(async move { engine.render_modified(paths).await });
            })
        };
        tokio::spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(_)) => {
                        let Some(engine) = weak.upgrade() else { break };
                        engine.request_render(DirtySet::Full).await;
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(engine) = weak.upgrade() else { break };
                match event {
                    Event::GitRefreshed => engine.render_git_change().await,
                    Event::BufferModified { path, .. } => {
                        pending.lock().insert(path);
                        flush.call(());
                    }
                    Event::BufferReload => engine.render_buffer_reload().await,
                    Event::SettingsChanged => engine.apply_settings().await,
                }
            }
        });
    }
}

fn subtree_uids(arena: &NodeArena, id: NodeId, out: &mut Vec<NodeUid>) {
    if let Some(node) = arena.get(id) {
        if let Some(children) = &node.children {
            for &child in children {
                if let Some(child_node) = arena.get(child) {
                    out.push(child_node.uid.clone());
                }
                subtree_uids(arena, child, out);
            }
        }
    }
}

fn loaded_ids(arena: &NodeArena, id: NodeId, out: &mut Vec<NodeId>) {
    if arena.contains(id) {
        out.push(id);
    }
    if let Some(node) = arena.get(id) {
        if let Some(children) = &node.children {
            for &child in children {
                loaded_ids(arena, child, out);
            }
        }
    }
}

fn expanded_uids(arena: &NodeArena, id: NodeId, out: &mut HashSet<NodeUid>) {
    if let Some(node) = arena.get(id) {
        if node.expanded {
            out.insert(node.uid.clone());
        }
        if let Some(children) = &node.children {
            for &child in children {
                expanded_uids(arena, child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::register_builtins;
    use arbor_core::{BufferEntry, MemoryBuffer};
    use arbor_git::{GitFormat, GitMixedStatus};
    use std::fs;
    use tempfile::TempDir;

    const PLAIN: &str = r#"
[file.child]
template = "indent icon filename"
[file.root]
template = "root"
"#;

    const GIT_NAME: &str = r#"
[file.child]
template = "git filename"
[file.root]
template = "root"
"#;

    async fn open_with(dir: &TempDir, config: &str) -> Arc<ViewEngine> {
        let settings = Arc::new(Settings::from_toml(config).unwrap());
        let mut registrar = ColumnRegistrar::new();
        register_builtins(&mut registrar);
        ViewEngine::open(
            dir.path(),
            settings,
            EventBus::default(),
            Box::new(MemoryBuffer::new()),
            registrar,
        )
        .await
        .unwrap()
    }

    fn texts(engine: &ViewEngine) -> Vec<String> {
        engine
            .lines_in(0..engine.line_count())
            .into_iter()
            .map(|line| line.text)
            .collect()
    }

    fn uid_for(dir: &TempDir, relative: &str) -> NodeUid {
        NodeUid::from_path(&dir.path().join(relative))
    }

    fn small_tree(dir: &TempDir) {
        fs::create_dir(dir.path().join("alpha")).unwrap();
        fs::write(dir.path().join("alpha/inner.txt"), "x").unwrap();
        fs::write(dir.path().join("beta.txt"), "x").unwrap();
        fs::write(dir.path().join("gamma.txt"), "x").unwrap();
    }

    fn assert_buffer_mirrors(engine: &ViewEngine) {
        let lines = texts(engine);
        engine.with_buffer(|buffer| {
            assert_eq!(buffer.line_count(), lines.len());
            assert_eq!(buffer.lines(0..lines.len()), lines);
        });
    }

    async fn settle() {
        for _ in 0..64 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_open_renders_first_level() {
        let dir = TempDir::new().unwrap();
        small_tree(&dir);
        let engine = open_with(&dir, PLAIN).await;
        let lines = texts(&engine);
        assert_eq!(lines.len(), 4);
        assert!(lines[1].ends_with("alpha"), "{lines:?}");
        assert!(lines[2].ends_with("beta.txt"));
        assert!(lines[3].ends_with("gamma.txt"));
        assert_buffer_mirrors(&engine);
    }

    #[tokio::test]
    async fn test_expand_and_collapse_update_lines() {
        let dir = TempDir::new().unwrap();
        small_tree(&dir);
        let engine = open_with(&dir, PLAIN).await;
        let alpha = uid_for(&dir, "alpha");

        engine.expand(&alpha, ExpandOption::Plain).await.unwrap();
        let lines = texts(&engine);
        assert_eq!(lines.len(), 5);
        assert!(lines[2].ends_with("inner.txt"));
        assert!(lines[2].contains('└'), "{:?}", lines[2]);
        assert_buffer_mirrors(&engine);

        engine.collapse(&alpha, CollapseOption::Plain).await.unwrap();
        let lines = texts(&engine);
        assert_eq!(lines.len(), 4);
        assert!(!lines.iter().any(|line| line.ends_with("inner.txt")));
        assert_buffer_mirrors(&engine);
    }

    #[tokio::test]
    async fn test_render_is_idempotent() {
        let dir = TempDir::new().unwrap();
        small_tree(&dir);
        let engine = open_with(&dir, GIT_NAME).await;
        engine.git().apply(
            dir.path(),
            vec![(
                dir.path().join("beta.txt"),
                GitMixedStatus::new(GitFormat::Modified, GitFormat::Modified),
            )],
        );
        engine
            .expand(&uid_for(&dir, "alpha"), ExpandOption::Plain)
            .await
            .unwrap();
        engine.request_render(DirtySet::Full).await;
        let before = texts(&engine);
        let marks_before = engine.mark_lines("git");
        assert_eq!(marks_before, vec![3]);

        engine.request_render(DirtySet::Full).await;
        assert_eq!(texts(&engine), before);
        assert_eq!(engine.mark_lines("git"), marks_before);
        assert_eq!(engine.mark_lines("gitStaged"), vec![3]);
        assert_eq!(engine.mark_lines("gitUnstaged"), vec![3]);
        assert_buffer_mirrors(&engine);
    }

    #[tokio::test]
    async fn test_goto_round_trip() {
        let dir = TempDir::new().unwrap();
        small_tree(&dir);
        let engine = open_with(&dir, PLAIN).await;
        engine
            .expand(&uid_for(&dir, "alpha"), ExpandOption::Plain)
            .await
            .unwrap();
        for line in 0..engine.line_count() {
            let uid = engine.uid_at(line).unwrap();
            assert_eq!(engine.goto_node(&uid).unwrap(), line);
            assert_eq!(engine.cursor_line(), line);
            assert_eq!(engine.node_at(line).unwrap().uid, uid);
        }
    }

    #[tokio::test]
    async fn test_unknown_dirty_uid_changes_nothing() {
        let dir = TempDir::new().unwrap();
        small_tree(&dir);
        let engine = open_with(&dir, PLAIN).await;
        let before = texts(&engine);
        let bogus = NodeUid::from_path(Path::new("/nowhere/else"));
        engine.request_render(DirtySet::nodes([bogus])).await;
        assert_eq!(texts(&engine), before);
    }

    #[tokio::test]
    async fn test_git_marks_follow_status() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("clean.txt"), "x").unwrap();
        fs::write(dir.path().join("modified.txt"), "x").unwrap();
        fs::write(dir.path().join("untracked.txt"), "x").unwrap();
        let engine = open_with(&dir, GIT_NAME).await;
        engine.git().apply(
            dir.path(),
            vec![
                (
                    dir.path().join("modified.txt"),
                    GitMixedStatus::new(GitFormat::Modified, GitFormat::Unmodified),
                ),
                (
                    dir.path().join("untracked.txt"),
                    GitMixedStatus::new(GitFormat::Untracked, GitFormat::Untracked),
                ),
            ],
        );
        engine.request_render(DirtySet::Full).await;

        let lines = texts(&engine);
        assert_eq!(lines[1], "clean.txt");
        assert_eq!(lines[2], "M  modified.txt");
        assert_eq!(lines[3], "?? untracked.txt");
        assert_eq!(engine.mark_lines("git"), vec![2, 3]);
        assert_eq!(engine.mark_lines("gitStaged"), vec![2]);
        assert_eq!(engine.mark_lines("gitUnstaged"), vec![3]);
    }

    #[tokio::test]
    async fn test_marks_shift_when_lines_move() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("alpha")).unwrap();
        fs::write(dir.path().join("alpha/inner.txt"), "x").unwrap();
        fs::write(dir.path().join("zeta.txt"), "x").unwrap();
        let engine = open_with(&dir, GIT_NAME).await;
        engine.git().apply(
            dir.path(),
            vec![(
                dir.path().join("zeta.txt"),
                GitMixedStatus::new(GitFormat::Untracked, GitFormat::Untracked),
            )],
        );
        engine.request_render(DirtySet::Full).await;
        assert_eq!(engine.mark_lines("git"), vec![2]);

        engine
            .expand(&uid_for(&dir, "alpha"), ExpandOption::Plain)
            .await
            .unwrap();
        assert_eq!(engine.mark_lines("git"), vec![3]);
        assert_eq!(engine.line_of(&uid_for(&dir, "zeta.txt")), Some(3));
        assert_eq!(texts(&engine)[3], "?? zeta.txt");
    }

    #[tokio::test]
    async fn test_plain_collapse_keeps_children_recursive_drops_them() {
        let dir = TempDir::new().unwrap();
        small_tree(&dir);
        let engine = open_with(&dir, PLAIN).await;
        let alpha = uid_for(&dir, "alpha");

        engine.expand(&alpha, ExpandOption::Plain).await.unwrap();
        assert_eq!(engine.line_count(), 5);
        engine.collapse(&alpha, CollapseOption::Plain).await.unwrap();

        fs::write(dir.path().join("alpha/new.txt"), "x").unwrap();
        engine.expand(&alpha, ExpandOption::Plain).await.unwrap();
        // cached children, the new file is not seen yet
        assert_eq!(engine.line_count(), 5);

        engine
            .collapse(&alpha, CollapseOption::Recursive)
            .await
            .unwrap();
        assert_eq!(engine.line_count(), 4);
        engine.expand(&alpha, ExpandOption::Plain).await.unwrap();
        assert_eq!(engine.line_count(), 6);
        assert!(texts(&engine).iter().any(|line| line.ends_with("new.txt")));
    }

    #[tokio::test]
    async fn test_compact_and_uncompact_round_trip() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        fs::write(dir.path().join("a/b/c/leaf.txt"), "x").unwrap();
        let engine = open_with(&dir, PLAIN).await;

        engine
            .expand(&uid_for(&dir, "a"), ExpandOption::Compact)
            .await
            .unwrap();
        let lines = texts(&engine);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with("a/b/c"), "{:?}", lines[1]);
        assert!(lines[2].ends_with("leaf.txt"));
        let compact = uid_for(&dir, "a/b/c");
        assert_eq!(engine.line_of(&compact), Some(1));

        engine
            .expand(&compact, ExpandOption::Uncompact)
            .await
            .unwrap();
        let lines = texts(&engine);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with('a'), "{:?}", lines[1]);
        assert!(lines[2].ends_with('b'), "{:?}", lines[2]);
        assert_eq!(engine.line_of(&uid_for(&dir, "a")), Some(1));
    }

    #[tokio::test]
    async fn test_recursive_expand_opens_subtree() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/deep.txt"), "x").unwrap();
        fs::write(dir.path().join("a/top.txt"), "x").unwrap();
        let engine = open_with(&dir, PLAIN).await;

        engine
            .expand(&uid_for(&dir, "a"), ExpandOption::Recursive)
            .await
            .unwrap();
        let lines = texts(&engine);
        assert_eq!(lines.len(), 5);
        assert!(lines.iter().any(|line| line.ends_with("deep.txt")));
    }

    #[tokio::test]
    async fn test_recursive_single_follows_chain_to_first_branch() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("chain/one/two/deeper")).unwrap();
        fs::write(dir.path().join("chain/one/two/leaf.txt"), "x").unwrap();
        fs::write(dir.path().join("chain/one/two/extra.txt"), "x").unwrap();
        fs::write(dir.path().join("chain/one/two/deeper/more.txt"), "x").unwrap();
        let engine = open_with(&dir, PLAIN).await;

        engine
            .expand(&uid_for(&dir, "chain"), ExpandOption::RecursiveSingle)
            .await
            .unwrap();
        let lines = texts(&engine);
        assert_eq!(lines.len(), 7, "{lines:?}");
        assert_eq!(engine.line_of(&uid_for(&dir, "chain/one/two")), Some(3));
        assert!(lines.iter().any(|line| line.ends_with("leaf.txt")));
        assert!(lines.iter().any(|line| line.ends_with("extra.txt")));
        // two has several children, nothing below it auto-expands
        assert!(!lines.iter().any(|line| line.ends_with("more.txt")));
        assert_buffer_mirrors(&engine);
    }

    #[tokio::test]
    async fn test_reveal_expands_ancestors_and_positions_cursor() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        fs::write(dir.path().join("a/b/c/leaf.txt"), "x").unwrap();
        let engine = open_with(&dir, PLAIN).await;

        let target = dir.path().join("a/b/c/leaf.txt");
        let line = engine.reveal(&target).await.unwrap();
        assert_eq!(engine.cursor_line(), line);
        assert_eq!(engine.node_at(line).unwrap().name, "leaf.txt");
        assert_eq!(engine.line_count(), 5);
    }

    #[tokio::test]
    async fn test_reveal_hidden_target_shows_hidden() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".secret"), "x").unwrap();
        fs::write(dir.path().join("plain.txt"), "x").unwrap();
        let engine = open_with(&dir, PLAIN).await;
        assert_eq!(engine.line_count(), 2);

        let line = engine.reveal(&dir.path().join(".secret")).await.unwrap();
        assert!(engine.show_hidden());
        assert_eq!(engine.node_at(line).unwrap().name, ".secret");
    }

    #[tokio::test]
    async fn test_reveal_outside_root_fails() {
        let dir = TempDir::new().unwrap();
        let engine = open_with(&dir, PLAIN).await;
        assert!(engine.reveal(Path::new("/nowhere/else")).await.is_err());
    }

    #[tokio::test]
    async fn test_hidden_toggle_changes_visible_set() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".secret"), "x").unwrap();
        fs::write(dir.path().join("plain.txt"), "x").unwrap();
        let engine = open_with(&dir, PLAIN).await;
        assert_eq!(engine.line_count(), 2);

        engine.set_show_hidden(true).await;
        let lines = texts(&engine);
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().any(|line| line.ends_with(".secret")));

        engine.set_show_hidden(false).await;
        assert_eq!(engine.line_count(), 2);
        assert_buffer_mirrors(&engine);
    }

    #[tokio::test]
    async fn test_git_filter_restricts_to_dirty_nodes() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/inside.txt"), "x").unwrap();
        fs::write(dir.path().join("clean.txt"), "x").unwrap();
        fs::write(dir.path().join("dirty.txt"), "x").unwrap();
        let engine = open_with(&dir, PLAIN).await;
        engine.git().apply(
            dir.path(),
            vec![
                (
                    dir.path().join("dirty.txt"),
                    GitMixedStatus::new(GitFormat::Untracked, GitFormat::Untracked),
                ),
                (
                    dir.path().join("sub/inside.txt"),
                    GitMixedStatus::new(GitFormat::Modified, GitFormat::Modified),
                ),
            ],
        );

        engine.set_git_filter(true).await;
        let lines = texts(&engine);
        assert_eq!(lines.len(), 3, "{lines:?}");
        assert!(lines[1].ends_with("sub"));
        assert!(lines[2].ends_with("dirty.txt"));

        engine
            .expand(&uid_for(&dir, "sub"), ExpandOption::Plain)
            .await
            .unwrap();
        assert!(texts(&engine).iter().any(|line| line.ends_with("inside.txt")));

        engine.set_git_filter(false).await;
        assert_eq!(engine.line_count(), 5);
    }

    #[tokio::test]
    async fn test_collapse_all_keeps_root_open() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("alpha")).unwrap();
        fs::write(dir.path().join("alpha/x.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("delta")).unwrap();
        fs::write(dir.path().join("delta/y.txt"), "x").unwrap();
        let engine = open_with(&dir, PLAIN).await;
        engine
            .expand(&uid_for(&dir, "alpha"), ExpandOption::Plain)
            .await
            .unwrap();
        engine
            .expand(&uid_for(&dir, "delta"), ExpandOption::Plain)
            .await
            .unwrap();
        assert_eq!(engine.line_count(), 5);

        engine
            .collapse(&engine.root_uid(), CollapseOption::All)
            .await
            .unwrap();
        assert_eq!(engine.line_count(), 3);

        // children were kept, re-expand sees the cached list
        engine
            .expand(&uid_for(&dir, "alpha"), ExpandOption::Plain)
            .await
            .unwrap();
        assert_eq!(engine.line_count(), 4);
    }

    #[tokio::test]
    async fn test_reload_restores_expansion_and_sees_new_files() {
        let dir = TempDir::new().unwrap();
        small_tree(&dir);
        let engine = open_with(&dir, PLAIN).await;
        let alpha = uid_for(&dir, "alpha");
        engine.expand(&alpha, ExpandOption::Plain).await.unwrap();
        assert_eq!(engine.line_count(), 5);

        fs::write(dir.path().join("alpha/fresh.txt"), "x").unwrap();
        engine.reload().await.unwrap();
        let lines = texts(&engine);
        assert_eq!(lines.len(), 6, "{lines:?}");
        assert!(lines.iter().any(|line| line.ends_with("fresh.txt")));
        assert_eq!(engine.line_of(&alpha), Some(1));
        assert_buffer_mirrors(&engine);
    }

    #[tokio::test]
    async fn test_describe_labels_a_file() {
        let dir = TempDir::new().unwrap();
        small_tree(&dir);
        let engine = open_with(&dir, PLAIN).await;
        let rows = engine.describe(&uid_for(&dir, "beta.txt")).await.unwrap();
        assert!(!rows.is_empty());
        assert!(rows[0].text.starts_with("fullpath: "), "{:?}", rows[0].text);
        assert!(rows.iter().any(|row| row.text.starts_with("size: 1 B")));
    }

    #[tokio::test]
    async fn test_next_and_prev_mark_jump_without_wrapping() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("one.txt"), "x").unwrap();
        fs::write(dir.path().join("two.txt"), "x").unwrap();
        fs::write(dir.path().join("zed.txt"), "x").unwrap();
        let engine = open_with(&dir, GIT_NAME).await;
        engine.git().apply(
            dir.path(),
            vec![
                (
                    dir.path().join("one.txt"),
                    GitMixedStatus::new(GitFormat::Modified, GitFormat::Unmodified),
                ),
                (
                    dir.path().join("zed.txt"),
                    GitMixedStatus::new(GitFormat::Untracked, GitFormat::Untracked),
                ),
            ],
        );
        engine.request_render(DirtySet::Full).await;
        assert_eq!(engine.mark_lines("git"), vec![1, 3]);

        engine.set_cursor_line(0);
        assert_eq!(engine.next_mark("git"), Some(1));
        assert_eq!(engine.next_mark("git"), Some(3));
        assert_eq!(engine.next_mark("git"), None);
        assert_eq!(engine.cursor_line(), 3);
        assert_eq!(engine.prev_mark("git"), Some(1));
        assert_eq!(engine.prev_mark("git"), None);
    }

    #[tokio::test]
    async fn test_settings_change_recomposes_templates() {
        let dir = TempDir::new().unwrap();
        small_tree(&dir);
        let engine = open_with(&dir, PLAIN).await;
        assert!(texts(&engine)[1].contains('▸'));

        engine
            .settings()
            .set("file.child.template", toml::Value::String("filename".into()));
        engine.apply_settings().await;
        assert_eq!(texts(&engine)[1], "alpha");
    }

    #[tokio::test]
    async fn test_buffer_reload_event_rerenders_modified_indicator() {
        let dir = TempDir::new().unwrap();
        small_tree(&dir);
        let config = r#"
[file.child]
template = "modified filename"
[file.root]
template = "root"
"#;
        let engine = open_with(&dir, config).await;
        assert_eq!(texts(&engine)[2], "beta.txt");

        engine.buffers().reload(vec![BufferEntry::new(
            1,
            &dir.path().join("beta.txt"),
            true,
        )]);
        settle().await;
        assert_eq!(texts(&engine)[2], "+ beta.txt");
        assert_eq!(engine.mark_lines("modified"), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffer_modified_events_are_debounced() {
        let dir = TempDir::new().unwrap();
        small_tree(&dir);
        let config = r#"
[file.child]
template = "modified filename"
[file.root]
template = "root"
"#;
        let engine = open_with(&dir, config).await;
        engine.buffers().reload(vec![BufferEntry::new(
            1,
            &dir.path().join("beta.txt"),
            false,
        )]);
        settle().await;
        assert_eq!(texts(&engine)[2], "beta.txt");

        engine.buffers().set_modified(1, true);
        settle().await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        settle().await;
        assert_eq!(texts(&engine)[2], "+ beta.txt");
    }
}
