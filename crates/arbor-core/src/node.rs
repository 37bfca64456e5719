//! Node store for the explorer tree
//!
//! Nodes live in a generational arena: parent, children and sibling
//! relations are held as [`NodeId`] values rather than references, so
//! the tree can be mutated freely while async loads are suspended. A
//! freed slot bumps its generation, which makes any id captured before
//! a reload fail validation instead of touching a recycled node.
//!
//! External tables (marks, clip sets, caches) never key by [`NodeId`];
//! they use [`NodeUid`] or the path, both of which survive a reload.

use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};

/// Handle to a node slot in the arena
///
/// Valid only while the slot's generation matches; a stale id resolves
/// to `None` on lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Stable node identity derived from the normalized full path
///
/// Two nodes for the same filesystem entry compare equal across
/// reloads, which is what expansion state and mark bookkeeping key on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeUid(String);

impl NodeUid {
    /// Derives a uid from a path
    ///
    /// Separators are normalized to `/` and trailing separators are
    /// stripped, so `/a/b/` and `/a/b` produce the same uid.
    pub fn from_path(path: &Path) -> Self {
        NodeUid(normalize_path(path))
    }

    /// The normalized path string backing this uid
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalizes a path to a canonical string form
///
/// Backslashes become forward slashes and trailing separators are
/// stripped, except for a bare root.
pub fn normalize_path(path: &Path) -> String {
    let mut s = path.to_string_lossy().replace('\\', "/");
    while s.len() > 1 && s.ends_with('/') {
        s.pop();
    }
    s
}

/// Snapshot of stat data captured when the node was listed
///
/// Absent when the stat call failed; columns render blanks for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    /// Size in bytes
    pub size: u64,
    /// Modification time
    pub mtime: Option<DateTime<Local>>,
    /// Change (metadata) time
    pub ctime: Option<DateTime<Local>>,
    /// Access time
    pub atime: Option<DateTime<Local>>,
}

/// Whether a node is the tree root or a child entry
///
/// Columns register separately per kind; the root renders its own
/// template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The single tree root
    Root,
    /// Any node below the root
    Child,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Root => f.write_str("root"),
            NodeKind::Child => f.write_str("child"),
        }
    }
}

/// A single entry in the explorer tree
#[derive(Debug, Clone)]
pub struct Node {
    /// Stable identity derived from the normalized path
    pub uid: NodeUid,
    /// Root or child
    pub kind: NodeKind,
    /// Display name (compact chains join segments with `/`)
    pub name: String,
    /// Canonical absolute path
    pub path: PathBuf,
    /// Directory fact (symlinks resolved)
    pub directory: bool,
    /// Whether expand is meaningful for this node
    pub expandable: bool,
    /// Entry is a symbolic link
    pub symlink: bool,
    /// Link target for symlinks, captured at load time
    pub link_target: Option<PathBuf>,
    /// Matched the hidden rules at load time
    pub hidden: bool,
    /// No write permission bits set
    pub readonly: bool,
    /// Any execute permission bit set
    pub executable: bool,
    /// Readable by the current process
    pub readable: bool,
    /// Writable by the current process
    pub writable: bool,
    /// Stat snapshot, `None` when stat failed
    pub lstat: Option<FileStat>,
    /// Depth below the root, root is 0
    pub level: usize,
    /// Owning parent, `None` for the root
    pub parent: Option<NodeId>,
    /// `None` means not yet loaded; `Some(vec![])` is a loaded empty dir
    pub children: Option<Vec<NodeId>>,
    /// Current expansion flag
    pub expanded: bool,
    /// Top of the merged chain when this node renders compacted
    pub compacted_from: Option<PathBuf>,
}

impl Node {
    /// Creates a child node with default facts
    pub fn new<S: Into<String>>(name: S, path: PathBuf, level: usize) -> Self {
        Node {
            uid: NodeUid::from_path(&path),
            kind: NodeKind::Child,
            name: name.into(),
            path,
            directory: false,
            expandable: false,
            symlink: false,
            link_target: None,
            hidden: false,
            readonly: false,
            executable: false,
            readable: true,
            writable: true,
            lstat: None,
            level: 0,
            parent: None,
            children: None,
            expanded: false,
            compacted_from: None,
        }
        .with_level(level)
    }

    /// Creates the tree root for a directory
    pub fn root(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| normalize_path(&path));
        Node {
            kind: NodeKind::Root,
            directory: true,
            expandable: true,
            ..Node::new(name, path, 0)
        }
    }

    fn with_level(mut self, level: usize) -> Self {
        self.level = level;
        self
    }

    /// True when children have been loaded (possibly empty)
    pub fn loaded(&self) -> bool {
        self.children.is_some()
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Generational arena owning every node in one tree
///
/// Only the render engine mutates the arena during a pass; columns read
/// node snapshots. Lookups with a stale [`NodeId`] return `None`, which
/// is how results of outdated async loads get discarded.
///
/// # Example
///
/// ```
/// use arbor_core::node::{Node, NodeArena};
/// use std::path::PathBuf;
///
/// let mut arena = NodeArena::new();
/// let id = arena.insert(Node::root(PathBuf::from("/tmp")));
/// assert!(arena.contains(id));
/// arena.remove_subtree(id);
/// assert!(!arena.contains(id));
/// ```
#[derive(Debug, Default)]
pub struct NodeArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl NodeArena {
    /// Creates an empty arena
    pub fn new() -> Self {
        NodeArena::default()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no nodes are live
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a node and returns its id
    pub fn insert(&mut self, node: Node) -> NodeId {
        self.len += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    /// Resolves an id, `None` if freed or stale
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    /// Mutable resolve, `None` if freed or stale
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    /// True when the id resolves to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Frees a node and all of its descendants
    ///
    /// Returns the number of nodes freed. Stale ids free nothing.
    pub fn remove_subtree(&mut self, id: NodeId) -> usize {
        let children = match self.get(id) {
            Some(node) => node.children.clone().unwrap_or_default(),
            None => return 0,
        };
        let mut freed = 0;
        for child in children {
            freed += self.remove_subtree(child);
        }
        if self.free_slot(id) {
            freed += 1;
        }
        freed
    }

    /// Frees all descendants, leaving the node itself unloaded
    ///
    /// The node's children become `None` and its expansion flag is
    /// cleared, so the next expand reloads from the filesystem.
    pub fn prune_children(&mut self, id: NodeId) -> usize {
        let children = match self.get(id) {
            Some(node) => node.children.clone().unwrap_or_default(),
            None => return 0,
        };
        let mut freed = 0;
        for child in children {
            freed += self.remove_subtree(child);
        }
        if let Some(node) = self.get_mut(id) {
            node.children = None;
            node.expanded = false;
        }
        freed
    }

    /// Replaces a node's children list
    ///
    /// The caller is responsible for freeing any previous children.
    pub fn set_children(&mut self, id: NodeId, children: Vec<NodeId>) {
        for &child in &children {
            if let Some(node) = self.get_mut(child) {
                node.parent = Some(id);
            }
        }
        if let Some(node) = self.get_mut(id) {
            node.children = Some(children);
        }
    }

    /// The sibling that follows `id` in its parent's children list
    ///
    /// Used by the indent column to pick the glyph for a last child.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.get(id)?.parent?;
        let children = self.get(parent)?.children.as_ref()?;
        let pos = children.iter().position(|&c| c == id)?;
        children.get(pos + 1).copied()
    }

    fn free_slot(&mut self, id: NodeId) -> bool {
        let slot = match self.slots.get_mut(id.index as usize) {
            Some(slot) if slot.generation == id.generation && slot.node.is_some() => slot,
            _ => return false,
        };
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        true
    }
}
