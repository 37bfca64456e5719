//! Highlight groups for rendered fragments
//!
//! Columns tag fragments with group names; the front end resolves a
//! name to a concrete style at draw time. Groups either carry a style
//! directly or link to another group, mirroring editor-style highlight
//! linking. The registry is an explicit object so separate explorer
//! instances in tests never share state.

use parking_lot::RwLock;
use ratatui::style::{Color, Modifier, Style};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// What a highlight group resolves to
#[derive(Debug, Clone, PartialEq)]
pub enum HighlightTarget {
    /// Defer to another group
    Link(String),
    /// Concrete style
    Style(Style),
}

/// Name-keyed highlight group table
///
/// # Example
///
/// ```
/// use arbor_core::highlight::HighlightRegistry;
/// use ratatui::style::{Color, Style};
///
/// let registry = HighlightRegistry::new();
/// registry.define_style("Comment", Style::default().fg(Color::DarkGray));
/// registry.define_link("FileHidden", "Comment");
/// assert_eq!(registry.resolve("FileHidden").fg, Some(Color::DarkGray));
/// ```
#[derive(Debug, Default)]
pub struct HighlightRegistry {
    groups: RwLock<HashMap<String, HighlightTarget>>,
}

impl HighlightRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        HighlightRegistry::default()
    }

    /// Creates a registry seeded with the built-in explorer groups
    pub fn with_defaults() -> Self {
        let registry = HighlightRegistry::new();
        registry.seed_defaults();
        registry
    }

    /// Defines a group with a concrete style
    pub fn define_style<S: Into<String>>(&self, name: S, style: Style) {
        self.groups
            .write()
            .insert(name.into(), HighlightTarget::Style(style));
    }

    /// Defines a group linking to another group
    pub fn define_link<S: Into<String>, T: Into<String>>(&self, name: S, target: T) {
        self.groups
            .write()
            .insert(name.into(), HighlightTarget::Link(target.into()));
    }

    /// True when a group is defined
    pub fn contains(&self, name: &str) -> bool {
        self.groups.read().contains_key(name)
    }

    /// Resolves a group name to a style, following links
    ///
    /// Unknown groups and link cycles resolve to the default style; a
    /// cycle is logged once per resolve since it means the
    /// configuration linked groups into a loop.
    pub fn resolve(&self, name: &str) -> Style {
        let groups = self.groups.read();
        let mut visited = HashSet::new();
        let mut current = name;
        loop {
            if !visited.insert(current.to_string()) {
                warn!(group = name, "highlight link cycle");
                return Style::default();
            }
            match groups.get(current) {
                Some(HighlightTarget::Style(style)) => return *style,
                Some(HighlightTarget::Link(target)) => current = target,
                None => return Style::default(),
            }
        }
    }

    fn seed_defaults(&self) {
        // Base palette in the spirit of editor builtin groups.
        self.define_style("Directory", Style::default().fg(Color::Blue));
        self.define_style("Comment", Style::default().fg(Color::DarkGray));
        self.define_style("Constant", Style::default().fg(Color::Yellow));
        self.define_style("Identifier", Style::default().fg(Color::Cyan));
        self.define_style("Special", Style::default().fg(Color::Magenta));
        self.define_style("String", Style::default().fg(Color::Green));
        self.define_style("Operator", Style::default().fg(Color::LightRed));
        self.define_style("Statement", Style::default().fg(Color::Yellow));
        self.define_style("WarningMsg", Style::default().fg(Color::Yellow));
        self.define_style("ErrorMsg", Style::default().fg(Color::Red));
        self.define_style(
            "Title",
            Style::default().add_modifier(Modifier::BOLD),
        );

        // Explorer groups link into the palette.
        self.define_link("FileRoot", "Constant");
        self.define_link("FileRootName", "Identifier");
        self.define_link("FileExpandIcon", "Directory");
        self.define_link("FileDirectory", "Directory");
        self.define_link("FileSymlink", "Special");
        self.define_link("FileHidden", "Comment");
        self.define_link("FileFullpath", "Comment");
        self.define_link("FileReadonly", "Operator");
        self.define_link("FileExecutable", "String");
        self.define_link("FileSize", "Constant");
        self.define_link("IndentLine", "Comment");
        self.define_link("TimeModified", "Identifier");
        self.define_link("TimeCreated", "Identifier");
        self.define_link("TimeAccessed", "Identifier");
        self.define_link("Clip", "Statement");
        self.define_link("Selection", "WarningMsg");
        self.define_link("Label", "Comment");
        self.define_link("LinkTarget", "Comment");
        self.define_link("BufferModified", "Operator");
        self.define_link("GitStaged", "Special");
        self.define_link("GitUnstaged", "Operator");
        self.define_link("GitRootStaged", "Comment");
        self.define_link("GitRootUnstaged", "Operator");
        self.define_link("GitUntracked", "String");
        self.define_link("GitIgnored", "Comment");
        self.define_link("GitDeleted", "ErrorMsg");
        self.define_link("GitRenamed", "Special");
        self.define_link("GitUnmerged", "ErrorMsg");
    }
}
