//! Built-in column set
//!
//! Registers every column the default templates reference.
//!
//! Child columns: `indent`, `icon`, `filename`, `git`, `size`,
//! `modified`, `readonly`, `link`, `clip`, `selection`, `fullpath`,
//! `timeModified`, `timeCreated`, `timeAccessed`.
//!
//! Root columns: `root`, `title`, `fullpath`, `git`, `hidden`.
//!
//! Columns read their options from the settings store during `init`,
//! so a template re-compose after a settings change picks up new
//! glyphs and formats without restarting.

use crate::column::{Column, ColumnContext, ColumnRegistrar, DrawHandle};
use crate::error::ViewResult;
use crate::row::{AddOpts, Row};
use crate::select::{ClipRegister, SelectionSet};
use arbor_core::node::{Node, NodeKind};
use arbor_core::{normalize_path, BufferRegistry, CoreError, Settings};
use arbor_git::{GitFormat, GitStatusCache};
use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use humansize::{format_size, DECIMAL};
use std::cmp::Reverse;
use std::path::Path;
use std::sync::Arc;
use unicode_width::UnicodeWidthStr;

const DEFAULT_TIME_FORMAT: &str = "%y/%m/%d %H:%M:%S";

/// Registers the full built-in column set on a registrar
pub fn register_builtins(registrar: &mut ColumnRegistrar) {
    use NodeKind::{Child, Root};

    registrar.register(Child, "indent", |ctx| Box::new(IndentColumn::new(ctx)));
    registrar.register(Child, "icon", |ctx| Box::new(IconColumn::new(ctx)));
    registrar.register(Child, "filename", |_ctx| Box::new(FilenameColumn));
    registrar.register(Child, "git", |ctx| Box::new(GitColumn::new(ctx)));
    registrar.register(Child, "size", |_ctx| Box::new(SizeColumn));
    registrar.register(Child, "modified", |ctx| Box::new(ModifiedColumn::new(ctx)));
    registrar.register(Child, "readonly", |_ctx| Box::new(ReadonlyColumn));
    registrar.register(Child, "link", |_ctx| Box::new(LinkColumn));
    registrar.register(Child, "clip", |ctx| Box::new(ClipColumn::new(ctx)));
    registrar.register(Child, "selection", |ctx| Box::new(SelectionColumn::new(ctx)));
    registrar.register(Child, "fullpath", |_ctx| Box::new(FullpathColumn));
    for (name, field) in [
        ("timeModified", TimeField::Modified),
        ("timeCreated", TimeField::Created),
        ("timeAccessed", TimeField::Accessed),
    ] {
        registrar.register(Child, name, move |ctx| {
            Box::new(TimeColumn::new(ctx, field))
        });
    }

    registrar.register(Root, "root", |_ctx| Box::new(RootNameColumn));
    registrar.register(Root, "title", |_ctx| Box::new(RootTitleColumn));
    registrar.register(Root, "fullpath", |_ctx| Box::new(FullpathColumn));
    registrar.register(Root, "git", |ctx| Box::new(RootGitColumn::new(ctx)));
    registrar.register(Root, "hidden", |ctx| Box::new(RootHiddenColumn::new(ctx)));
}

/// Renders a path with the home directory shortened to `~`
fn display_path(path: &Path) -> String {
    let text = normalize_path(path);
    if let Some(home) = dirs::home_dir() {
        let home = normalize_path(&home);
        if text == home {
            return "~".to_string();
        }
        if let Some(rest) = text.strip_prefix(&format!("{home}/")) {
            return format!("~/{rest}");
        }
    }
    text
}

/// Tree guide glyphs derived from the sibling chain
struct IndentColumn {
    settings: Arc<Settings>,
    enabled: bool,
    unit: String,
    blank: String,
    last: String,
}

impl IndentColumn {
    fn new(ctx: &ColumnContext) -> Self {
        IndentColumn {
            settings: Arc::clone(&ctx.settings),
            enabled: true,
            unit: "│ ".to_string(),
            blank: "  ".to_string(),
            last: "└ ".to_string(),
        }
    }

    /// Guide prefix per node, from levels and sibling order alone
    ///
    /// The ancestor at each depth keeps its guide line only while a
    /// later sibling of that ancestor is still coming; the node's own
    /// segment switches to the corner glyph on the last child.
    fn prefixes(&self, nodes: &[Node]) -> Vec<String> {
        let mut has_next = vec![false; nodes.len()];
        let mut stack: Vec<usize> = Vec::new();
        for (i, node) in nodes.iter().enumerate() {
            while let Some(&top) = stack.last() {
                if nodes[top].level < node.level {
                    break;
                }
                if nodes[top].level == node.level {
                    has_next[top] = true;
                }
                stack.pop();
            }
            stack.push(i);
        }

        let mut prefixes = vec![String::new(); nodes.len()];
        let mut chain: Vec<usize> = Vec::new();
        for (i, node) in nodes.iter().enumerate() {
            while let Some(&top) = chain.last() {
                if nodes[top].level < node.level {
                    break;
                }
                chain.pop();
            }
            if node.level >= 2 {
                let mut prefix = String::new();
                for &ancestor in chain.iter().filter(|&&a| nodes[a].level >= 2) {
                    let segment = if !self.enabled {
                        &self.blank
                    } else if has_next[ancestor] {
                        &self.unit
                    } else {
                        &self.blank
                    };
                    prefix.push_str(segment);
                }
                let own = if !self.enabled {
                    &self.blank
                } else if has_next[i] {
                    &self.unit
                } else {
                    &self.last
                };
                prefix.push_str(own);
                prefixes[i] = prefix;
            }
            chain.push(i);
        }
        prefixes
    }
}

#[async_trait]
impl Column for IndentColumn {
    async fn init(&mut self) -> ViewResult<()> {
        self.enabled = self
            .settings
            .get_bool("file.column.indent.indentLine", true)?;
        self.unit = self.settings.get_str("file.column.indent.chars", "│ ")?;
        let width = self.unit.width().max(1);
        self.blank = " ".repeat(width);
        let corner_pad = width.saturating_sub("└".width());
        self.last = format!("└{}", " ".repeat(corner_pad));
        Ok(())
    }

    async fn draw(&self, nodes: &[Node]) -> DrawHandle {
        let prefixes = self.prefixes(nodes);
        DrawHandle::new(move |row: &mut Row, ctx| {
            if let Some(prefix) = prefixes.get(ctx.index) {
                row.add(prefix, AddOpts::hl("IndentLine").unicode());
            }
        })
    }
}

/// Expand state triangle for directories
struct IconColumn {
    settings: Arc<Settings>,
    expanded: String,
    collapsed: String,
}

impl IconColumn {
    fn new(ctx: &ColumnContext) -> Self {
        IconColumn {
            settings: Arc::clone(&ctx.settings),
            expanded: "▾".to_string(),
            collapsed: "▸".to_string(),
        }
    }
}

#[async_trait]
impl Column for IconColumn {
    async fn init(&mut self) -> ViewResult<()> {
        self.expanded = self.settings.get_str("icon.expanded", "▾")?;
        self.collapsed = self.settings.get_str("icon.collapsed", "▸")?;
        Ok(())
    }

    async fn draw(&self, _nodes: &[Node]) -> DrawHandle {
        let expanded = self.expanded.clone();
        let collapsed = self.collapsed.clone();
        DrawHandle::new(move |row, ctx| {
            if !ctx.node.directory {
                return;
            }
            let glyph = if ctx.node.expanded {
                &expanded
            } else {
                &collapsed
            };
            row.add(glyph, AddOpts::hl("FileExpandIcon").unicode());
        })
    }
}

/// Display name, highlighted by the most specific file fact
struct FilenameColumn;

#[async_trait]
impl Column for FilenameColumn {
    async fn draw(&self, _nodes: &[Node]) -> DrawHandle {
        DrawHandle::new(|row, ctx| {
            let node = ctx.node;
            let group = if node.symlink {
                Some("FileSymlink")
            } else if node.directory {
                Some("FileDirectory")
            } else if node.hidden {
                Some("FileHidden")
            } else if node.executable {
                Some("FileExecutable")
            } else {
                None
            };
            let opts = AddOpts {
                highlight: group,
                ..AddOpts::default()
            };
            row.add(&node.name, opts.unicode());
        })
    }
}

/// Two porcelain status characters per path
struct GitColumn {
    git: Arc<GitStatusCache>,
}

impl GitColumn {
    fn new(ctx: &ColumnContext) -> Self {
        GitColumn {
            git: Arc::clone(&ctx.git),
        }
    }
}

#[async_trait]
impl Column for GitColumn {
    async fn available(&self) -> bool {
        self.git.available().await
    }

    async fn draw(&self, _nodes: &[Node]) -> DrawHandle {
        let git = Arc::clone(&self.git);
        DrawHandle::new(move |row, ctx| {
            let node = ctx.node;
            let Some(status) = git.mixed_status(&node.path, node.directory) else {
                return;
            };
            let (x, y) = status.indicators();
            if status.ignored() {
                row.add(&x.to_string(), AddOpts::hl("GitIgnored"));
                row.add(&y.to_string(), AddOpts::hl("GitIgnored"));
                return;
            }
            row.add(&x.to_string(), AddOpts::hl_mark("GitStaged", "git"));
            row.add(&y.to_string(), AddOpts::hl_mark("GitUnstaged", "git"));
            if status.staged() {
                row.mark_line("gitStaged");
            }
            if status.unstaged() {
                row.mark_line("gitUnstaged");
            }
        })
    }
}

/// Human-readable size from the stat snapshot
struct SizeColumn;

#[async_trait]
impl Column for SizeColumn {
    async fn draw(&self, _nodes: &[Node]) -> DrawHandle {
        DrawHandle::new(|row, ctx| {
            if let Some(stat) = &ctx.node.lstat {
                row.add(&format_size(stat.size, DECIMAL), AddOpts::hl("FileSize"));
            }
        })
        .with_label_visible(|node| !node.directory)
    }
}

/// Unsaved-buffer indicator
///
/// Directories show it only while collapsed, through the prefix check,
/// so an expanded directory does not duplicate the child's own flag.
struct ModifiedColumn {
    settings: Arc<Settings>,
    buffers: Arc<BufferRegistry>,
    indicator: String,
}

impl ModifiedColumn {
    fn new(ctx: &ColumnContext) -> Self {
        ModifiedColumn {
            settings: Arc::clone(&ctx.settings),
            buffers: Arc::clone(&ctx.buffers),
            indicator: "+".to_string(),
        }
    }
}

#[async_trait]
impl Column for ModifiedColumn {
    async fn init(&mut self) -> ViewResult<()> {
        self.indicator = self
            .settings
            .get_str("file.column.modified.indicator", "+")?;
        Ok(())
    }

    async fn draw(&self, _nodes: &[Node]) -> DrawHandle {
        let buffers = Arc::clone(&self.buffers);
        let indicator = self.indicator.clone();
        DrawHandle::new(move |row, ctx| {
            let node = ctx.node;
            let dirty = if node.directory {
                !node.expanded && buffers.modified_under(&node.path)
            } else {
                buffers.modified(&node.path)
            };
            if dirty {
                row.add(
                    &indicator,
                    AddOpts::hl_mark("BufferModified", "modified").unicode(),
                );
            }
        })
        .with_label_only()
    }
}

/// `RO` tag for entries without write permission
struct ReadonlyColumn;

#[async_trait]
impl Column for ReadonlyColumn {
    async fn draw(&self, _nodes: &[Node]) -> DrawHandle {
        DrawHandle::new(|row, ctx| {
            if ctx.node.readonly {
                row.add("RO", AddOpts::hl("FileReadonly"));
            }
        })
        .with_label_only()
    }
}

/// Arrow and target for symbolic links
struct LinkColumn;

#[async_trait]
impl Column for LinkColumn {
    async fn draw(&self, _nodes: &[Node]) -> DrawHandle {
        DrawHandle::new(|row, ctx| {
            let node = ctx.node;
            if !node.symlink {
                return;
            }
            let text = match &node.link_target {
                Some(target) => format!("→ {}", target.display()),
                None => "→".to_string(),
            };
            row.add(&text, AddOpts::hl("LinkTarget").unicode());
        })
        .with_label_visible(|node| node.symlink)
    }
}

/// Copy/cut state, padded to a fixed width
///
/// The only column that pads: while the register holds anything, every
/// row gets the same width here so filenames stay aligned. An empty
/// register draws nothing at all.
struct ClipColumn {
    settings: Arc<Settings>,
    clip: Arc<ClipRegister>,
    copy: String,
    cut: String,
    width: usize,
}

impl ClipColumn {
    fn new(ctx: &ColumnContext) -> Self {
        ClipColumn {
            settings: Arc::clone(&ctx.settings),
            clip: Arc::clone(&ctx.clip),
            copy: "C".to_string(),
            cut: "X".to_string(),
            width: 1,
        }
    }

    fn padded(glyph: &str, width: usize) -> String {
        let pad = width.saturating_sub(glyph.width());
        format!("{glyph}{}", " ".repeat(pad))
    }
}

#[async_trait]
impl Column for ClipColumn {
    async fn init(&mut self) -> ViewResult<()> {
        self.copy = self.settings.get_str("file.column.clip.copy", "C")?;
        self.cut = self.settings.get_str("file.column.clip.cut", "X")?;
        self.width = self.copy.width().max(self.cut.width()).max(1);
        Ok(())
    }

    async fn draw(&self, _nodes: &[Node]) -> DrawHandle {
        let clip = Arc::clone(&self.clip);
        let copy = Self::padded(&self.copy, self.width);
        let cut = Self::padded(&self.cut, self.width);
        let blank = " ".repeat(self.width);
        DrawHandle::new(move |row, ctx| {
            if clip.is_empty() {
                return;
            }
            let text = if clip.is_copied(&ctx.node.uid) {
                &copy
            } else if clip.is_cut(&ctx.node.uid) {
                &cut
            } else {
                &blank
            };
            row.add(text, AddOpts::hl("Clip").unicode());
        })
    }
}

/// Check mark for selected nodes
struct SelectionColumn {
    settings: Arc<Settings>,
    selection: Arc<SelectionSet>,
    glyph: String,
}

impl SelectionColumn {
    fn new(ctx: &ColumnContext) -> Self {
        SelectionColumn {
            settings: Arc::clone(&ctx.settings),
            selection: Arc::clone(&ctx.selection),
            glyph: "✓".to_string(),
        }
    }
}

#[async_trait]
impl Column for SelectionColumn {
    async fn init(&mut self) -> ViewResult<()> {
        self.glyph = self.settings.get_str("icon.selected", "✓")?;
        Ok(())
    }

    async fn draw(&self, _nodes: &[Node]) -> DrawHandle {
        let selection = Arc::clone(&self.selection);
        let glyph = self.glyph.clone();
        DrawHandle::new(move |row, ctx| {
            if selection.contains(&ctx.node.uid) {
                row.add(&glyph, AddOpts::hl("Selection").unicode());
            }
        })
    }
}

/// Full path with the home prefix shortened
struct FullpathColumn;

#[async_trait]
impl Column for FullpathColumn {
    async fn draw(&self, _nodes: &[Node]) -> DrawHandle {
        DrawHandle::new(|row, ctx| {
            row.add(
                &display_path(&ctx.node.path),
                AddOpts::hl("FileFullpath").unicode(),
            );
        })
    }
}

#[derive(Clone, Copy)]
enum TimeField {
    Modified,
    Created,
    Accessed,
}

/// One of the three stat timestamps, strftime formatted
struct TimeColumn {
    settings: Arc<Settings>,
    field: TimeField,
    format: String,
}

impl TimeColumn {
    fn new(ctx: &ColumnContext, field: TimeField) -> Self {
        TimeColumn {
            settings: Arc::clone(&ctx.settings),
            field,
            format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }
}

#[async_trait]
impl Column for TimeColumn {
    async fn init(&mut self) -> ViewResult<()> {
        let format = self
            .settings
            .get_str("datetime.format", DEFAULT_TIME_FORMAT)?;
        // chrono formats lazily; reject bad patterns here instead of
        // panicking inside a draw.
        if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
            return Err(CoreError::InvalidSetting {
                key: "datetime.format".to_string(),
                message: format!("invalid strftime format '{format}'"),
            }
            .into());
        }
        self.format = format;
        Ok(())
    }

    async fn draw(&self, _nodes: &[Node]) -> DrawHandle {
        let field = self.field;
        let format = self.format.clone();
        let group = match field {
            TimeField::Modified => "TimeModified",
            TimeField::Created => "TimeCreated",
            TimeField::Accessed => "TimeAccessed",
        };
        DrawHandle::new(move |row, ctx| {
            let Some(stat) = &ctx.node.lstat else {
                return;
            };
            let time = match field {
                TimeField::Modified => stat.mtime,
                TimeField::Created => stat.ctime,
                TimeField::Accessed => stat.atime,
            };
            if let Some(time) = time {
                row.add(&time.format(&format).to_string(), AddOpts::hl(group).unicode());
            }
        })
    }
}

/// Root directory basename
struct RootNameColumn;

#[async_trait]
impl Column for RootNameColumn {
    async fn draw(&self, _nodes: &[Node]) -> DrawHandle {
        DrawHandle::new(|row, ctx| {
            row.add(&ctx.node.name, AddOpts::hl("FileRootName").unicode());
        })
    }
}

/// Fixed source tag on the root line
struct RootTitleColumn;

#[async_trait]
impl Column for RootTitleColumn {
    async fn draw(&self, _nodes: &[Node]) -> DrawHandle {
        DrawHandle::new(|row, _ctx| {
            row.add("[FILE]", AddOpts::hl("FileRoot"));
        })
    }
}

/// Aggregated status letters for everything under the root
struct RootGitColumn {
    git: Arc<GitStatusCache>,
}

impl RootGitColumn {
    fn new(ctx: &ColumnContext) -> Self {
        RootGitColumn {
            git: Arc::clone(&ctx.git),
        }
    }

    fn indicators(formats: &std::collections::HashSet<GitFormat>) -> String {
        let mut present: Vec<GitFormat> = formats
            .iter()
            .copied()
            .filter(|format| *format != GitFormat::Unmodified)
            .collect();
        present.sort_by_key(|format| Reverse(format.priority()));
        present.iter().map(GitFormat::indicator).collect()
    }
}

#[async_trait]
impl Column for RootGitColumn {
    async fn available(&self) -> bool {
        self.git.available().await
    }

    async fn draw(&self, _nodes: &[Node]) -> DrawHandle {
        let git = Arc::clone(&self.git);
        DrawHandle::new(move |row, ctx| {
            let Some(status) = git.root_status(&ctx.node.path) else {
                return;
            };
            let text = Self::indicators(&status.formats);
            if text.is_empty() {
                return;
            }
            let group = if status.all_staged {
                "GitRootStaged"
            } else {
                "GitRootUnstaged"
            };
            row.add(&text, AddOpts::hl(group));
        })
    }
}

/// Indicator on the root line while hidden files are shown
struct RootHiddenColumn {
    settings: Arc<Settings>,
    glyph: String,
}

impl RootHiddenColumn {
    fn new(ctx: &ColumnContext) -> Self {
        RootHiddenColumn {
            settings: Arc::clone(&ctx.settings),
            glyph: "H".to_string(),
        }
    }
}

#[async_trait]
impl Column for RootHiddenColumn {
    async fn init(&mut self) -> ViewResult<()> {
        self.glyph = self.settings.get_str("icon.hidden", "H")?;
        Ok(())
    }

    async fn draw(&self, _nodes: &[Node]) -> DrawHandle {
        let glyph = self.glyph.clone();
        DrawHandle::new(move |row, ctx| {
            if ctx.show_hidden {
                row.add(&glyph, AddOpts::hl("FileHidden").unicode());
            }
        })
    }
}
