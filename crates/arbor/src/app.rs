//! Application state and rendering
//!
//! Owns the view engine, the scroll window over its rendered lines,
//! the status line and the commit picker overlay. Key dispatch lives
//! in [`crate::keys`].

use crate::picker::CommitPicker;
use arbor_core::{HighlightRegistry, NodeUid};
use arbor_view::{CollapseOption, DirtySet, ExpandOption, RenderedLine, ViewEngine};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use std::sync::Arc;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Key hints shown while no status message is set
const HINTS: &str = "j/k:move  enter:toggle  .:hidden  C:commits  q:quit";

/// Top-level application state
pub struct App {
    engine: Arc<ViewEngine>,
    highlights: HighlightRegistry,
    scroll: usize,
    status: Option<String>,
    goto_pending: bool,
    picker: Option<CommitPicker>,
    quit: bool,
}

impl App {
    /// Wraps an opened view engine
    pub fn new(engine: Arc<ViewEngine>) -> Self {
        App {
            engine,
            highlights: HighlightRegistry::with_defaults(),
            scroll: 0,
            status: None,
            goto_pending: false,
            picker: None,
            quit: false,
        }
    }

    /// The engine driving the view
    pub fn engine(&self) -> &ViewEngine {
        &self.engine
    }

    /// Requests application exit
    pub fn quit(&mut self) {
        self.quit = true;
    }

    /// True once a quit was requested
    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Replaces the status message
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }

    /// Arms the `g` prefix for the next key
    pub fn arm_goto(&mut self) {
        self.goto_pending = true;
    }

    /// Consumes the pending `g` prefix
    pub fn take_goto(&mut self) -> bool {
        std::mem::take(&mut self.goto_pending)
    }

    /// True while the commit picker overlay is open
    pub fn picker_open(&self) -> bool {
        self.picker.is_some()
    }

    /// The open picker, if any
    pub fn picker_mut(&mut self) -> Option<&mut CommitPicker> {
        self.picker.as_mut()
    }

    /// Opens the commit picker overlay over the view root
    pub fn open_picker(&mut self) {
        match CommitPicker::open(self.engine.root_path()) {
            Ok(picker) => self.install_picker(picker),
            Err(e) => self.set_status(format!("git log failed: {e}")),
        }
    }

    /// Installs an already-built picker
    pub(crate) fn install_picker(&mut self, picker: CommitPicker) {
        self.picker = Some(picker);
    }

    /// Closes the commit picker overlay
    pub fn close_picker(&mut self) {
        self.picker = None;
    }

    /// Reports the picked commit in the status line and closes the picker
    pub fn pick_commit(&mut self) {
        if let Some(commit) = self.picker.as_ref().and_then(CommitPicker::current) {
            self.set_status(format!("{} {}", commit.hash, commit.subject));
        }
        self.close_picker();
    }

    // ---- engine operations, errors land in the status line -----------

    fn cursor_uid(&self) -> Option<NodeUid> {
        self.engine.uid_at(self.engine.cursor_line())
    }

    /// Expands or collapses the node under the cursor
    pub async fn toggle_cursor(&mut self) {
        let Some(uid) = self.cursor_uid() else { return };
        if let Err(e) = self.engine.toggle(&uid).await {
            self.set_status(format!("toggle failed: {e}"));
        }
    }

    /// Expands the node under the cursor
    pub async fn expand_cursor(&mut self, option: ExpandOption) {
        let Some(uid) = self.cursor_uid() else { return };
        if let Err(e) = self.engine.expand(&uid, option).await {
            self.set_status(format!("expand failed: {e}"));
        }
    }

    /// Collapses the node under the cursor
    pub async fn collapse_cursor(&mut self, option: CollapseOption) {
        let Some(uid) = self.cursor_uid() else { return };
        if let Err(e) = self.engine.collapse(&uid, option).await {
            self.set_status(format!("collapse failed: {e}"));
        }
    }

    /// Reloads the tree from disk, then git status
    pub async fn reload(&mut self) {
        if let Err(e) = self.engine.reload().await {
            self.set_status(format!("reload failed: {e}"));
            return;
        }
        if let Err(e) = self.engine.refresh_git().await {
            self.set_status(format!("git refresh failed: {e}"));
            return;
        }
        self.set_status("reloaded");
    }

    /// Flips hidden-file visibility
    pub async fn toggle_hidden(&mut self) {
        let shown = self.engine.toggle_hidden().await;
        self.set_status(if shown {
            "hidden files shown"
        } else {
            "hidden files concealed"
        });
    }

    /// Toggles selection of the node under the cursor
    pub async fn toggle_selection(&mut self) {
        let Some(uid) = self.cursor_uid() else { return };
        self.engine.selection().toggle(uid.clone());
        self.engine.request_render(DirtySet::nodes([uid])).await;
    }

    /// Copies the selection, or the cursor node, into the clip register
    pub async fn clip_copy(&mut self) {
        let uids = self.clip_targets();
        if uids.is_empty() {
            return;
        }
        self.engine.clip().copy(uids.iter().cloned());
        self.set_status(format!("{} copied", uids.len()));
        self.engine.request_render(DirtySet::Full).await;
    }

    /// Cuts the selection, or the cursor node, into the clip register
    pub async fn clip_cut(&mut self) {
        let uids = self.clip_targets();
        if uids.is_empty() {
            return;
        }
        self.engine.clip().cut(uids.iter().cloned());
        self.set_status(format!("{} cut", uids.len()));
        self.engine.request_render(DirtySet::Full).await;
    }

    /// Empties the clip register
    pub async fn clip_clear(&mut self) {
        self.engine.clip().clear();
        self.set_status("clip cleared");
        self.engine.request_render(DirtySet::Full).await;
    }

    fn clip_targets(&self) -> Vec<NodeUid> {
        let selected = self.engine.selection().uids();
        if selected.is_empty() {
            self.cursor_uid().into_iter().collect()
        } else {
            selected
        }
    }

    /// Moves the cursor onto the next git-marked line
    pub fn next_git_mark(&mut self) {
        if self.engine.next_mark("git").is_none() {
            self.set_status("no further git changes");
        }
    }

    /// Moves the cursor onto the previous git-marked line
    pub fn prev_git_mark(&mut self) {
        if self.engine.prev_mark("git").is_none() {
            self.set_status("no previous git changes");
        }
    }

    // ---- rendering ----------------------------------------------------

    /// Draws the whole frame
    pub fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(area);

        self.render_tree(frame, chunks[0]);
        self.render_status(frame, chunks[1]);

        if let Some(picker) = self.picker.as_mut() {
            picker.pump();
            picker.render(frame, area);
        }
    }

    fn render_tree(&mut self, frame: &mut Frame, area: Rect) {
        let height = area.height as usize;
        if height == 0 {
            return;
        }
        let cursor = self.engine.cursor_line();
        self.scroll = ensure_visible(self.scroll, cursor, height);

        let lines = self.engine.lines_in(self.scroll..self.scroll + height);
        let mut rows = Vec::with_capacity(lines.len());
        for (offset, line) in lines.iter().enumerate() {
            let mut row = styled_line(line, &self.highlights);
            if self.scroll + offset == cursor {
                row = row.style(Style::default().add_modifier(Modifier::REVERSED));
            }
            rows.push(row);
        }
        frame.render_widget(Paragraph::new(Text::from(rows)), area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let cursor = self.engine.cursor_line();
        let count = self.engine.line_count();
        let message = self.status.as_deref().unwrap_or(HINTS);
        let text = format!(
            " {}  {}/{}  {}",
            self.engine.root_path().display(),
            cursor + 1,
            count,
            message
        );
        let status = Paragraph::new(fit(&text, area.width as usize)).style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status, area);
    }
}

/// Scroll offset that keeps `cursor` inside a `height`-line window
fn ensure_visible(scroll: usize, cursor: usize, height: usize) -> usize {
    if cursor < scroll {
        cursor
    } else if cursor + 1 > scroll + height {
        cursor + 1 - height
    } else {
        scroll
    }
}

/// Converts a rendered line into spans with resolved styles
fn styled_line(line: &RenderedLine, highlights: &HighlightRegistry) -> Line<'static> {
    let mut spans = Vec::new();
    let mut pos = 0;
    for range in &line.highlights {
        let start = range.start.min(line.text.len());
        let end = range.end.min(line.text.len());
        if start > pos {
            spans.push(Span::raw(line.text[pos..start].to_string()));
        }
        if end > start {
            spans.push(Span::styled(
                line.text[start..end].to_string(),
                highlights.resolve(&range.group),
            ));
        }
        pos = pos.max(end);
    }
    if pos < line.text.len() {
        spans.push(Span::raw(line.text[pos..].to_string()));
    }
    Line::from(spans)
}

/// Truncates `text` to `width` display columns, ellipsis when clipped
fn fit(text: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}
