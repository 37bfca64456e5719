//! Commit picker overlay
//!
//! Streams `git log` subjects into a centered popup list. Commits
//! keep arriving over the channel while the overlay is open; `pump`
//! drains whatever is ready before each draw.

use arbor_git::{stream_log, CommitLine, GitResult};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use std::path::Path;
use tokio::sync::mpsc;

/// Upper bound on streamed commits
const LOG_LIMIT: usize = 500;

/// State of the commit picker overlay
pub struct CommitPicker {
    rx: mpsc::Receiver<CommitLine>,
    commits: Vec<CommitLine>,
    selected: usize,
}

impl CommitPicker {
    /// Starts streaming the log of the repository at `root`
    ///
    /// # Errors
    ///
    /// Returns an error when git is unavailable or refuses to start.
    pub fn open(root: &Path) -> GitResult<Self> {
        Ok(CommitPicker::from_receiver(stream_log(root, LOG_LIMIT)?))
    }

    /// Builds a picker fed by an already-open channel
    pub fn from_receiver(rx: mpsc::Receiver<CommitLine>) -> Self {
        CommitPicker {
            rx,
            commits: Vec::new(),
            selected: 0,
        }
    }

    /// Drains commits that arrived since the last draw
    pub fn pump(&mut self) {
        while let Ok(line) = self.rx.try_recv() {
            self.commits.push(line);
        }
    }

    /// Moves the selection down one commit
    pub fn move_down(&mut self) {
        if self.selected + 1 < self.commits.len() {
            self.selected += 1;
        }
    }

    /// Moves the selection up one commit
    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// The commit under the selection
    pub fn current(&self) -> Option<&CommitLine> {
        self.commits.get(self.selected)
    }

    /// Draws the centered popup over `area`
    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let w = area.width.min(72);
        let h = area.height.min(20);
        let x = area.x + (area.width.saturating_sub(w)) / 2;
        let y = area.y + (area.height.saturating_sub(h)) / 2;
        let popup = Rect {
            x,
            y,
            width: w,
            height: h,
        };

        frame.render_widget(Clear, popup);
        let block = Block::default()
            .title(format!(" Commits ({}) ", self.commits.len()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        if self.commits.is_empty() {
            let msg = "No commits";
            let buf = frame.buffer_mut();
            let mx = inner.x + (inner.width.saturating_sub(msg.len() as u16)) / 2;
            let my = inner.y + inner.height / 2;
            buf.set_string(mx, my, msg, Style::default().fg(Color::DarkGray));
            return;
        }

        let height = inner.height as usize;
        if height == 0 {
            return;
        }
        // selection sticks to the bottom row once past the first page
        let first = self.selected.saturating_sub(height.saturating_sub(1));
        let rows: Vec<Line> = self
            .commits
            .iter()
            .skip(first)
            .take(height)
            .enumerate()
            .map(|(i, commit)| {
                let row = Line::from(vec![
                    Span::styled(
                        format!(" {} ", commit.hash),
                        Style::default().fg(Color::Cyan),
                    ),
                    Span::raw(commit.subject.clone()),
                ]);
                if first + i == self.selected {
                    row.style(Style::default().add_modifier(Modifier::REVERSED))
                } else {
                    row
                }
            })
            .collect();
        frame.render_widget(Paragraph::new(Text::from(rows)), inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(hash: &str, subject: &str) -> CommitLine {
        CommitLine {
            hash: hash.to_string(),
            subject: subject.to_string(),
        }
    }

    fn picker_with(commits: Vec<CommitLine>) -> CommitPicker {
        let (tx, rx) = mpsc::channel(commits.len().max(1));
        for line in commits {
            tx.try_send(line).unwrap();
        }
        drop(tx);
        let mut picker = CommitPicker::from_receiver(rx);
        picker.pump();
        picker
    }

    #[test]
    fn test_pump_drains_channel() {
        let picker = picker_with(vec![
            commit("aaa1111", "one"),
            commit("bbb2222", "two"),
            commit("ccc3333", "three"),
        ]);
        assert_eq!(picker.commits.len(), 3);
        assert_eq!(picker.current().map(|c| c.hash.as_str()), Some("aaa1111"));
    }

    #[test]
    fn test_pump_picks_up_late_arrivals() {
        let (tx, rx) = mpsc::channel(4);
        let mut picker = CommitPicker::from_receiver(rx);
        picker.pump();
        assert!(picker.commits.is_empty());

        tx.try_send(commit("aaa1111", "late")).unwrap();
        picker.pump();
        assert_eq!(picker.commits.len(), 1);
    }

    #[test]
    fn test_selection_stays_in_bounds() {
        let mut picker = picker_with(vec![commit("aaa1111", "one"), commit("bbb2222", "two")]);
        picker.move_up();
        assert_eq!(picker.selected, 0);
        picker.move_down();
        picker.move_down();
        picker.move_down();
        assert_eq!(picker.selected, 1);
        assert_eq!(picker.current().map(|c| c.subject.as_str()), Some("two"));
    }

    #[test]
    fn test_empty_picker_has_no_current() {
        let mut picker = picker_with(Vec::new());
        picker.move_down();
        assert_eq!(picker.selected, 0);
        assert!(picker.current().is_none());
    }
}
