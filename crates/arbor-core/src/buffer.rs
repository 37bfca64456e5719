//! Host buffer abstraction
//!
//! The render engine writes rows into a line buffer through this trait
//! and positions the cursor for navigation. The engine always computes
//! replacement ranges against its own rendered cache, so a range past
//! the end is a bookkeeping bug; implementations assert in debug builds
//! and clamp in release.

use std::ops::Range;

/// Line-addressed text buffer the engine renders into
pub trait TextBuffer: Send {
    /// Number of lines currently in the buffer
    fn line_count(&self) -> usize;

    /// Reads the lines in `range`, clamped to the buffer length
    fn lines(&self, range: Range<usize>) -> Vec<String>;

    /// Replaces the lines in `range` with `lines`
    ///
    /// The replacement may change the line count; the engine issues at
    /// most one call per render pass.
    fn replace_lines(&mut self, range: Range<usize>, lines: Vec<String>);

    /// Current cursor position as (line, byte column)
    fn cursor(&self) -> (usize, usize);

    /// Moves the cursor, clamped to the buffer contents
    fn set_cursor(&mut self, line: usize, col: usize);
}

/// Growable in-memory buffer
///
/// Backs the terminal front end and every engine test.
#[derive(Debug, Default)]
pub struct MemoryBuffer {
    lines: Vec<String>,
    cursor: (usize, usize),
}

impl MemoryBuffer {
    /// Creates an empty buffer
    pub fn new() -> Self {
        MemoryBuffer::default()
    }

    /// All lines, for display
    pub fn all_lines(&self) -> &[String] {
        &self.lines
    }

    fn clamp(&self, range: Range<usize>) -> Range<usize> {
        let start = range.start.min(self.lines.len());
        let end = range.end.clamp(start, self.lines.len());
        start..end
    }
}

impl TextBuffer for MemoryBuffer {
    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn lines(&self, range: Range<usize>) -> Vec<String> {
        let range = self.clamp(range);
        self.lines[range].to_vec()
    }

    fn replace_lines(&mut self, range: Range<usize>, lines: Vec<String>) {
        debug_assert!(
            range.start <= self.lines.len() && range.end <= self.lines.len(),
            "replace range {:?} outside buffer of {} lines",
            range,
            self.lines.len()
        );
        let range = self.clamp(range);
        self.lines.splice(range, lines);
        let (line, col) = self.cursor;
        self.set_cursor(line, col);
    }

    fn cursor(&self) -> (usize, usize) {
        self.cursor
    }

    fn set_cursor(&mut self, line: usize, col: usize) {
        let line = line.min(self.lines.len().saturating_sub(1));
        let col = col.min(self.lines.get(line).map_or(0, |l| l.len()));
        self.cursor = (line, col);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(lines: &[&str]) -> MemoryBuffer {
        let mut buf = MemoryBuffer::new();
        buf.replace_lines(0..0, lines.iter().map(|s| s.to_string()).collect());
        buf
    }

    #[test]
    fn test_replace_middle() {
        let mut buf = buffer(&["a", "b", "c", "d"]);
        buf.replace_lines(1..3, vec!["x".into()]);
        assert_eq!(buf.all_lines(), &["a", "x", "d"]);
    }

    #[test]
    fn test_replace_grows() {
        let mut buf = buffer(&["a", "b"]);
        buf.replace_lines(1..2, vec!["b".into(), "b1".into(), "b2".into()]);
        assert_eq!(buf.line_count(), 4);
        assert_eq!(buf.all_lines(), &["a", "b", "b1", "b2"]);
    }

    #[test]
    fn test_insert_at_end() {
        let mut buf = buffer(&["a"]);
        let end = buf.line_count();
        buf.replace_lines(end..end, vec!["b".into()]);
        assert_eq!(buf.all_lines(), &["a", "b"]);
    }

    #[test]
    fn test_read_range_clamped() {
        let buf = buffer(&["a", "b"]);
        assert_eq!(buf.lines(1..10), vec!["b".to_string()]);
        assert!(buf.lines(5..9).is_empty());
    }

    #[test]
    fn test_cursor_clamped_on_shrink() {
        let mut buf = buffer(&["a", "b", "c"]);
        buf.set_cursor(2, 0);
        buf.replace_lines(1..3, vec![]);
        assert_eq!(buf.cursor(), (0, 0));
    }

    #[test]
    fn test_cursor_column_clamped_to_line() {
        let mut buf = buffer(&["hello"]);
        buf.set_cursor(0, 99);
        assert_eq!(buf.cursor(), (0, 5));
    }
}
