//! Row builder for a single rendered line
//!
//! Columns append styled text fragments in call order. Each fragment
//! may carry a highlight group and a mark category; the builder records
//! the byte range every fragment occupies in the final line, so marks
//! and highlights map exactly onto the text the buffer will hold.
//!
//! Byte offsets are what downstream navigation needs; display width is
//! tracked separately so fixed-width columns can pad correctly when a
//! fragment contains wide characters.

use std::collections::BTreeSet;
use unicode_width::UnicodeWidthStr;

/// A byte range of the finished line tagged with a mark category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkRange {
    /// Mark category, e.g. `git` or `modified`
    pub category: String,
    /// Start byte offset, inclusive
    pub start: usize,
    /// End byte offset, exclusive
    pub end: usize,
}

/// A byte range of the finished line tagged with a highlight group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightRange {
    /// Highlight group name, resolved by the front end
    pub group: String,
    /// Start byte offset, inclusive
    pub start: usize,
    /// End byte offset, exclusive
    pub end: usize,
}

/// Options for a single [`Row::add`] call
#[derive(Debug, Clone, Copy, Default)]
pub struct AddOpts<'a> {
    /// Highlight group for the fragment
    pub highlight: Option<&'a str>,
    /// Mark category covering the fragment's byte range
    pub mark: Option<&'a str>,
    /// Measure display width with unicode rules instead of byte count
    pub unicode: bool,
}

impl<'a> AddOpts<'a> {
    /// Fragment with a highlight group only
    pub fn hl(group: &'a str) -> Self {
        AddOpts {
            highlight: Some(group),
            ..AddOpts::default()
        }
    }

    /// Fragment with a highlight group and a mark category
    pub fn hl_mark(group: &'a str, category: &'a str) -> Self {
        AddOpts {
            highlight: Some(group),
            mark: Some(category),
            ..AddOpts::default()
        }
    }

    /// Enables unicode width measurement
    pub fn unicode(mut self) -> Self {
        self.unicode = true;
        self
    }
}

/// Snapshot of a row's length, used to roll back empty contributions
///
/// The template composer takes a checkpoint before drawing a group of
/// columns and truncates back to it when none of them produced text.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    text: usize,
    width: usize,
    marks: usize,
    line_marks: usize,
    highlights: usize,
}

/// The finished line plus everything tagged onto it
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderedRow {
    /// Final line text
    pub text: String,
    /// Byte-ranged mark categories in fragment order
    pub marks: Vec<MarkRange>,
    /// Line-level mark categories with no byte range
    pub line_marks: Vec<String>,
    /// Byte-ranged highlight groups in fragment order
    pub highlights: Vec<HighlightRange>,
}

impl RenderedRow {
    /// All mark categories this line carries
    ///
    /// Union of line-level marks and the categories of byte ranges;
    /// this is what the mark index stores per line.
    pub fn categories(&self) -> BTreeSet<&str> {
        self.line_marks
            .iter()
            .map(String::as_str)
            .chain(self.marks.iter().map(|m| m.category.as_str()))
            .collect()
    }
}

/// Accumulates fragments for one line
///
/// # Example
///
/// ```
/// use arbor_view::row::{AddOpts, Row};
///
/// let mut row = Row::new();
/// row.add("src", AddOpts::hl("FileDirectory"));
/// row.add(" M", AddOpts::hl_mark("GitUnstaged", "git"));
/// let rendered = row.finish();
/// assert_eq!(rendered.text, "src M");
/// assert_eq!(rendered.marks[0].start, 3);
/// assert_eq!(rendered.marks[0].end, 5);
/// ```
#[derive(Debug, Default)]
pub struct Row {
    text: String,
    width: usize,
    marks: Vec<MarkRange>,
    line_marks: Vec<String>,
    highlights: Vec<HighlightRange>,
}

impl Row {
    /// Creates an empty row
    pub fn new() -> Self {
        Row::default()
    }

    /// Appends a fragment
    ///
    /// Empty text contributes nothing, matching the contract that a
    /// column which decides not to draw emits no placeholder.
    pub fn add(&mut self, text: &str, opts: AddOpts<'_>) {
        if text.is_empty() {
            return;
        }
        let start = self.text.len();
        self.text.push_str(text);
        let end = self.text.len();
        self.width += if opts.unicode {
            text.width()
        } else {
            text.len()
        };
        if let Some(group) = opts.highlight {
            self.highlights.push(HighlightRange {
                group: group.to_string(),
                start,
                end,
            });
        }
        if let Some(category) = opts.mark {
            self.marks.push(MarkRange {
                category: category.to_string(),
                start,
                end,
            });
        }
    }

    /// Tags the whole line with a mark category
    ///
    /// Used for categories that describe the node rather than a text
    /// span, e.g. `git` on a line whose status glyphs are split across
    /// two differently-highlighted fragments.
    pub fn mark_line(&mut self, category: &str) {
        if !self.line_marks.iter().any(|c| c == category) {
            self.line_marks.push(category.to_string());
        }
    }

    /// Byte length of the accumulated text
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// True when no text has been added
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Display width of the accumulated text
    pub fn width(&self) -> usize {
        self.width
    }

    /// Records the current end of the row
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            text: self.text.len(),
            width: self.width,
            marks: self.marks.len(),
            line_marks: self.line_marks.len(),
            highlights: self.highlights.len(),
        }
    }

    /// Rolls the row back to a checkpoint
    ///
    /// Fragment boundaries are char boundaries, so truncating the text
    /// at a checkpoint is always valid.
    pub fn truncate(&mut self, checkpoint: Checkpoint) {
        self.text.truncate(checkpoint.text);
        self.width = checkpoint.width;
        self.marks.truncate(checkpoint.marks);
        self.line_marks.truncate(checkpoint.line_marks);
        self.highlights.truncate(checkpoint.highlights);
    }

    /// Finishes the row
    pub fn finish(self) -> RenderedRow {
        RenderedRow {
            text: self.text,
            marks: self.marks,
            line_marks: self.line_marks,
            highlights: self.highlights,
        }
    }
}
