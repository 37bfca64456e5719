//! Porcelain status parsing
//!
//! Status comes from `git status --porcelain`: one entry per line, a
//! two-character XY code (index and worktree) followed by the path,
//! with `old -> new` pairs for renames and C-style quoting for paths
//! containing special characters. Parsing is lenient; a line that does
//! not fit the format is logged and skipped so one odd entry cannot
//! take down the whole refresh.

use arbor_core::normalize_path;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One porcelain status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GitFormat {
    /// No change recorded
    Unmodified,
    /// Content changed
    Modified,
    /// Added to the index
    Added,
    /// Deleted
    Deleted,
    /// Renamed
    Renamed,
    /// Copied
    Copied,
    /// Unmerged conflict
    Unmerged,
    /// Not tracked
    Untracked,
    /// Matched an ignore rule
    Ignored,
}

impl GitFormat {
    /// Parses one code character, `None` for an unknown code
    ///
    /// Type changes (`T`) count as modifications.
    pub fn from_code(code: char) -> Option<GitFormat> {
        match code {
            ' ' => Some(GitFormat::Unmodified),
            'M' | 'T' | 'm' => Some(GitFormat::Modified),
            'A' => Some(GitFormat::Added),
            'D' => Some(GitFormat::Deleted),
            'R' => Some(GitFormat::Renamed),
            'C' => Some(GitFormat::Copied),
            'U' => Some(GitFormat::Unmerged),
            '?' => Some(GitFormat::Untracked),
            '!' => Some(GitFormat::Ignored),
            _ => None,
        }
    }

    /// Single character indicator for rendering
    pub fn indicator(&self) -> char {
        match self {
            GitFormat::Unmodified => ' ',
            GitFormat::Modified => 'M',
            GitFormat::Added => 'A',
            GitFormat::Deleted => 'D',
            GitFormat::Renamed => 'R',
            GitFormat::Copied => 'C',
            GitFormat::Unmerged => 'U',
            GitFormat::Untracked => '?',
            GitFormat::Ignored => '!',
        }
    }

    /// Severity used when merging statuses up a directory
    ///
    /// A conflict outranks a deletion outranks a content change, so a
    /// directory takes the worst status of its descendants.
    pub fn priority(&self) -> u8 {
        match self {
            GitFormat::Unmerged => 8,
            GitFormat::Deleted => 7,
            GitFormat::Renamed => 6,
            GitFormat::Copied => 5,
            GitFormat::Modified => 4,
            GitFormat::Added => 3,
            GitFormat::Untracked => 2,
            GitFormat::Ignored => 1,
            GitFormat::Unmodified => 0,
        }
    }

    /// Merges two codes, keeping the more severe one
    pub fn merge(self, other: GitFormat) -> GitFormat {
        if other.priority() > self.priority() {
            other
        } else {
            self
        }
    }
}

/// Index and worktree codes for one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GitMixedStatus {
    /// Index (staged) code
    pub x: GitFormat,
    /// Worktree code
    pub y: GitFormat,
}

impl GitMixedStatus {
    /// Creates a status pair
    pub fn new(x: GitFormat, y: GitFormat) -> Self {
        GitMixedStatus { x, y }
    }

    /// True when the index holds a recorded change
    pub fn staged(&self) -> bool {
        !matches!(
            self.x,
            GitFormat::Unmodified | GitFormat::Untracked | GitFormat::Ignored
        )
    }

    /// True when the worktree differs from the index
    ///
    /// Untracked counts as unstaged; ignored does not.
    pub fn unstaged(&self) -> bool {
        !matches!(self.y, GitFormat::Unmodified | GitFormat::Ignored)
    }

    /// True when either side is the ignored code
    pub fn ignored(&self) -> bool {
        self.x == GitFormat::Ignored || self.y == GitFormat::Ignored
    }

    /// True when anything at all is recorded for the path
    pub fn dirty(&self) -> bool {
        self.staged() || self.unstaged()
    }

    /// The two-character rendering of this status
    pub fn indicators(&self) -> (char, char) {
        (self.x.indicator(), self.y.indicator())
    }

    /// Merges per side, keeping the more severe code of each
    pub fn merge(self, other: GitMixedStatus) -> GitMixedStatus {
        GitMixedStatus {
            x: self.x.merge(other.x),
            y: self.y.merge(other.y),
        }
    }
}

/// Parses porcelain output into absolute-path status entries
///
/// Paths are joined onto `root` and normalized. Rename entries record
/// the new path. Malformed lines are skipped with a warning.
pub fn parse_status_output(root: &Path, output: &str) -> Vec<(PathBuf, GitMixedStatus)> {
    let mut entries = Vec::new();
    for line in output.lines() {
        if line.is_empty() {
            continue;
        }
        match parse_status_line(root, line) {
            Some(entry) => entries.push(entry),
            None => warn!(line, "skipping unparseable status line"),
        }
    }
    entries
}

fn parse_status_line(root: &Path, line: &str) -> Option<(PathBuf, GitMixedStatus)> {
    let mut chars = line.chars();
    let x = GitFormat::from_code(chars.next()?)?;
    let y = GitFormat::from_code(chars.next()?)?;
    if chars.next()? != ' ' {
        return None;
    }
    // Codes are single-byte, so the path starts at byte 3.
    let rest = &line[3..];
    if rest.is_empty() {
        return None;
    }
    let path_part = match rest.split_once(" -> ") {
        Some((_old, new)) if x == GitFormat::Renamed || x == GitFormat::Copied => new,
        Some((_old, new)) if y == GitFormat::Renamed || y == GitFormat::Copied => new,
        _ => rest,
    };
    let rel = unquote_path(path_part);
    let abs = root.join(rel);
    Some((
        PathBuf::from(normalize_path(&abs)),
        GitMixedStatus::new(x, y),
    ))
}

/// Undoes git's C-style path quoting
///
/// Quoted paths are wrapped in double quotes with backslash escapes;
/// octal escapes carry raw UTF-8 bytes.
fn unquote_path(path: &str) -> String {
    let inner = match path.strip_prefix('"').and_then(|p| p.strip_suffix('"')) {
        Some(inner) => inner,
        None => return path.to_string(),
    };
    let mut bytes = Vec::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => bytes.push(b'\n'),
            Some('t') => bytes.push(b'\t'),
            Some('r') => bytes.push(b'\r'),
            Some('\\') => bytes.push(b'\\'),
            Some('"') => bytes.push(b'"'),
            Some(d) if d.is_digit(8) => {
                let mut value = d.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|p| p.to_digit(8)) {
                        Some(digit) => {
                            chars.next();
                            value = value * 8 + digit;
                        }
                        None => break,
                    }
                }
                bytes.push(value as u8);
            }
            Some(other) => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => break,
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
