//! Line-indexed mark categories for navigation
//!
//! The index maps a mark category to the set of line indices currently
//! carrying it. It is corrected eagerly: every redraw of a line
//! replaces that line's whole category membership, and structural
//! renders shift the tail. Line indices are only meaningful for the
//! current render, which is why nothing here keys by node.

use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Category to ordered-line-set index
///
/// # Example
///
/// ```
/// use arbor_view::marks::MarkIndex;
///
/// let mut marks = MarkIndex::new();
/// marks.add("git", 3);
/// marks.add("git", 7);
/// assert_eq!(marks.next("git", 3), Some(7));
/// assert_eq!(marks.prev("git", 3), None);
/// ```
#[derive(Debug, Default)]
pub struct MarkIndex {
    categories: HashMap<String, BTreeSet<usize>>,
}

impl MarkIndex {
    /// Creates an empty index
    pub fn new() -> Self {
        MarkIndex::default()
    }

    /// Marks a line under a category
    pub fn add(&mut self, category: &str, line: usize) {
        self.categories
            .entry(category.to_string())
            .or_default()
            .insert(line);
    }

    /// Unmarks a line under a category
    pub fn remove(&mut self, category: &str, line: usize) {
        if let Some(set) = self.categories.get_mut(category) {
            set.remove(&line);
            if set.is_empty() {
                self.categories.remove(category);
            }
        }
    }

    /// Removes a line from every category
    pub fn clear_line(&mut self, line: usize) {
        self.categories.retain(|_, set| {
            set.remove(&line);
            !set.is_empty()
        });
    }

    /// Replaces a line's entire category membership
    ///
    /// This is the eager-correction entry point used after a redraw:
    /// whatever the new draw emitted becomes the line's categories,
    /// whatever it no longer emits is dropped.
    pub fn set_line<'a, I>(&mut self, line: usize, categories: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.clear_line(line);
        for category in categories {
            self.add(category, line);
        }
    }

    /// Drops everything
    pub fn clear(&mut self) {
        self.categories.clear();
    }

    /// True when the line is marked under the category
    pub fn contains(&self, category: &str, line: usize) -> bool {
        self.categories
            .get(category)
            .is_some_and(|set| set.contains(&line))
    }

    /// Ordered line indices under a category
    pub fn lines(&self, category: &str) -> Vec<usize> {
        self.categories
            .get(category)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The nearest marked line strictly after `from`
    ///
    /// Returns `None` when no such mark exists; navigation treats that
    /// as "no match", never as an error.
    pub fn next(&self, category: &str, from: usize) -> Option<usize> {
        let start = from.checked_add(1)?;
        self.categories
            .get(category)?
            .range(start..)
            .next()
            .copied()
    }

    /// The nearest marked line strictly before `from`
    pub fn prev(&self, category: &str, from: usize) -> Option<usize> {
        self.categories
            .get(category)?
            .range(..from)
            .next_back()
            .copied()
    }

    /// Moves every mark at or beyond `from_line` by `delta`
    ///
    /// Used when a render pass grows or shrinks the region above the
    /// tail. Callers clear the replaced region's lines first; a mark
    /// that would shift below zero is dropped.
    pub fn shift(&mut self, from_line: usize, delta: isize) {
        if delta == 0 {
            return;
        }
        for set in self.categories.values_mut() {
            let moved = set.split_off(&from_line);
            for line in moved {
                let shifted = line as isize + delta;
                if shifted >= 0 {
                    set.insert(shifted as usize);
                }
            }
        }
        self.categories.retain(|_, set| !set.is_empty());
    }

    /// Drops marks at or beyond the current line count
    ///
    /// A mark pointing past the render is a bookkeeping bug; debug
    /// builds assert, release builds drop the stale entry and carry on.
    pub fn truncate(&mut self, line_count: usize) {
        let mut stale = 0usize;
        for set in self.categories.values_mut() {
            let dropped = set.split_off(&line_count);
            stale += dropped.len();
        }
        self.categories.retain(|_, set| !set.is_empty());
        if stale > 0 {
            debug_assert!(false, "{stale} marks beyond line count {line_count}");
            warn!(stale, line_count, "dropped marks beyond current render");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_lines_are_ordered() {
        let mut marks = MarkIndex::new();
        marks.add("git", 5);
        marks.add("git", 1);
        marks.add("git", 3);
        assert_eq!(marks.lines("git"), vec![1, 3, 5]);
    }

    #[test]
    fn test_remove_drops_empty_category() {
        let mut marks = MarkIndex::new();
        marks.add("git", 2);
        marks.remove("git", 2);
        assert_eq!(marks.lines("git"), Vec::<usize>::new());
        assert!(!marks.contains("git", 2));
    }

    #[test]
    fn test_next_and_prev_are_wrap_free() {
        let mut marks = MarkIndex::new();
        marks.add("git", 2);
        marks.add("git", 8);

        assert_eq!(marks.next("git", 0), Some(2));
        assert_eq!(marks.next("git", 2), Some(8));
        assert_eq!(marks.next("git", 8), None);
        assert_eq!(marks.prev("git", 8), Some(2));
        assert_eq!(marks.prev("git", 2), None);
    }

    #[test]
    fn test_empty_category_is_no_match() {
        let marks = MarkIndex::new();
        assert_eq!(marks.next("modified", 0), None);
        assert_eq!(marks.prev("modified", 10), None);
    }

    #[test]
    fn test_set_line_replaces_membership() {
        let mut marks = MarkIndex::new();
        marks.add("git", 4);
        marks.add("gitStaged", 4);
        marks.add("git", 9);

        marks.set_line(4, ["modified"]);
        assert!(!marks.contains("git", 4));
        assert!(!marks.contains("gitStaged", 4));
        assert!(marks.contains("modified", 4));
        assert!(marks.contains("git", 9));
    }

    #[test]
    fn test_clear_line_spares_other_lines() {
        let mut marks = MarkIndex::new();
        marks.add("git", 1);
        marks.add("git", 2);
        marks.clear_line(1);
        assert_eq!(marks.lines("git"), vec![2]);
    }

    #[test]
    fn test_shift_grows_tail() {
        let mut marks = MarkIndex::new();
        marks.add("git", 1);
        marks.add("git", 5);
        marks.shift(3, 2);
        assert_eq!(marks.lines("git"), vec![1, 7]);
    }

    #[test]
    fn test_shift_shrinks_tail() {
        let mut marks = MarkIndex::new();
        marks.add("git", 1);
        marks.add("git", 6);
        // Lines 2..4 were replaced by nothing; the tail moves up by 2.
        marks.shift(4, -2);
        assert_eq!(marks.lines("git"), vec![1, 4]);
    }

    #[test]
    fn test_shift_drops_below_zero() {
        let mut marks = MarkIndex::new();
        marks.add("git", 0);
        marks.add("git", 3);
        marks.shift(0, -1);
        assert_eq!(marks.lines("git"), vec![2]);
    }

    #[test]
    fn test_truncate_in_range_keeps_marks() {
        let mut marks = MarkIndex::new();
        marks.add("git", 0);
        marks.add("git", 4);
        marks.truncate(5);
        assert_eq!(marks.lines("git"), vec![0, 4]);
    }

    #[test]
    #[should_panic(expected = "marks beyond line count")]
    fn test_truncate_stale_mark_asserts_in_debug() {
        let mut marks = MarkIndex::new();
        marks.add("git", 9);
        marks.truncate(5);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn shift_round_trips(
                lines in proptest::collection::btree_set(0usize..64, 0..16),
                from in 0usize..64,
                delta in 1isize..8,
            ) {
                let mut marks = MarkIndex::new();
                for &line in &lines {
                    marks.add("git", line);
                }
                marks.shift(from, delta);
                marks.shift(from, -delta);
                let expected: Vec<usize> = lines.iter().copied().collect();
                prop_assert_eq!(marks.lines("git"), expected);
            }
        }
    }
}
