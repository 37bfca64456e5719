//! Clip register and selection set
//!
//! Both hold node identities, not node references, so they survive a
//! reload that replaces the tree. The clip register is exclusive: a
//! copy replaces any pending cut and vice versa.

use arbor_core::node::NodeUid;
use parking_lot::Mutex;
use std::collections::HashSet;

#[derive(Debug, Default)]
struct ClipState {
    copied: HashSet<NodeUid>,
    cut: HashSet<NodeUid>,
}

/// Copied and cut node identities for the clip column
#[derive(Debug, Default)]
pub struct ClipRegister {
    state: Mutex<ClipState>,
}

impl ClipRegister {
    /// Creates an empty register
    pub fn new() -> Self {
        ClipRegister::default()
    }

    /// Replaces the register with a copy set
    pub fn copy<I: IntoIterator<Item = NodeUid>>(&self, uids: I) {
        let mut state = self.state.lock();
        state.cut.clear();
        state.copied = uids.into_iter().collect();
    }

    /// Replaces the register with a cut set
    pub fn cut<I: IntoIterator<Item = NodeUid>>(&self, uids: I) {
        let mut state = self.state.lock();
        state.copied.clear();
        state.cut = uids.into_iter().collect();
    }

    /// Empties the register
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.copied.clear();
        state.cut.clear();
    }

    /// True when the uid is in the copy set
    pub fn is_copied(&self, uid: &NodeUid) -> bool {
        self.state.lock().copied.contains(uid)
    }

    /// True when the uid is in the cut set
    pub fn is_cut(&self, uid: &NodeUid) -> bool {
        self.state.lock().cut.contains(uid)
    }

    /// True when nothing is clipped
    ///
    /// The clip column draws no placeholder at all in this state, so
    /// rows only reserve the cell while a clip is pending.
    pub fn is_empty(&self) -> bool {
        let state = self.state.lock();
        state.copied.is_empty() && state.cut.is_empty()
    }
}

/// Multi-select state for the selection column
#[derive(Debug, Default)]
pub struct SelectionSet {
    state: Mutex<HashSet<NodeUid>>,
}

impl SelectionSet {
    /// Creates an empty selection
    pub fn new() -> Self {
        SelectionSet::default()
    }

    /// Toggles a uid, returning the new membership
    pub fn toggle(&self, uid: NodeUid) -> bool {
        let mut state = self.state.lock();
        if state.remove(&uid) {
            false
        } else {
            state.insert(uid);
            true
        }
    }

    /// True when the uid is selected
    pub fn contains(&self, uid: &NodeUid) -> bool {
        self.state.lock().contains(uid)
    }

    /// Drops the whole selection
    pub fn clear(&self) {
        self.state.lock().clear();
    }

    /// Number of selected nodes
    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    /// True when nothing is selected
    pub fn is_empty(&self) -> bool {
        self.state.lock().is_empty()
    }

    /// Selected uids in sorted order
    pub fn uids(&self) -> Vec<NodeUid> {
        let mut uids: Vec<NodeUid> = self.state.lock().iter().cloned().collect();
        uids.sort();
        uids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn uid(path: &str) -> NodeUid {
        NodeUid::from_path(Path::new(path))
    }

    #[test]
    fn test_copy_clears_cut() {
        let clip = ClipRegister::new();
        clip.cut([uid("/a")]);
        assert!(clip.is_cut(&uid("/a")));

        clip.copy([uid("/b")]);
        assert!(!clip.is_cut(&uid("/a")));
        assert!(clip.is_copied(&uid("/b")));
    }

    #[test]
    fn test_cut_clears_copy() {
        let clip = ClipRegister::new();
        clip.copy([uid("/a")]);
        clip.cut([uid("/a")]);
        assert!(!clip.is_copied(&uid("/a")));
        assert!(clip.is_cut(&uid("/a")));
    }

    #[test]
    fn test_clear_empties_register() {
        let clip = ClipRegister::new();
        clip.copy([uid("/a"), uid("/b")]);
        assert!(!clip.is_empty());
        clip.clear();
        assert!(clip.is_empty());
    }

    #[test]
    fn test_selection_toggle() {
        let selection = SelectionSet::new();
        assert!(selection.toggle(uid("/a")));
        assert!(selection.contains(&uid("/a")));
        assert!(!selection.toggle(uid("/a")));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_selection_uids_sorted() {
        let selection = SelectionSet::new();
        selection.toggle(uid("/b"));
        selection.toggle(uid("/a"));
        let uids = selection.uids();
        assert_eq!(uids[0].as_str(), "/a");
        assert_eq!(uids[1].as_str(), "/b");
    }
}
