//! Tracked editor buffers and their modification flags
//!
//! The registry mirrors the host's buffer list into two lookups, one by
//! buffer id and one by normalized full path. Both are rebuilt together
//! inside a single lock on every reload, so a reader can never observe
//! one map reflecting an older buffer list than the other.

use crate::error::{CoreError, CoreResult};
use crate::event::{Event, EventBus};
use crate::node::normalize_path;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;

/// One tracked buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferEntry {
    /// Host buffer id
    pub id: u64,
    /// Normalized full path
    pub path: String,
    /// Unsaved modifications flag
    pub modified: bool,
}

impl BufferEntry {
    /// Creates an entry for a path, normalizing it
    pub fn new(id: u64, path: &Path, modified: bool) -> Self {
        BufferEntry {
            id,
            path: normalize_path(path),
            modified,
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    entries: Vec<BufferEntry>,
    by_path: HashMap<String, usize>,
    by_id: HashMap<u64, usize>,
}

impl RegistryState {
    fn rebuild(&mut self, entries: Vec<BufferEntry>) {
        self.by_path = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.path.clone(), i))
            .collect();
        self.by_id = entries.iter().enumerate().map(|(i, e)| (e.id, i)).collect();
        self.entries = entries;
    }
}

/// Path- and id-keyed view of the host's buffer list
///
/// # Example
///
/// ```
/// use arbor_core::bufreg::{BufferEntry, BufferRegistry};
/// use arbor_core::event::EventBus;
/// use std::path::Path;
///
/// let registry = BufferRegistry::new(EventBus::new(16));
/// registry.reload(vec![BufferEntry::new(1, Path::new("/tmp/a.rs"), true)]);
/// assert!(registry.modified(Path::new("/tmp/a.rs")));
/// ```
#[derive(Debug)]
pub struct BufferRegistry {
    state: Mutex<RegistryState>,
    bus: EventBus,
}

impl BufferRegistry {
    /// Creates an empty registry publishing on `bus`
    pub fn new(bus: EventBus) -> Self {
        BufferRegistry {
            state: Mutex::new(RegistryState::default()),
            bus,
        }
    }

    /// Replaces the tracked set with a fresh buffer list
    ///
    /// Both lookup maps are rebuilt under one lock and an
    /// [`Event::BufferReload`] is published once the swap is complete.
    pub fn reload(&self, entries: Vec<BufferEntry>) {
        self.state.lock().rebuild(entries);
        self.bus.publish(Event::BufferReload);
    }

    /// Applies a modified-flag change reported by the host
    ///
    /// Returns `false` without publishing when the id is not tracked;
    /// a change event for an unknown buffer is a no-op.
    pub fn set_modified(&self, id: u64, modified: bool) -> bool {
        let path = {
            let mut state = self.state.lock();
            let Some(&index) = state.by_id.get(&id) else {
                return false;
            };
            let entry = &mut state.entries[index];
            if entry.modified == modified {
                return true;
            }
            entry.modified = modified;
            entry.path.clone()
        };
        self.bus.publish(Event::BufferModified {
            path: path.into(),
            modified,
        });
        true
    }

    /// True when the buffer at exactly `path` is modified
    pub fn modified(&self, path: &Path) -> bool {
        let key = normalize_path(path);
        let state = self.state.lock();
        state
            .by_path
            .get(&key)
            .map(|&i| state.entries[i].modified)
            .unwrap_or(false)
    }

    /// True when any modified buffer lives under the directory `dir`
    ///
    /// The prefix check appends a separator first, so `/foo` does not
    /// match a buffer at `/foobar/x`.
    pub fn modified_under(&self, dir: &Path) -> bool {
        let mut prefix = normalize_path(dir);
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        let state = self.state.lock();
        state
            .entries
            .iter()
            .any(|e| e.modified && e.path.starts_with(&prefix))
    }

    /// Looks up a tracked buffer by path
    pub fn get_by_path(&self, path: &Path) -> Option<BufferEntry> {
        let key = normalize_path(path);
        let state = self.state.lock();
        state.by_path.get(&key).map(|&i| state.entries[i].clone())
    }

    /// Looks up a tracked buffer by host id
    pub fn get_by_id(&self, id: u64) -> Option<BufferEntry> {
        let state = self.state.lock();
        state.by_id.get(&id).map(|&i| state.entries[i].clone())
    }

    /// Removes a tracked buffer
    ///
    /// # Errors
    ///
    /// Returns `CoreError::BufferNotFound` when nothing is tracked at
    /// `path`, and `CoreError::BufferModified` when the buffer has
    /// unsaved changes and `force` is not set. The modified case is the
    /// recoverable "confirm and retry with force" flow.
    pub fn remove(&self, path: &Path, force: bool) -> CoreResult<BufferEntry> {
        let mut state = self.state.lock();
        let key = normalize_path(path);
        let Some(&index) = state.by_path.get(&key) else {
            return Err(CoreError::BufferNotFound(path.to_path_buf()));
        };
        if state.entries[index].modified && !force {
            return Err(CoreError::BufferModified(path.to_path_buf()));
        }
        let removed = state.entries.remove(index);
        let remaining = std::mem::take(&mut state.entries);
        state.rebuild(remaining);
        Ok(removed)
    }

    /// Number of tracked buffers
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// True when no buffers are tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
