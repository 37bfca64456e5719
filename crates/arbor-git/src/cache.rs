//! Path-keyed git status cache
//!
//! One cache instance serves every bound column: a refresh spawns a
//! single `git status` run, swaps the path map under the lock, and
//! fans the change notification out to all subscribers. Lookups by
//! directory aggregate descendant statuses by severity, so a folder
//! shows the worst thing inside it.

use crate::error::GitResult;
use crate::status::{parse_status_output, GitFormat, GitMixedStatus};
use arbor_core::event::{Event, EventBus};
use arbor_core::normalize_path;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::broadcast;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Aggregated status for a refreshed root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitRootStatus {
    /// Every format present anywhere under the root
    pub formats: HashSet<GitFormat>,
    /// True when every entry is staged with a clean worktree side
    pub all_staged: bool,
}

#[derive(Debug, Default)]
struct CacheState {
    statuses: HashMap<String, GitMixedStatus>,
    roots: HashMap<String, GitRootStatus>,
}

/// Shared git status cache
///
/// # Example
///
/// ```
/// use arbor_core::event::EventBus;
/// use arbor_git::{GitFormat, GitMixedStatus, GitStatusCache};
/// use std::path::{Path, PathBuf};
///
/// let cache = GitStatusCache::new(EventBus::new(16));
/// cache.apply(
///     Path::new("/repo"),
///     vec![(
///         PathBuf::from("/repo/src/lib.rs"),
///         GitMixedStatus::new(GitFormat::Unmodified, GitFormat::Modified),
///     )],
/// );
/// assert!(cache.mixed_status(Path::new("/repo/src"), true).is_some());
/// ```
#[derive(Debug)]
pub struct GitStatusCache {
    state: Mutex<CacheState>,
    bus: EventBus,
    refresh_gate: tokio::sync::Mutex<()>,
    availability: OnceCell<bool>,
}

impl GitStatusCache {
    /// Creates an empty cache publishing on `bus`
    pub fn new(bus: EventBus) -> Self {
        GitStatusCache {
            state: Mutex::new(CacheState::default()),
            bus,
            refresh_gate: tokio::sync::Mutex::new(()),
            availability: OnceCell::new(),
        }
    }

    /// Subscribes a column to change notifications
    ///
    /// Dropping the receiver ends the subscription. Any number of
    /// columns may bind; a refresh still runs git exactly once.
    pub fn bind(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Whether the git executable answers at all, probed once
    pub async fn available(&self) -> bool {
        *self
            .availability
            .get_or_init(|| async {
                let probe = Command::new("git")
                    .arg("--version")
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .await;
                matches!(probe, Ok(status) if status.success())
            })
            .await
    }

    /// Runs `git status --porcelain` for `root` and swaps the results in
    ///
    /// A failing run (typically "not a git repository") degrades to an
    /// empty status set for the root rather than erroring; subscribers
    /// are still notified so stale marks get cleared.
    ///
    /// # Errors
    ///
    /// Returns `GitError::Io` only when the process cannot be spawned.
    pub async fn refresh(&self, root: &Path, include_ignored: bool) -> GitResult<()> {
        let _gate = self.refresh_gate.lock().await;
        if !self.available().await {
            debug!("git unavailable, leaving status empty");
            self.apply(root, Vec::new());
            return Ok(());
        }

        let mut command = Command::new("git");
        command
            .arg("-C")
            .arg(root)
            .args(["status", "--porcelain", "-u"]);
        if include_ignored {
            command.arg("--ignored");
        }
        let output = command.output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(root = %root.display(), stderr = %stderr.trim(), "git status failed");
            self.apply(root, Vec::new());
            return Ok(());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let entries = parse_status_output(root, &stdout);
        debug!(root = %root.display(), entries = entries.len(), "git status refreshed");
        self.apply(root, entries);
        Ok(())
    }

    /// Replaces all statuses under `root` and notifies subscribers
    ///
    /// Exposed separately from [`GitStatusCache::refresh`] so the
    /// aggregation logic is testable without spawning processes.
    pub fn apply(&self, root: &Path, entries: Vec<(std::path::PathBuf, GitMixedStatus)>) {
        let root_key = normalize_path(root);
        let prefix = format!("{}/", root_key);
        {
            let mut state = self.state.lock();
            state
                .statuses
                .retain(|path, _| path != &root_key && !path.starts_with(&prefix));

            let mut formats = HashSet::new();
            let mut all_staged = !entries.is_empty();
            for (_, status) in &entries {
                if status.x != GitFormat::Unmodified {
                    formats.insert(status.x);
                }
                if status.y != GitFormat::Unmodified {
                    formats.insert(status.y);
                }
                if !(status.staged() && !status.unstaged()) {
                    all_staged = false;
                }
            }
            state.roots.insert(
                root_key,
                GitRootStatus {
                    formats,
                    all_staged,
                },
            );
            for (path, status) in entries {
                state.statuses.insert(normalize_path(&path), status);
            }
        }
        self.bus.publish(Event::GitRefreshed);
    }

    /// Status for a path, or `None` when clean/unknown
    ///
    /// Files look up their own entry. Directories take their own entry
    /// (untracked and ignored directories are listed as one entry)
    /// merged with the severity-merged statuses of everything below.
    pub fn mixed_status(&self, path: &Path, is_directory: bool) -> Option<GitMixedStatus> {
        let key = normalize_path(path);
        let state = self.state.lock();
        let direct = state.statuses.get(&key).copied();
        if !is_directory {
            return direct.filter(|s| s.dirty() || s.ignored());
        }

        let prefix = format!("{}/", key);
        let mut merged = direct.unwrap_or(GitMixedStatus::new(
            GitFormat::Unmodified,
            GitFormat::Unmodified,
        ));
        for (_, status) in state
            .statuses
            .iter()
            .filter(|(path, _)| path.starts_with(&prefix))
        {
            merged = merged.merge(*status);
        }
        if merged.dirty() || merged.ignored() {
            Some(merged)
        } else {
            None
        }
    }

    /// Aggregated status for a refreshed root
    pub fn root_status(&self, root: &Path) -> Option<GitRootStatus> {
        let key = normalize_path(root);
        self.state.lock().roots.get(&key).cloned()
    }

    /// Drops every cached status and notifies subscribers
    pub fn invalidate(&self) {
        {
            let mut state = self.state.lock();
            state.statuses.clear();
            state.roots.clear();
        }
        self.bus.publish(Event::GitRefreshed);
    }
}
