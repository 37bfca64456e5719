//! Directory listing and node fact capture
//!
//! Facts are captured once at list time. A failed stat degrades to
//! absent facts for that entry and the listing continues; only a failed
//! directory read surfaces to the caller.

use crate::error::FsResult;
use crate::hidden::HiddenRules;
use arbor_core::node::{FileStat, Node};
use chrono::{DateTime, Local};
use std::fs::Metadata;
use std::path::Path;
use tracing::warn;

/// Reads one entry into a node with its facts
///
/// The symlink flag comes from the entry itself; the directory fact
/// follows the link target. A broken link is a file-like leaf.
pub async fn read_node(path: &Path, level: usize, rules: &HiddenRules) -> Node {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    let mut node = Node::new(name, path.to_path_buf(), level);
    node.hidden = rules.matches(&node.name);

    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) => {
            node.symlink = meta.file_type().is_symlink();
            node.lstat = Some(stat_snapshot(&meta));
            if node.symlink {
                node.link_target = tokio::fs::read_link(path).await.ok();
                node.directory = match tokio::fs::metadata(path).await {
                    Ok(target) => target.is_dir(),
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "symlink target unreadable");
                        false
                    }
                };
            } else {
                node.directory = meta.is_dir();
            }
            apply_permissions(&mut node, &meta);
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "stat failed");
            node.readable = false;
            node.writable = false;
        }
    }
    node.expandable = node.directory;
    node
}

/// Lists a directory as child nodes at `level`, sorted for display
///
/// # Errors
///
/// Returns `FsError::Io` when the directory itself cannot be read; the
/// caller logs it and treats the directory as empty.
pub async fn list_dir(path: &Path, level: usize, rules: &HiddenRules) -> FsResult<Vec<Node>> {
    let mut entries = tokio::fs::read_dir(path).await?;
    let mut nodes = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        nodes.push(read_node(&entry.path(), level, rules).await);
    }
    sort_nodes(&mut nodes);
    Ok(nodes)
}

/// Builds the tree root for a directory, with a stat snapshot when available
pub async fn read_root(path: &Path) -> Node {
    let mut node = Node::root(path.to_path_buf());
    if let Ok(meta) = tokio::fs::symlink_metadata(path).await {
        node.lstat = Some(stat_snapshot(&meta));
    }
    node
}

/// Sorts directories first, then names case-insensitively
pub fn sort_nodes(nodes: &mut [Node]) {
    nodes.sort_by(|a, b| {
        b.directory
            .cmp(&a.directory)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

fn stat_snapshot(meta: &Metadata) -> FileStat {
    FileStat {
        size: meta.len(),
        mtime: meta.modified().ok().map(DateTime::<Local>::from),
        ctime: ctime_of(meta),
        atime: meta.accessed().ok().map(DateTime::<Local>::from),
    }
}

#[cfg(unix)]
fn ctime_of(meta: &Metadata) -> Option<DateTime<Local>> {
    use chrono::TimeZone;
    use std::os::unix::fs::MetadataExt;
    Local
        .timestamp_opt(meta.ctime(), meta.ctime_nsec() as u32)
        .single()
}

#[cfg(not(unix))]
fn ctime_of(meta: &Metadata) -> Option<DateTime<Local>> {
    meta.created().ok().map(DateTime::<Local>::from)
}

#[cfg(unix)]
fn apply_permissions(node: &mut Node, meta: &Metadata) {
    use std::os::unix::fs::PermissionsExt;
    let mode = meta.permissions().mode();
    node.readable = mode & 0o444 != 0;
    node.writable = mode & 0o222 != 0;
    node.executable = mode & 0o111 != 0;
    node.readonly = !node.writable;
}

#[cfg(not(unix))]
fn apply_permissions(node: &mut Node, meta: &Metadata) {
    node.readonly = meta.permissions().readonly();
    node.writable = !node.readonly;
    node.readable = true;
    node.executable = false;
}
