//! Streamed commit log
//!
//! The commit picker wants lines as they arrive rather than one big
//! blob, so the log runs as a spawned `git log` with its stdout pumped
//! line by line into a channel. The channel closes when the process
//! exits or the receiver is dropped.

use crate::error::{GitError, GitResult};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::warn;

/// One `hash subject` line from the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitLine {
    /// Abbreviated commit hash
    pub hash: String,
    /// First line of the commit message
    pub subject: String,
}

/// Spawns `git log` and streams its lines
///
/// Lines use the `%h %s` format. A `limit` of zero streams the full
/// history. The receiver sees commits in log order and the channel
/// closes on process exit; dropping the receiver stops the pump and
/// reaps the child.
///
/// # Errors
///
/// Returns `GitError::GitUnavailable` when no git executable exists and
/// `GitError::Io` for any other spawn failure. A directory that is not
/// a repository is not an error; it produces an empty stream.
pub fn stream_log(root: &Path, limit: usize) -> GitResult<mpsc::Receiver<CommitLine>> {
    let mut command = Command::new("git");
    command
        .arg("-C")
        .arg(root)
        .args(["log", "--format=%h %s"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .stdin(Stdio::null());
    if limit > 0 {
        command.arg(format!("-n{}", limit));
    }

    let mut child = command.spawn().map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            GitError::GitUnavailable
        } else {
            GitError::Io(err)
        }
    })?;
    let stdout = child.stdout.take().ok_or_else(|| {
        GitError::Io(std::io::Error::other("child stdout not captured"))
    })?;

    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let commit = match line.split_once(' ') {
                        Some((hash, subject)) => CommitLine {
                            hash: hash.to_string(),
                            subject: subject.to_string(),
                        },
                        None => CommitLine {
                            hash: line,
                            subject: String::new(),
                        },
                    };
                    if tx.send(commit).await.is_err() {
                        // Receiver gone; stop pumping and reap below.
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "git log stream ended early");
                    break;
                }
            }
        }
        let _ = child.kill().await;
        let _ = child.wait().await;
    });

    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Repository, Signature};
    use tempfile::TempDir;

    async fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn commit_file(repo: &Repository, name: &str, message: &str) {
        let root = repo.workdir().expect("workdir");
        std::fs::write(root.join(name), message).expect("write file");
        let mut index = repo.index().expect("index");
        index.add_path(Path::new(name)).expect("add");
        index.write().expect("write index");
        let tree_id = index.write_tree().expect("write tree");
        let tree = repo.find_tree(tree_id).expect("find tree");
        let sig = Signature::now("Test", "test@test.com").expect("signature");
        let parent = repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<_> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("commit");
    }

    #[tokio::test]
    async fn test_stream_log_yields_commits_in_order() {
        if !git_available().await {
            return;
        }
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        commit_file(&repo, "a.txt", "first commit");
        commit_file(&repo, "b.txt", "second commit");
        drop(repo);

        let mut rx = stream_log(temp.path(), 0).unwrap();
        let mut subjects = Vec::new();
        while let Some(line) = rx.recv().await {
            assert!(!line.hash.is_empty());
            subjects.push(line.subject);
        }
        assert_eq!(subjects, vec!["second commit", "first commit"]);
    }

    #[tokio::test]
    async fn test_stream_log_respects_limit() {
        if !git_available().await {
            return;
        }
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        commit_file(&repo, "a.txt", "first");
        commit_file(&repo, "b.txt", "second");
        commit_file(&repo, "c.txt", "third");
        drop(repo);

        let mut rx = stream_log(temp.path(), 2).unwrap();
        let mut count = 0;
        while rx.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_stream_log_outside_repo_is_empty() {
        if !git_available().await {
            return;
        }
        let temp = TempDir::new().unwrap();
        let mut rx = stream_log(temp.path(), 0).unwrap();
        assert!(rx.recv().await.is_none());
    }
}
