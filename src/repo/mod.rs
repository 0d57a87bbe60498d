//! Repository access
//!
//! The index and the tools only see a repository through
//! [`RepositorySnapshot`]: a working tree at some commit that can be diffed
//! against an earlier commit. [`GitRepository`] implements it with the git
//! CLI; tests use an in-memory fake.
//!
//! ## Layout
//!
//! - `git`: checkout management (clone, checkout, pull, download, history)
//! - `wiki`: the repository the generated wiki is published to
//! - `github`: REST code search
//! - `tree`: file tree rendering for prompts

mod git;
mod github;
mod tree;
mod wiki;

pub use git::GitRepository;
pub use github::{CodeSearchHit, GitHubClient};
pub use tree::render_file_tree;
pub use wiki::WikiRepository;

use async_trait::async_trait;
use std::path::Path;

use crate::types::{Result, WikiError};

// =============================================================================
// Diff Entries
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    /// Parse a `--name-status` letter. Renames and copies are disabled by
    /// `--no-renames`, so anything else is an error.
    pub fn from_status(status: &str) -> Option<Self> {
        match status {
            "A" => Some(Self::Added),
            "M" | "T" => Some(Self::Modified),
            "D" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Previously indexed chunks of the file must go
    pub fn removes(&self) -> bool {
        matches!(self, Self::Modified | Self::Deleted)
    }

    /// Current content of the file must be indexed
    pub fn adds(&self) -> bool {
        matches!(self, Self::Added | Self::Modified)
    }
}

/// One file-level change between two commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub kind: ChangeKind,
    /// Path relative to the repository root
    pub path: String,
}

impl DiffEntry {
    pub fn new(kind: ChangeKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Parse `git diff --name-status --no-renames -z` output
///
/// Records are `status NUL path NUL`; paths are verbatim, never quoted.
pub fn parse_name_status(output: &str) -> Result<Vec<DiffEntry>> {
    let mut fields = output.split('\0').filter(|f| !f.is_empty());
    let mut entries = Vec::new();
    while let Some(status) = fields.next() {
        let status = status.trim_matches('\n');
        let kind = ChangeKind::from_status(status).ok_or_else(|| {
            WikiError::git("diff", format!("unsupported change status: {status}"))
        })?;
        let path = fields
            .next()
            .ok_or_else(|| WikiError::git("diff", format!("missing path after status {status}")))?;
        entries.push(DiffEntry::new(kind, path));
    }
    Ok(entries)
}

// =============================================================================
// Snapshot Contract
// =============================================================================

/// A working tree at a known commit
#[async_trait]
pub trait RepositorySnapshot: Send + Sync {
    /// Registry and on-disk layout key, `owner/name`
    fn key(&self) -> String;

    /// Working tree root
    fn root(&self) -> &Path;

    async fn current_commit(&self) -> Result<String>;

    /// Ordered file-level changes from `from` to `to`
    async fn diff(&self, from: &str, to: &str) -> Result<Vec<DiffEntry>>;

    /// Raw content of a file relative to the root
    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory snapshot over a temp directory with scripted commits

    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    type Tree = BTreeMap<String, String>;

    pub struct FakeSnapshot {
        key: String,
        root: PathBuf,
        commits: Mutex<Vec<(String, Tree)>>,
    }

    impl FakeSnapshot {
        pub fn new(key: &str, root: &Path) -> Self {
            Self {
                key: key.to_string(),
                root: root.to_path_buf(),
                commits: Mutex::new(Vec::new()),
            }
        }

        /// Record a commit and make its tree the working tree
        pub fn commit(&self, id: &str, files: Tree) {
            if let Ok(entries) = std::fs::read_dir(&self.root) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_dir() {
                        std::fs::remove_dir_all(&path).unwrap();
                    } else {
                        std::fs::remove_file(&path).unwrap();
                    }
                }
            }
            for (path, content) in &files {
                let full = self.root.join(path);
                std::fs::create_dir_all(full.parent().unwrap()).unwrap();
                std::fs::write(full, content).unwrap();
            }
            self.commits.lock().unwrap().push((id.to_string(), files));
        }

        fn tree(&self, id: &str) -> Result<Tree> {
            self.commits
                .lock()
                .unwrap()
                .iter()
                .find(|(c, _)| c == id)
                .map(|(_, t)| t.clone())
                .ok_or_else(|| WikiError::git("diff", format!("unknown revision {id}")))
        }
    }

    #[async_trait]
    impl RepositorySnapshot for FakeSnapshot {
        fn key(&self) -> String {
            self.key.clone()
        }

        fn root(&self) -> &Path {
            &self.root
        }

        async fn current_commit(&self) -> Result<String> {
            self.commits
                .lock()
                .unwrap()
                .last()
                .map(|(c, _)| c.clone())
                .ok_or_else(|| WikiError::git("rev-parse", "no commits"))
        }

        async fn diff(&self, from: &str, to: &str) -> Result<Vec<DiffEntry>> {
            let old = self.tree(from)?;
            let new = self.tree(to)?;
            let mut entries = Vec::new();
            for (path, content) in &new {
                match old.get(path) {
                    None => entries.push(DiffEntry::new(ChangeKind::Added, path)),
                    Some(previous) if previous != content => {
                        entries.push(DiffEntry::new(ChangeKind::Modified, path))
                    }
                    _ => {}
                }
            }
            for path in old.keys().filter(|p| !new.contains_key(*p)) {
                entries.push(DiffEntry::new(ChangeKind::Deleted, path));
            }
            entries.sort_by(|a, b| a.path.cmp(&b.path));
            Ok(entries)
        }

        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            Ok(tokio::fs::read(self.root.join(path)).await?)
        }
    }

    /// Run git synchronously in `dir`, panicking on failure
    pub fn git(dir: &Path, args: &[&str]) -> String {
        let output = std::process::Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(["-c", "user.name=test", "-c", "user.email=test@example.com"])
            .args(["-c", "commit.gpgsign=false"])
            .args(args)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?}: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).to_string()
    }

    /// Stage everything in `dir` and commit it
    pub fn git_commit_all(dir: &Path, message: &str) {
        git(dir, &["add", "--all"]);
        git(dir, &["commit", "-q", "-m", message]);
    }
}
