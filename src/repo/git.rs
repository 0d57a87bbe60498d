//! Git checkout driven through the git CLI

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::{DiffEntry, RepositorySnapshot, parse_name_status, tree};
use crate::ai::with_timeout;
use crate::config::{GitConfig, PathsConfig};
use crate::constants::repo::FILE_TREE_MAX_DEPTH;
use crate::types::{RepoId, Result, WikiError};

/// A local checkout of `owner/name` at `{repo_dir}/{owner}/{name}`
pub struct GitRepository {
    id: RepoId,
    path: PathBuf,
    pat: Option<SecretString>,
    host: String,
    network_timeout: Duration,
}

impl std::fmt::Debug for GitRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepository")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("pat", &self.pat.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .finish()
    }
}

impl GitRepository {
    pub fn new(id: RepoId, pat: Option<SecretString>, paths: &PathsConfig, git: &GitConfig) -> Self {
        let path = paths.repo_dir.join(id.owner()).join(id.name());
        Self {
            id,
            path,
            pat,
            host: git.host.clone(),
            network_timeout: Duration::from_secs(git.network_timeout_secs),
        }
    }

    /// Use an explicit checkout location instead of the configured layout
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn id(&self) -> &RepoId {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pat(&self) -> Option<&SecretString> {
        self.pat.as_ref()
    }

    pub fn is_cloned(&self) -> bool {
        self.path.join(".git").exists()
    }

    /// Clone URL with the PAT as https user info
    pub(crate) fn clone_url(&self) -> Result<String> {
        let mut url = url::Url::parse(&format!(
            "https://{}/{}/{}.git",
            self.host,
            self.id.owner(),
            self.id.name()
        ))
        .map_err(|e| WikiError::Config(format!("Invalid git host '{}': {}", self.host, e)))?;
        if let Some(pat) = &self.pat {
            url.set_username(pat.expose_secret())
                .map_err(|_| WikiError::Config("Cannot embed token in clone URL".to_string()))?;
        }
        Ok(url.to_string())
    }

    // =========================================================================
    // Command Execution
    // =========================================================================

    fn redact(&self, text: &str) -> String {
        match &self.pat {
            Some(pat) if !pat.expose_secret().is_empty() => {
                text.replace(pat.expose_secret(), "[REDACTED]")
            }
            _ => text.to_string(),
        }
    }

    async fn output(&self, args: &[&str], cwd: Option<&Path>) -> Result<Output> {
        let mut cmd = Command::new("git");
        if let Some(dir) = cwd {
            cmd.arg("-C").arg(dir);
        }
        cmd.args(args).env("GIT_TERMINAL_PROMPT", "0").kill_on_drop(true);
        Ok(cmd.output().await?)
    }

    /// Run a git command in the checkout and return trimmed stdout
    pub(crate) async fn exec(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args, Some(&self.path)).await?;
        let command = args.first().copied().unwrap_or_default();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let message = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(WikiError::git(command, self.redact(message.trim())));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }

    /// Run a git command whose exit status is the answer
    pub(crate) async fn exec_status(&self, args: &[&str]) -> Result<bool> {
        Ok(self.output(args, Some(&self.path)).await?.status.success())
    }

    /// Network operations are bounded by `git.network_timeout_secs`
    pub(crate) async fn exec_network(&self, args: &[&str]) -> Result<String> {
        let operation = format!("git {}", args.join(" "));
        with_timeout(self.network_timeout, self.exec(args), &operation).await
    }

    // =========================================================================
    // Checkout Management
    // =========================================================================

    /// Clone when no checkout exists yet
    #[instrument(skip(self), fields(repo = %self.id))]
    pub async fn clone(&self) -> Result<()> {
        if self.is_cloned() {
            debug!("Checkout exists at {}", self.path.display());
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!("Cloning {} into {}", self.id, self.path.display());
        let url = self.clone_url()?;
        let path = self.path.to_string_lossy().to_string();
        let output = with_timeout(
            self.network_timeout,
            self.output(&["clone", &url, &path], None),
            "git clone",
        )
        .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WikiError::git("clone", self.redact(stderr.trim())));
        }
        Ok(())
    }

    /// Fetch and switch to `branch`, or the remote default branch
    pub async fn checkout(&self, branch: Option<&str>) -> Result<()> {
        self.exec_network(&["fetch", "--all"]).await?;
        let branch = match branch {
            Some(b) => b.to_string(),
            None => self.default_branch().await?,
        };
        debug!("Checking out {} in {}", branch, self.id);
        self.exec(&["checkout", &branch]).await?;
        Ok(())
    }

    /// Discard local edits and rebase onto the upstream branch
    pub async fn pull(&self) -> Result<()> {
        self.exec(&["restore", "."]).await?;
        self.exec_network(&["pull", "--rebase=true"]).await?;
        Ok(())
    }

    /// Clone, checkout and pull, then delete every `ignore_patterns` match
    /// outside `.git`
    #[instrument(skip(self, ignore_patterns), fields(repo = %self.id))]
    pub async fn download(&self, branch: Option<&str>, ignore_patterns: &[String]) -> Result<()> {
        self.clone().await?;
        self.checkout(branch).await?;
        self.pull().await?;
        let removed = remove_ignored(&self.path, ignore_patterns)?;
        if removed > 0 {
            info!("Removed {} paths matching ignore patterns", removed);
        }
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn branch(&self) -> Result<String> {
        self.exec(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    /// Remote default branch from `origin/HEAD`
    pub async fn default_branch(&self) -> Result<String> {
        match self
            .exec(&["symbolic-ref", "--short", "refs/remotes/origin/HEAD"])
            .await
        {
            Ok(name) => Ok(name.trim_start_matches("origin/").to_string()),
            Err(e) => {
                warn!("origin/HEAD not set for {}, using current branch: {}", self.id, e);
                self.branch().await
            }
        }
    }

    /// Files changed most often since `since`, most common first
    pub async fn most_recently_changed_files(
        &self,
        since: Option<&str>,
        top_n: usize,
        existing_only: bool,
    ) -> Result<Vec<(String, usize)>> {
        let mut args = vec![
            "-c",
            "core.quotePath=false",
            "log",
            "--name-only",
            "-z",
            "--pretty=format:",
        ];
        if let Some(since) = since {
            args.extend(["--since", since]);
        }
        let output = self.exec(&args).await?;
        let counted = count_changes(&output, |path| !existing_only || self.path.join(path).exists());
        Ok(counted.into_iter().take(top_n).collect())
    }

    /// Depth-limited tree of the checkout, rooted at `/`
    pub fn file_tree(&self) -> Result<String> {
        tree::render_file_tree(&self.path, FILE_TREE_MAX_DEPTH)
    }
}

#[async_trait]
impl RepositorySnapshot for GitRepository {
    fn key(&self) -> String {
        self.id.key()
    }

    fn root(&self) -> &Path {
        &self.path
    }

    async fn current_commit(&self) -> Result<String> {
        self.exec(&["rev-parse", "HEAD"]).await
    }

    async fn diff(&self, from: &str, to: &str) -> Result<Vec<DiffEntry>> {
        let output = self
            .exec(&[
                "-c",
                "core.quotePath=false",
                "diff",
                "--name-status",
                "--no-renames",
                "-z",
                from,
                to,
            ])
            .await?;
        parse_name_status(&output)
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.path.join(path)).await?)
    }
}

/// Count path occurrences in `git log --name-only -z` output, most common
/// first with ties broken by first appearance
fn count_changes(output: &str, keep: impl Fn(&str) -> bool) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    let paths = output
        .split('\0')
        .map(|p| p.trim_matches('\n'))
        .filter(|p| !p.is_empty());
    for (order, path) in paths.enumerate() {
        if !keep(path) {
            continue;
        }
        counts.entry(path).or_insert((0, order)).0 += 1;
    }
    let mut counted: Vec<_> = counts.into_iter().collect();
    counted.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.1.1.cmp(&b.1.1)));
    counted
        .into_iter()
        .map(|(path, (count, _))| (path.to_string(), count))
        .collect()
}

/// Delete files and directories matching any glob below `root`, never
/// touching `.git`. Returns the number of removed paths.
fn remove_ignored(root: &Path, patterns: &[String]) -> Result<usize> {
    let mut removed = 0;
    for pattern in patterns {
        let full = format!(
            "{}/**/{}",
            glob::Pattern::escape(&root.to_string_lossy()),
            pattern.trim_start_matches('/')
        );
        let matches = glob::glob(&full)
            .map_err(|e| WikiError::Config(format!("Invalid ignore pattern '{pattern}': {e}")))?;
        for path in matches.filter_map(|m| m.ok()) {
            let inside_git = path
                .strip_prefix(root)
                .map(|rel| rel.components().any(|c| c.as_os_str() == ".git"))
                .unwrap_or(true);
            if inside_git {
                continue;
            }
            if path.is_dir() {
                std::fs::remove_dir_all(&path)?;
                removed += 1;
            } else if path.is_file() {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::testing::{git, git_commit_all};
    use crate::repo::ChangeKind;
    use tempfile::TempDir;

    fn repo(pat: Option<&str>) -> GitRepository {
        let paths = PathsConfig {
            repo_dir: PathBuf::from("/tmp/repos"),
            index_dir: PathBuf::from("/tmp/indexes"),
        };
        GitRepository::new(
            RepoId::new("acme", "widgets"),
            pat.map(|p| SecretString::from(p.to_string())),
            &paths,
            &GitConfig::default(),
        )
    }

    #[test]
    fn test_checkout_path_layout() {
        assert_eq!(repo(None).path(), Path::new("/tmp/repos/acme/widgets"));
        assert_eq!(repo(None).key(), "acme/widgets");
    }

    #[test]
    fn test_clone_url_embeds_pat() {
        assert_eq!(
            repo(None).clone_url().unwrap(),
            "https://github.com/acme/widgets.git"
        );
        assert_eq!(
            repo(Some("ghp_abc")).clone_url().unwrap(),
            "https://ghp_abc@github.com/acme/widgets.git"
        );
    }

    #[test]
    fn test_redact_hides_pat() {
        let r = repo(Some("ghp_abc"));
        let text = r.redact("fatal: could not read https://ghp_abc@github.com");
        assert!(!text.contains("ghp_abc"));
        assert!(!format!("{:?}", r).contains("ghp_abc"));
    }

    #[test]
    fn test_count_changes_orders_by_frequency() {
        let output = "src/a.rs\0src/b.rs\0\0\nsrc/a.rs\0README.md\0\0\nsrc/b.rs\0src/a.rs\0";
        let counted = count_changes(output, |_| true);
        assert_eq!(counted[0], ("src/a.rs".to_string(), 3));
        assert_eq!(counted[1], ("src/b.rs".to_string(), 2));
        assert_eq!(counted[2], ("README.md".to_string(), 1));

        let filtered = count_changes(output, |p| p != "src/a.rs");
        assert_eq!(filtered[0].0, "src/b.rs");
    }

    #[tokio::test]
    async fn test_non_ascii_paths_in_diff_and_history() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        git(root, &["init", "-q"]);
        std::fs::write(root.join("가이드.md"), "# 가이드").unwrap();
        std::fs::write(root.join("a.rs"), "fn a() {}").unwrap();
        git_commit_all(root, "first");
        let first = git(root, &["rev-parse", "HEAD"]).trim().to_string();

        std::fs::remove_file(root.join("가이드.md")).unwrap();
        std::fs::write(root.join("설명 문서.md"), "# 설명").unwrap();
        git_commit_all(root, "second");

        let checkout = repo(None).with_path(root);
        let head = checkout.current_commit().await.unwrap();
        assert_eq!(
            checkout.diff(&first, &head).await.unwrap(),
            vec![
                DiffEntry::new(ChangeKind::Deleted, "가이드.md"),
                DiffEntry::new(ChangeKind::Added, "설명 문서.md"),
            ]
        );

        let changed = checkout.most_recently_changed_files(None, 10, true).await.unwrap();
        assert!(changed.contains(&("설명 문서.md".to_string(), 1)));
        assert!(changed.contains(&("a.rs".to_string(), 1)));
        assert!(!changed.iter().any(|(path, _)| path == "가이드.md"));
    }

    #[test]
    fn test_remove_ignored_skips_git_dir() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join(".git/objects")).unwrap();
        std::fs::create_dir_all(root.join("src/snapshots")).unwrap();
        std::fs::write(root.join(".git/objects/x.snap"), "keep").unwrap();
        std::fs::write(root.join("src/snapshots/a.snap"), "drop").unwrap();
        std::fs::write(root.join("src/lib.rs"), "keep").unwrap();

        let removed = remove_ignored(root, &["*.snap".to_string()]).unwrap();
        assert_eq!(removed, 1);
        assert!(root.join(".git/objects/x.snap").exists());
        assert!(!root.join("src/snapshots/a.snap").exists());
        assert!(root.join("src/lib.rs").exists());
    }

    #[test]
    fn test_remove_ignored_deletes_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("fixtures/deep")).unwrap();
        std::fs::write(dir.path().join("fixtures/deep/a.txt"), "x").unwrap();
        remove_ignored(dir.path(), &["fixtures".to_string()]).unwrap();
        assert!(!dir.path().join("fixtures").exists());
    }
}
