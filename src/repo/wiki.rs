//! The repository a generated wiki is published to
//!
//! Either the source repository itself or a separate repository named by
//! `wiki.repository`. Pages are written below `wiki_path`, which is the
//! configured `wiki.directory` inside the wiki checkout.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{GitRepository, RepositorySnapshot};
use crate::config::{GitConfig, PathsConfig, WikiConfig};
use crate::types::{Result, normalize_path};

pub struct WikiRepository {
    base: Arc<GitRepository>,
    checkout: Arc<GitRepository>,
    separate: bool,
    branch: Option<String>,
    directory: String,
    wiki_path: PathBuf,
    author_name: String,
    author_email: String,
}

impl WikiRepository {
    pub fn new(
        base: Arc<GitRepository>,
        config: &WikiConfig,
        paths: &PathsConfig,
        git: &GitConfig,
    ) -> Result<Self> {
        let (checkout, separate) = match config.wiki_repository()? {
            Some(id) if &id != base.id() => (
                Arc::new(GitRepository::new(id, base.pat().cloned(), paths, git)),
                true,
            ),
            _ => (Arc::clone(&base), false),
        };
        let directory = normalize_path(&config.wiki.directory).to_string();
        let wiki_path = checkout.path().join(&directory);

        Ok(Self {
            base,
            checkout,
            separate,
            branch: config.wiki.branch.clone(),
            directory,
            wiki_path,
            author_name: git.author_name.clone(),
            author_email: git.author_email.clone(),
        })
    }

    /// Directory generated pages are written to
    pub fn wiki_path(&self) -> &Path {
        &self.wiki_path
    }

    pub fn checkout(&self) -> &GitRepository {
        &self.checkout
    }

    pub fn is_separate(&self) -> bool {
        self.separate
    }

    /// Bring a separate wiki checkout up to date; a no-op when the wiki
    /// lives in the source repository
    pub async fn download(&self) -> Result<()> {
        if self.separate {
            self.checkout.download(self.branch.as_deref(), &[]).await?;
        }
        Ok(())
    }

    /// Commit time of the latest commit touching the wiki directory
    ///
    /// `None` when the directory has never been committed or git fails.
    pub async fn last_commit_time(&self) -> Option<DateTime<Utc>> {
        let target = if self.directory.is_empty() { "." } else { &self.directory };
        let output = match self
            .checkout
            .exec(&["--no-pager", "log", "-1", "--format=%cI", "--", target])
            .await
        {
            Ok(out) => out,
            Err(e) => {
                warn!("Failed to get last commit time: {}", e);
                return None;
            }
        };
        parse_commit_time(&output)
    }

    /// Stage the wiki directory, commit and push
    ///
    /// Returns `false` when there was nothing to commit.
    #[instrument(skip(self), fields(wiki = %self.checkout.id()))]
    pub async fn upload(&self) -> Result<bool> {
        let message = format!(
            "Update wiki for {} ({})",
            self.base.branch().await?,
            self.base.current_commit().await?
        );
        let target = if self.directory.is_empty() { "." } else { &self.directory };

        self.checkout.exec(&["add", "--all", "--", target]).await?;
        if self
            .checkout
            .exec_status(&["diff", "--cached", "--quiet"])
            .await?
        {
            info!("No wiki changes to commit");
            return Ok(false);
        }

        let name = format!("user.name={}", self.author_name);
        let email = format!("user.email={}", self.author_email);
        self.checkout
            .exec(&["-c", &name, "-c", &email, "commit", "-m", &message])
            .await?;

        let branch = match &self.branch {
            Some(b) => b.clone(),
            None => self.checkout.branch().await?,
        };
        let refspec = format!("HEAD:{branch}");
        self.checkout.exec_network(&["push", "origin", &refspec]).await?;
        info!("Pushed wiki: {}", message);
        Ok(true)
    }

    /// Remove generated output; a separate wiki checkout is removed whole
    /// while the source checkout is kept for the next run
    pub async fn cleanup(&self) -> Result<()> {
        if self.separate {
            remove_dir_if_exists(self.checkout.path()).await?;
        } else if self.directory.is_empty() {
            // The wiki is the checkout root; restore tracked files instead
            warn!("Wiki directory is the repository root, restoring instead of removing");
            self.checkout.exec(&["restore", "."]).await?;
        } else {
            remove_dir_if_exists(&self.wiki_path).await?;
        }
        Ok(())
    }
}

async fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn parse_commit_time(output: &str) -> Option<DateTime<Utc>> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(trimmed) {
        Ok(time) => Some(time.with_timezone(&Utc)),
        Err(e) => {
            warn!("Unparsable commit time '{}': {}", trimmed, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::testing::{git, git_commit_all};
    use crate::types::{RepoId, WikiError};
    use tempfile::TempDir;

    fn setup(dir: &TempDir, yaml: &str) -> WikiRepository {
        setup_with(dir, yaml, &GitConfig::default())
    }

    fn setup_with(dir: &TempDir, yaml: &str, git: &GitConfig) -> WikiRepository {
        let paths = PathsConfig {
            repo_dir: dir.path().join("repos"),
            index_dir: dir.path().join("indexes"),
        };
        let base = Arc::new(GitRepository::new(RepoId::new("acme", "widgets"), None, &paths, git));
        let config = WikiConfig::from_yaml_str(yaml).unwrap();
        WikiRepository::new(base, &config, &paths, git).unwrap()
    }

    #[test]
    fn test_wiki_in_source_repository() {
        let dir = TempDir::new().unwrap();
        let wiki = setup(&dir, "");
        assert!(!wiki.is_separate());
        assert_eq!(wiki.wiki_path(), dir.path().join("repos/acme/widgets/wikis"));
    }

    #[test]
    fn test_separate_wiki_repository() {
        let dir = TempDir::new().unwrap();
        let wiki = setup(&dir, "wiki:\n  repository: acme/handbook\n  directory: ./docs\n");
        assert!(wiki.is_separate());
        assert_eq!(wiki.wiki_path(), dir.path().join("repos/acme/handbook/docs"));
    }

    #[test]
    fn test_same_repository_is_not_separate() {
        let dir = TempDir::new().unwrap();
        let wiki = setup(&dir, "wiki:\n  repository: acme/widgets\n");
        assert!(!wiki.is_separate());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_source_checkout() {
        let dir = TempDir::new().unwrap();
        let wiki = setup(&dir, "");
        let base = dir.path().join("repos/acme/widgets");
        std::fs::create_dir_all(wiki.wiki_path()).unwrap();
        std::fs::write(wiki.wiki_path().join("page.md"), "x").unwrap();
        std::fs::write(base.join("main.rs"), "fn main() {}").unwrap();

        wiki.cleanup().await.unwrap();
        assert!(!wiki.wiki_path().exists());
        assert!(base.join("main.rs").exists());

        // second cleanup is harmless
        wiki.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_removes_separate_checkout() {
        let dir = TempDir::new().unwrap();
        let wiki = setup(&dir, "wiki:\n  repository: acme/handbook\n");
        std::fs::create_dir_all(wiki.wiki_path()).unwrap();
        wiki.cleanup().await.unwrap();
        assert!(!dir.path().join("repos/acme/handbook").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_push_bounded_by_network_timeout() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let git_config = GitConfig {
            network_timeout_secs: 1,
            ..Default::default()
        };
        let wiki = setup_with(&dir, "", &git_config);
        let checkout = dir.path().join("repos/acme/widgets");
        let remote = dir.path().join("remote.git");
        std::fs::create_dir_all(&checkout).unwrap();
        git(dir.path(), &["init", "-q", "--bare", "remote.git"]);
        git(&checkout, &["init", "-q"]);
        git(&checkout, &["remote", "add", "origin", &remote.to_string_lossy()]);
        std::fs::write(checkout.join("main.rs"), "fn main() {}").unwrap();
        git_commit_all(&checkout, "seed");

        // a push that never finishes on its own
        let hook = checkout.join(".git/hooks/pre-push");
        std::fs::write(&hook, "#!/bin/sh\nsleep 30\n").unwrap();
        std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();

        std::fs::create_dir_all(wiki.wiki_path()).unwrap();
        std::fs::write(wiki.wiki_path().join("page.md"), "# Page").unwrap();

        let started = std::time::Instant::now();
        let err = wiki.upload().await.unwrap_err();
        assert!(matches!(err, WikiError::Timeout { .. }), "unexpected error: {err}");
        assert!(started.elapsed() < std::time::Duration::from_secs(20));
    }

    #[test]
    fn test_parse_commit_time() {
        let time = parse_commit_time("2024-05-01T10:00:00+09:00\n").unwrap();
        assert_eq!(time.to_rfc3339(), "2024-05-01T01:00:00+00:00");
        assert!(parse_commit_time("").is_none());
        assert!(parse_commit_time("yesterday").is_none());
    }
}
