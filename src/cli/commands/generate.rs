//! Generate Command
//!
//! Run the full wiki job for one repository.
//!
//! Usage:
//!   repowiki generate acme/widgets [--branch main] [--wiki-config wiki.yaml] [--model openai/gpt-4o] [--force]

use secrecy::SecretString;
use std::path::PathBuf;
use tokio::runtime::Runtime;

use crate::cli::ui::Output;
use crate::config::{Settings, WikiConfig};
use crate::types::{RepoId, Result};
use crate::wiki::{Context, JobOutcome, WikiJob};

/// Where the per-repository wiki config is looked up inside the checkout
/// when `--wiki-config` is not given
pub const DEFAULT_WIKI_CONFIG: &str = ".repowiki/wiki.yaml";

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// `owner/name`
    pub repo: String,
    /// Branch to document; `None` uses the default branch
    pub branch: Option<String>,
    /// Personal access token for clone, push and code search
    pub pat: Option<String>,
    /// Wiki config file; `None` reads it from the checkout
    pub wiki_config: Option<PathBuf>,
    /// Model selector overriding every stage
    pub model: Option<String>,
    /// Regenerate even if the wiki is fresh
    pub force: bool,
}

/// Wiki config from `--wiki-config`, else from the checkout, else defaults
pub fn resolve_wiki_config(explicit: Option<&std::path::Path>, checkout: &std::path::Path) -> WikiConfig {
    let path = explicit
        .map(PathBuf::from)
        .unwrap_or_else(|| checkout.join(DEFAULT_WIKI_CONFIG));
    WikiConfig::load_or_default(&path)
}

pub fn run(options: GenerateOptions, settings: Settings) -> Result<JobOutcome> {
    let output = Output::new();
    let id: RepoId = options.repo.parse()?;
    let checkout = settings.paths.repo_dir.join(id.owner()).join(id.name());
    let config = resolve_wiki_config(options.wiki_config.as_deref(), &checkout);

    let context = Context::builder(id, settings)
        .wiki_config(config)
        .pat(options.pat.map(SecretString::from))
        .model_override(options.model)
        .force(options.force)
        .build()?;

    output.header(&format!("Generating wiki for {}", context.repo.id()));
    output.field("Checkout", context.repo.path().display());
    output.field("Wiki", context.wiki_path().display());

    let job = WikiJob::new(context);
    let outcome = Runtime::new()?.block_on(job.run(options.branch));

    match &outcome {
        JobOutcome::Success => output.success("Wiki generated"),
        JobOutcome::Skipped(reason) => output.info(reason),
        JobOutcome::Failed(e) => output.error(&e.to_string()),
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_wiki_config_from_checkout() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".repowiki")).unwrap();
        std::fs::write(dir.path().join(DEFAULT_WIKI_CONFIG), "language: Spanish\n").unwrap();

        assert_eq!(resolve_wiki_config(None, dir.path()).language, "Spanish");
    }

    #[test]
    fn test_explicit_wiki_config_wins() {
        let dir = TempDir::new().unwrap();
        let explicit = dir.path().join("custom.yaml");
        std::fs::write(&explicit, "language: Italian\n").unwrap();

        let config = resolve_wiki_config(Some(&explicit), &dir.path().join("missing"));
        assert_eq!(config.language, "Italian");
    }

    #[test]
    fn test_missing_wiki_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_wiki_config(None, dir.path()), WikiConfig::default());
    }
}
