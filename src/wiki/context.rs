//! Shared job context
//!
//! Built once per job and never mutated afterwards; every stage and every
//! concurrently running page task reads from the same [`Context`].

use secrecy::SecretString;
use std::path::Path;
use std::sync::Arc;

use super::prompts::{AGENT_SYSTEM_PROMPT, PromptTemplate};
use crate::agent::{BoundedAgentLoop, ToolRegistry, repository_tools};
use crate::ai::{SharedChatModel, SharedEmbedder, create_chat_model, create_embedder};
use crate::config::{Settings, StageModelConfig, WikiConfig};
use crate::index::IndexRegistry;
use crate::repo::{GitHubClient, GitRepository, WikiRepository};
use crate::types::{RepoId, Result};

pub struct Context {
    pub repo: Arc<GitRepository>,
    pub wiki_repo: WikiRepository,
    pub config: WikiConfig,
    pub settings: Settings,
    pub index: Arc<IndexRegistry>,
    tools: Arc<ToolRegistry>,
    /// Model selector from the command line; wins over everything else
    model_override: Option<String>,
    /// Chat model used for every stage instead of building one from settings
    pinned_model: Option<SharedChatModel>,
    /// Regenerate even when the wiki is fresh
    pub force: bool,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("repo", &self.repo)
            .field("wiki_path", &self.wiki_repo.wiki_path())
            .field("tools", &self.tools)
            .field("model_override", &self.model_override)
            .field("force", &self.force)
            .finish()
    }
}

impl Context {
    pub fn builder(repo: RepoId, settings: Settings) -> ContextBuilder {
        ContextBuilder {
            repo,
            settings,
            config: WikiConfig::default(),
            pat: None,
            checkout: None,
            model_override: None,
            pinned_model: None,
            embedder: None,
            index: None,
            force: false,
        }
    }

    /// Chat model for one stage: pinned model, then `--model`, then the
    /// wiki config's `model`, then the stage's own configuration
    pub fn chat_model(&self, stage: &StageModelConfig) -> Result<SharedChatModel> {
        if let Some(model) = &self.pinned_model {
            return Ok(Arc::clone(model));
        }
        let selector = self.model_override.as_deref().or(self.config.model.as_deref());
        create_chat_model(selector, &self.settings.llm, stage)
    }

    pub fn tools(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.tools)
    }

    /// Prompt template for one stage, honoring its override file
    pub fn template(&self, stage: &StageModelConfig, builtin: &str) -> Result<PromptTemplate> {
        PromptTemplate::load(stage.prompt_template.as_deref(), builtin)
    }

    /// Agent over the repository tools, bounded by the agent settings
    pub fn agent(&self, stage: &StageModelConfig) -> Result<BoundedAgentLoop> {
        Ok(
            BoundedAgentLoop::new(AGENT_SYSTEM_PROMPT, self.chat_model(stage)?, self.tools())
                .with_limits(&self.settings.agent),
        )
    }

    pub fn wiki_path(&self) -> &Path {
        self.wiki_repo.wiki_path()
    }
}

pub struct ContextBuilder {
    repo: RepoId,
    settings: Settings,
    config: WikiConfig,
    pat: Option<SecretString>,
    checkout: Option<std::path::PathBuf>,
    model_override: Option<String>,
    pinned_model: Option<SharedChatModel>,
    embedder: Option<SharedEmbedder>,
    index: Option<Arc<IndexRegistry>>,
    force: bool,
}

impl ContextBuilder {
    pub fn wiki_config(mut self, config: WikiConfig) -> Self {
        self.config = config;
        self
    }

    pub fn pat(mut self, pat: Option<SecretString>) -> Self {
        self.pat = pat;
        self
    }

    /// Use an existing checkout instead of `{repo_dir}/{owner}/{name}`
    pub fn checkout(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.checkout = Some(path.into());
        self
    }

    pub fn model_override(mut self, selector: Option<String>) -> Self {
        self.model_override = selector;
        self
    }

    pub fn pin_chat_model(mut self, model: SharedChatModel) -> Self {
        self.pinned_model = Some(model);
        self
    }

    pub fn embedder(mut self, embedder: SharedEmbedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Share an index registry across jobs in one process
    pub fn index_registry(mut self, index: Arc<IndexRegistry>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn build(self) -> Result<Context> {
        let settings = self.settings;

        let mut repo = GitRepository::new(self.repo, self.pat, &settings.paths, &settings.git);
        if let Some(path) = self.checkout {
            repo = repo.with_path(path);
        }
        let repo = Arc::new(repo);
        let wiki_repo = WikiRepository::new(Arc::clone(&repo), &self.config, &settings.paths, &settings.git)?;

        let index = match self.index {
            Some(index) => index,
            None => {
                let embedder = match self.embedder {
                    Some(embedder) => embedder,
                    None => create_embedder(&settings.embedder, &settings.llm)?,
                };
                Arc::new(IndexRegistry::new(
                    settings.paths.index_dir.clone(),
                    settings.index.clone(),
                    embedder,
                ))
            }
        };

        let github = Arc::new(GitHubClient::new(&settings.github, repo.pat())?);
        let tools = Arc::new(repository_tools(Arc::clone(&repo), Arc::clone(&index), github));

        Ok(Context {
            repo,
            wiki_repo,
            config: self.config,
            settings,
            index,
            tools,
            model_override: self.model_override,
            pinned_model: self.pinned_model,
            force: self.force,
        })
    }
}
