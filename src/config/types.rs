//! Configuration Types
//!
//! Process-wide settings with sensible defaults. Per-repository wiki options
//! live in [`super::wiki`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{agent, index, network, pages, repo};
use crate::types::{Result, WikiError};

/// Root settings structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Chat model endpoint
    pub llm: LlmConfig,

    /// Per-stage model selection
    pub generation: GenerationConfig,

    /// Embedding endpoint used by the retrieval index
    pub embedder: EmbedderConfig,

    /// Chunking, filtering and retrieval tuning
    pub index: IndexConfig,

    /// Agent loop bounds
    pub agent: AgentConfig,

    /// Page fan-out
    pub pages: PagesConfig,

    /// Where checkouts and indexes live
    pub paths: PathsConfig,

    pub git: GitConfig,

    pub github: GitHubConfig,
}

impl Settings {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<()> {
        if self.llm.timeout_secs == 0 {
            return Err(WikiError::Config(
                "llm.timeout_secs must be greater than 0".to_string(),
            ));
        }

        for (name, stage) in self.generation.stages() {
            if !(0.0..=2.0).contains(&stage.temperature) {
                return Err(WikiError::Config(format!(
                    "generation.{name}.temperature must be between 0.0 and 2.0, got {}",
                    stage.temperature
                )));
            }
        }

        if self.pages.max_concurrency == 0 {
            return Err(WikiError::Config(
                "pages.max_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.agent.step_limit == 0 {
            return Err(WikiError::Config(
                "agent.step_limit must be greater than 0".to_string(),
            ));
        }

        // Reasoning and tool nodes per step, plus the forced answer and extraction
        let minimum = 2 * self.agent.step_limit + 3;
        if self.agent.recursion_limit < minimum {
            return Err(WikiError::Config(format!(
                "agent.recursion_limit must be at least {minimum} for step_limit {}",
                self.agent.step_limit
            )));
        }

        if self.index.chunk_size == 0 || self.index.chunk_overlap >= self.index.chunk_size {
            return Err(WikiError::Config(format!(
                "index.chunk_overlap ({}) must be smaller than index.chunk_size ({})",
                self.index.chunk_overlap, self.index.chunk_size
            )));
        }

        if self.index.k == 0 || self.index.fetch_k < self.index.k {
            return Err(WikiError::Config(format!(
                "index.fetch_k ({}) must be at least index.k ({}) and k must be positive",
                self.index.fetch_k, self.index.k
            )));
        }

        if !(0.0..=1.0).contains(&self.index.lambda) {
            return Err(WikiError::Config(format!(
                "index.lambda must be between 0.0 and 1.0, got {}",
                self.index.lambda
            )));
        }

        if self.embedder.batch_size == 0 {
            return Err(WikiError::Config(
                "embedder.batch_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model selector used when a stage does not name one, `provider/model`
    pub default_model: String,

    /// API base URL for OpenAI-compatible endpoints
    pub api_base: Option<String>,

    /// API key; falls back to `OPENAI_API_KEY`. Never serialized.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Retries for rate limits and transient server errors
    pub max_retries: usize,

    /// Maximum completion tokens per request
    pub max_tokens: Option<usize>,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("default_model", &self.default_model)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_model: "openai/gpt-4o".to_string(),
            api_base: None,
            api_key: None,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
            max_retries: network::DEFAULT_MAX_RETRIES,
            max_tokens: None,
        }
    }
}

// =============================================================================
// Generation Configuration
// =============================================================================

/// Model settings for one generation stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageModelConfig {
    /// `provider/model`; `None` uses `llm.default_model`
    pub model: Option<String>,

    pub temperature: f32,

    pub top_p: Option<f32>,

    /// Replace the built-in prompt template with this file
    pub prompt_template: Option<PathBuf>,
}

impl Default for StageModelConfig {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.0,
            top_p: None,
            prompt_template: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GenerationConfig {
    pub structure: StageModelConfig,
    pub page: StageModelConfig,
    pub index: StageModelConfig,
}

impl GenerationConfig {
    pub fn stages(&self) -> [(&'static str, &StageModelConfig); 3] {
        [
            ("structure", &self.structure),
            ("page", &self.page),
            ("index", &self.index),
        ]
    }
}

// =============================================================================
// Embedder Configuration
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    /// `provider/model`, e.g. `openai/text-embedding-3-small`
    pub model: String,

    /// Requested vector size (models that support shortening)
    pub dimensions: Option<usize>,

    /// Texts per embedding request
    pub batch_size: usize,

    pub api_base: Option<String>,

    /// Falls back to `llm.api_key`, then `OPENAI_API_KEY`. Never serialized.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub timeout_secs: u64,

    pub max_retries: usize,
}

impl std::fmt::Debug for EmbedderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedderConfig")
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .field("batch_size", &self.batch_size)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            model: "openai/text-embedding-3-small".to_string(),
            dimensions: Some(1536),
            batch_size: 64,
            api_base: None,
            api_key: None,
            timeout_secs: 120,
            max_retries: network::DEFAULT_MAX_RETRIES,
        }
    }
}

// =============================================================================
// Index Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Chunk size in characters
    pub chunk_size: usize,

    /// Characters shared between neighbouring chunks
    pub chunk_overlap: usize,

    /// Non-code files above this token estimate are skipped
    pub max_embedding_tokens: usize,

    /// Extensions (no dot) treated as code; files without extension count as code too
    pub code_extensions: Vec<String>,

    /// Extensions (no dot) indexed as documentation
    pub doc_extensions: Vec<String>,

    /// Directory names excluded anywhere in a path
    pub excluded_dirs: Vec<String>,

    /// File names excluded anywhere
    pub excluded_files: Vec<String>,

    /// Results per query
    pub k: usize,

    /// MMR candidate pool
    pub fetch_k: usize,

    /// MMR relevance/diversity trade-off
    pub lambda: f32,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            chunk_size: index::DEFAULT_CHUNK_SIZE,
            chunk_overlap: index::DEFAULT_CHUNK_OVERLAP,
            max_embedding_tokens: index::MAX_EMBEDDING_TOKENS,
            code_extensions: strings(&[
                "py", "js", "jsx", "ts", "tsx", "java", "kt", "kts", "go", "rs", "c", "h", "cpp",
                "cc", "hpp", "cs", "php", "rb", "swift", "scala", "sh", "sql", "html", "css",
                "scss", "vue", "svelte", "lua",
            ]),
            doc_extensions: strings(&["md", "mdx", "rst", "txt", "yaml", "yml", "toml", "json"]),
            excluded_dirs: strings(&[
                ".git",
                "node_modules",
                "target",
                "dist",
                "build",
                "vendor",
                "__pycache__",
                ".venv",
                "venv",
                ".idea",
                ".vscode",
            ]),
            excluded_files: strings(&[
                "package-lock.json",
                "yarn.lock",
                "pnpm-lock.yaml",
                "Cargo.lock",
                "poetry.lock",
                "uv.lock",
                "go.sum",
                ".DS_Store",
            ]),
            k: index::DEFAULT_K,
            fetch_k: index::DEFAULT_FETCH_K,
            lambda: index::DEFAULT_LAMBDA,
        }
    }
}

// =============================================================================
// Agent / Pages Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Tool rounds before a final answer is forced
    pub step_limit: usize,

    /// Hard ceiling on loop node visits
    pub recursion_limit: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            step_limit: agent::DEFAULT_STEP_LIMIT,
            recursion_limit: agent::DEFAULT_RECURSION_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PagesConfig {
    /// Page tasks running at once
    pub max_concurrency: usize,

    /// Generate only the first N pages (useful for trial runs)
    pub max_pages: Option<usize>,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            max_concurrency: pages::DEFAULT_MAX_CONCURRENCY,
            max_pages: None,
        }
    }
}

// =============================================================================
// Paths / Git Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Checkouts live at `{repo_dir}/{owner}/{name}`
    pub repo_dir: PathBuf,

    /// Indexes live at `{index_dir}/{owner}/{name}`
    pub index_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let data_dir = directories::ProjectDirs::from("", "", "repowiki")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".repowiki"));
        Self {
            repo_dir: data_dir.join("repos"),
            index_dir: data_dir.join("indexes"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Host used for clone URLs
    pub host: String,

    /// Timeout for clone, fetch, pull and push
    pub network_timeout_secs: u64,

    /// Identity used for wiki commits
    pub author_name: String,
    pub author_email: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            host: "github.com".to_string(),
            network_timeout_secs: repo::DEFAULT_NETWORK_TIMEOUT_SECS,
            author_name: "repowiki".to_string(),
            author_email: "repowiki@users.noreply.github.com".to_string(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_base: String,

    /// Token for code search; falls back to the job's PAT. Never serialized.
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_base", &self.api_base)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: network::DEFAULT_GITHUB_API_BASE.to_string(),
            token: None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
