//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//!
//! ## Error Families
//!
//! - **System**: IO, JSON, YAML, git subprocesses, configuration
//! - **Provider**: LLM, embedding and GitHub HTTP failures, classified by
//!   [`ErrorCategory`] so the HTTP bindings know what to retry
//! - **Job**: stage failures, the expected "skip" outcome, and the errors
//!   absorbed at unit-of-work boundaries (tool calls, per-file index sync)
//!
//! ## Propagation
//!
//! - `Tool` is converted into observation text inside the agent loop
//! - `IndexSync` is logged per file and never escapes synchronization
//! - `IndexLoad` triggers a rebuild instead of propagating
//! - `Skipped` travels through the pipeline's failure channel wrapped in
//!   `Stage`, and [`WikiError::is_skipped`] sees through the wrapper

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Provider error categories used for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited - wait then retry
    RateLimit,
    /// Context/token limit exceeded
    TokenLimit,
    /// Authentication failed - fail fast
    Auth,
    /// Network/connectivity issues - retry with backoff
    Network,
    /// Endpoint or model not found
    Unavailable,
    /// Invalid request - don't retry
    BadRequest,
    /// Response could not be parsed
    ParseError,
    /// Temporary server issues - retry
    Transient,
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::TokenLimit => write!(f, "TOKEN_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::ParseError => write!(f, "PARSE_ERROR"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Check if this category is worth retrying against the same endpoint
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Network | Self::Transient)
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// Provider error with category and retry hints
#[derive(Debug, Clone)]
pub struct LlmError {
    pub category: ErrorCategory,
    pub message: String,
    /// Provider that produced the error
    pub provider: Option<String>,
    /// Suggested wait time before retry
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: None,
            retry_after: None,
        }
    }

    pub fn with_provider(
        category: ErrorCategory,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            provider: Some(provider.into()),
            retry_after: None,
        }
    }

    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Maps transport failures and HTTP statuses onto [`ErrorCategory`]
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an HTTP status code returned by a provider
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> LlmError {
        match status {
            429 => LlmError::with_provider(ErrorCategory::RateLimit, message, provider)
                .retry_after(Duration::from_secs(30)),
            401 | 403 => LlmError::with_provider(ErrorCategory::Auth, message, provider),
            400 | 422 => {
                let lower = message.to_lowercase();
                let category = if lower.contains("context length")
                    || lower.contains("maximum context")
                    || lower.contains("too many tokens")
                {
                    ErrorCategory::TokenLimit
                } else {
                    ErrorCategory::BadRequest
                };
                LlmError::with_provider(category, message, provider)
            }
            500 | 502 | 503 | 504 => {
                LlmError::with_provider(ErrorCategory::Transient, message, provider)
                    .retry_after(Duration::from_secs(5))
            }
            404 => LlmError::with_provider(ErrorCategory::Unavailable, message, provider),
            _ => LlmError::with_provider(ErrorCategory::Unknown, message, provider),
        }
    }

    /// Classify a transport-level reqwest failure (no HTTP status available)
    pub fn classify_transport(err: &reqwest::Error, provider: &str) -> LlmError {
        let category = if err.is_timeout() || err.is_connect() || err.is_request() {
            ErrorCategory::Network
        } else if err.is_decode() || err.is_body() {
            ErrorCategory::ParseError
        } else {
            ErrorCategory::Unknown
        };
        LlmError::with_provider(category, err.to_string(), provider)
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum WikiError {
    // -------------------------------------------------------------------------
    // System Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    #[error("Invalid repository '{0}', expected owner/name")]
    InvalidRepository(String),

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    // -------------------------------------------------------------------------
    // Provider Errors
    // -------------------------------------------------------------------------
    #[error("LLM error: {0}")]
    Llm(LlmError),

    #[error("LLM API error: {0}")]
    LlmApi(String),

    #[error("Embedding error: {0}")]
    Embedding(LlmError),

    #[error("GitHub API error: {0}")]
    GitHub(String),

    // -------------------------------------------------------------------------
    // Job Errors
    // -------------------------------------------------------------------------
    /// A pipeline stage could not proceed
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        source: Box<WikiError>,
    },

    /// Expected "no work needed" outcome
    #[error("Skipped: {0}")]
    Skipped(String),

    #[error("Tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },

    #[error("Failed to load index: {0}")]
    IndexLoad(String),

    #[error("Failed to index {path}: {message}")]
    IndexSync { path: String, message: String },

    #[error("Agent exceeded recursion limit of {limit}")]
    RecursionLimit { limit: usize },
}

impl From<LlmError> for WikiError {
    fn from(err: LlmError) -> Self {
        WikiError::Llm(err)
    }
}

pub type Result<T> = std::result::Result<T, WikiError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl WikiError {
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Wrap an error as the failure of a named stage
    pub fn stage(stage: impl Into<String>, source: WikiError) -> Self {
        Self::Stage {
            stage: stage.into(),
            source: Box::new(source),
        }
    }

    pub fn git(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Git {
            command: command.into(),
            message: message.into(),
        }
    }

    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn index_sync(path: impl Into<String>, message: impl ToString) -> Self {
        Self::IndexSync {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// True when this error (or the error a stage failed with) is the skip outcome
    pub fn is_skipped(&self) -> bool {
        match self {
            Self::Skipped(_) => true,
            Self::Stage { source, .. } => source.is_skipped(),
            _ => false,
        }
    }

    /// Name of the stage that failed, if this is a stage failure
    pub fn failed_stage(&self) -> Option<&str> {
        match self {
            Self::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// Wait the provider asked for before retrying
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Llm(e) | Self::Embedding(e) => e.retry_after,
            _ => None,
        }
    }

    /// Check if retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Llm(e) | Self::Embedding(e) => e.is_retryable(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
