//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Agent loop constants
pub mod agent {
    /// Tool-execution rounds allowed before a final answer is forced
    pub const DEFAULT_STEP_LIMIT: usize = 10;

    /// Hard ceiling on loop node visits, independent of the step counter
    pub const DEFAULT_RECURSION_LIMIT: usize = 50;

    /// Instruction appended when the step budget is exhausted
    pub const FORCED_FINAL_ANSWER_INSTRUCTION: &str = "You have reached the maximum number of steps. \
        Please provide a final answer based on the conversation so far.";
}

/// Page generation constants
pub mod pages {
    /// Page-generation tasks allowed to run at once
    pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

    /// File the index stage writes at the wiki root
    pub const INDEX_FILE_NAME: &str = "README.md";
}

/// Retrieval index constants
pub mod index {
    /// Results returned by a diversity-aware query
    pub const DEFAULT_K: usize = 12;

    /// Candidate pool considered by MMR before diversification
    pub const DEFAULT_FETCH_K: usize = 20;

    /// MMR trade-off (1.0 = pure relevance, 0.0 = pure diversity)
    pub const DEFAULT_LAMBDA: f32 = 0.25;

    /// Characters of file content shown in a search preview
    pub const PREVIEW_CHARS: usize = 160;

    /// Default chunk size in characters
    pub const DEFAULT_CHUNK_SIZE: usize = 1000;

    /// Default chunk overlap in characters
    pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

    /// Non-code files above this many tokens are not embedded
    pub const MAX_EMBEDDING_TOKENS: usize = 8191;

    /// Persisted index format version
    pub const FORMAT_VERSION: u32 = 1;

    /// Serialized index file name inside the per-repository directory
    pub const INDEX_FILE_NAME: &str = "index.json";

    /// Commit marker file name inside the per-repository directory
    pub const COMMIT_MARKER_FILE_NAME: &str = "commit_hash";
}

/// Tool output constants
pub mod tools {
    /// Paths shown by the list_files tool before summarizing the rest
    pub const LIST_FILES_LIMIT: usize = 100;

    /// Lines per page of the view_file_content tool
    pub const LINES_PER_PAGE: usize = 100;

    /// Code search results rendered per query
    pub const CODE_SEARCH_MAX_RESULTS: usize = 10;
}

/// Repository constants
pub mod repo {
    /// Default wiki directory inside the wiki repository
    pub const DEFAULT_WIKI_DIRECTORY: &str = "/wikis";

    /// Default interval during which a fresh wiki is not regenerated (7 days)
    pub const DEFAULT_SKIP_SECS: u64 = 7 * 24 * 60 * 60;

    /// Look-back window for most-changed files
    pub const RECENT_CHANGES_SINCE: &str = "6 months ago";

    /// Most-changed files listed in the structure prompt
    pub const RECENT_CHANGES_TOP_N: usize = 10;

    /// Depth of the rendered file tree
    pub const FILE_TREE_MAX_DEPTH: usize = 6;

    /// Timeout for network git operations (clone, fetch, pull, push)
    pub const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 600;
}

/// Network constants
pub mod network {
    /// Default HTTP timeout for LLM requests (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Retries for retryable provider failures
    pub const DEFAULT_MAX_RETRIES: usize = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;

    pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";

    pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
}

/// Process exit codes
pub mod exit {
    pub const SUCCESS: u8 = 0;
    pub const FAILURE: u8 = 1;
    /// Wiki is fresh enough; nothing generated
    pub const SKIPPED: u8 = 100;
}
