//! File selection and chunking for the index

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

use super::chunker::{Language, RecursiveChunker};
use crate::ai::{TokenCounter, TokenEstimator};
use crate::config::IndexConfig;
use crate::types::{Result, WikiError, extension_of};

/// One chunk of one file, before embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// `{file_path}_{chunk_index}`
    pub id: String,
    pub file_path: String,
    pub chunk_index: usize,
    /// File extension without the dot
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    /// Token estimate of the whole file
    pub token_count: usize,
    pub text: String,
}

impl Document {
    pub fn new(file_path: &str, chunk_index: usize, text: impl Into<String>, token_count: usize) -> Self {
        Self {
            id: format!("{file_path}_{chunk_index}"),
            file_path: file_path.to_string(),
            chunk_index,
            kind: extension_of(file_path),
            title: file_path.to_string(),
            token_count,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentLoader {
    code_extensions: HashSet<String>,
    doc_extensions: HashSet<String>,
    excluded_dirs: HashSet<String>,
    excluded_files: HashSet<String>,
    max_embedding_tokens: usize,
    chunker: RecursiveChunker,
}

fn lowercase_set(items: &[String]) -> HashSet<String> {
    items
        .iter()
        .map(|s| s.trim_start_matches('.').to_lowercase())
        .collect()
}

impl DocumentLoader {
    pub fn new(config: &IndexConfig) -> Self {
        Self {
            code_extensions: lowercase_set(&config.code_extensions),
            doc_extensions: lowercase_set(&config.doc_extensions),
            excluded_dirs: config.excluded_dirs.iter().cloned().collect(),
            excluded_files: config.excluded_files.iter().cloned().collect(),
            max_embedding_tokens: config.max_embedding_tokens,
            chunker: RecursiveChunker::new(config.chunk_size, config.chunk_overlap),
        }
    }

    /// Files without an extension count as code
    pub fn is_code(&self, path: &str) -> bool {
        let ext = extension_of(path);
        ext.is_empty() || self.code_extensions.contains(&ext)
    }

    /// Whether `path` (relative, `/`-separated) belongs in the index
    pub fn accepts(&self, path: &str) -> bool {
        let mut components = path.split('/').filter(|c| !c.is_empty()).peekable();
        let mut file_name = "";
        while let Some(component) = components.next() {
            if components.peek().is_none() {
                file_name = component;
            } else if component == ".git" || self.excluded_dirs.contains(component) {
                return false;
            }
        }
        if file_name.is_empty() || self.excluded_files.contains(file_name) {
            return false;
        }
        let ext = extension_of(file_name);
        ext.is_empty() || self.code_extensions.contains(&ext) || self.doc_extensions.contains(&ext)
    }

    /// Relative paths of every indexable file under `root`, sorted
    ///
    /// Ignore files are not consulted: selection is [`Self::accepts`] alone,
    /// the same rule incremental synchronization applies to diff entries.
    pub fn scan(&self, root: &Path) -> Vec<String> {
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(false)
            .filter_entry(|entry| entry.file_name() != ".git")
            .build();

        let mut paths: Vec<String> = walker
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_some_and(|t| t.is_file()))
            .filter_map(|e| {
                e.path()
                    .strip_prefix(root)
                    .ok()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
            })
            .filter(|p| self.accepts(p))
            .collect();
        paths.sort();
        paths
    }

    /// Chunk one file's content
    ///
    /// Non-code files above the token budget yield no documents.
    pub fn load(&self, path: &str, content: &[u8]) -> Result<Vec<Document>> {
        let text = std::str::from_utf8(content)
            .map_err(|e| WikiError::index_sync(path, format!("not UTF-8: {e}")))?;

        let is_code = self.is_code(path);
        let estimator = if is_code { TokenEstimator::CodeAware } else { TokenEstimator::CharBased };
        let token_count = TokenCounter::new(estimator).count(text);
        if !is_code && token_count > self.max_embedding_tokens {
            warn!(
                "File {} exceeds max token limit ({} > {})",
                path, token_count, self.max_embedding_tokens
            );
            return Ok(Vec::new());
        }

        let language = Language::from_extension(&extension_of(path));
        let documents: Vec<Document> = self
            .chunker
            .split(text, language)
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| Document::new(path, i, chunk, token_count))
            .collect();
        debug!("Chunked {} into {} documents", path, documents.len());
        Ok(documents)
    }
}
