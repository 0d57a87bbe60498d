//! Persisted vector store
//!
//! A flat, exact-search store: every chunk keeps its embedding and search
//! scans all of them. Repositories indexed here are thousands of chunks, not
//! millions, so a scan is cheaper than maintaining an ANN structure across
//! incremental updates.
//!
//! ## On-disk layout
//!
//! ```text
//! {index_dir}/{owner}/{name}/
//! ├── index.json     # format version, embedder model, checksum, chunks
//! └── commit_hash    # commit the chunks correspond to, plain text
//! ```
//!
//! The index file is written to a temp file and renamed into place before the
//! commit marker is written. A crash between the two leaves an older marker,
//! which the next synchronize reconciles by diffing.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::loader::Document;
use super::mmr::maximal_marginal_relevance;
use crate::constants::index::{COMMIT_MARKER_FILE_NAME, FORMAT_VERSION, INDEX_FILE_NAME};
use crate::types::{Result, WikiError};

/// A document chunk with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    #[serde(flatten)]
    pub document: Document,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct VectorStore {
    model: String,
    chunks: BTreeMap<String, IndexedChunk>,
}

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    version: u32,
    model: String,
    checksum: u32,
    chunks: Vec<IndexedChunk>,
}

impl VectorStore {
    /// Empty store for vectors produced by `model`
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            chunks: BTreeMap::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Insert chunks, replacing any with the same id
    pub fn add(&mut self, chunks: impl IntoIterator<Item = IndexedChunk>) -> usize {
        let mut added = 0;
        for chunk in chunks {
            self.chunks.insert(chunk.document.id.clone(), chunk);
            added += 1;
        }
        added
    }

    /// Remove every chunk whose file path metadata equals `path`
    pub fn delete_file(&mut self, path: &str) -> usize {
        let before = self.chunks.len();
        self.chunks.retain(|_, c| c.document.file_path != path);
        before - self.chunks.len()
    }

    /// Distinct file paths with at least one chunk
    pub fn files(&self) -> BTreeSet<String> {
        self.chunks
            .values()
            .map(|c| c.document.file_path.clone())
            .collect()
    }

    /// Chunks of one file in chunk order
    pub fn chunks_for(&self, path: &str) -> Vec<&IndexedChunk> {
        let mut chunks: Vec<_> = self
            .chunks
            .values()
            .filter(|c| c.document.file_path == path)
            .collect();
        chunks.sort_by_key(|c| c.document.chunk_index);
        chunks
    }

    /// Diversity-aware nearest neighbours of `query`
    pub fn search_mmr(&self, query: &[f32], k: usize, fetch_k: usize, lambda: f32) -> Vec<&IndexedChunk> {
        let all: Vec<&IndexedChunk> = self.chunks.values().collect();
        let vectors: Vec<&[f32]> = all.iter().map(|c| c.embedding.as_slice()).collect();
        maximal_marginal_relevance(query, &vectors, k, fetch_k, lambda)
            .into_iter()
            .map(|i| all[i])
            .collect()
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    pub fn index_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE_NAME)
    }

    pub fn marker_path(dir: &Path) -> PathBuf {
        dir.join(COMMIT_MARKER_FILE_NAME)
    }

    /// Write the index, then the commit marker
    pub fn save(&self, dir: &Path, commit: &str) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let chunks: Vec<IndexedChunk> = self.chunks.values().cloned().collect();
        let checksum = crc32fast::hash(&serde_json::to_vec(&chunks)?);
        let persisted = PersistedIndex {
            version: FORMAT_VERSION,
            model: self.model.clone(),
            checksum,
            chunks,
        };

        let path = Self::index_path(dir);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(&persisted)?)?;
        std::fs::rename(&tmp, &path)?;
        std::fs::write(Self::marker_path(dir), commit)?;
        Ok(())
    }

    /// Load an index written by [`save`](Self::save)
    ///
    /// Any problem (missing file, corruption, version or model mismatch) is
    /// reported as [`WikiError::IndexLoad`].
    pub fn load(dir: &Path, expected_model: &str) -> Result<Self> {
        let path = Self::index_path(dir);
        let bytes = std::fs::read(&path)
            .map_err(|e| WikiError::IndexLoad(format!("{}: {}", path.display(), e)))?;
        let persisted: PersistedIndex = serde_json::from_slice(&bytes)
            .map_err(|e| WikiError::IndexLoad(format!("{}: {}", path.display(), e)))?;

        if persisted.version != FORMAT_VERSION {
            return Err(WikiError::IndexLoad(format!(
                "format version {} (expected {})",
                persisted.version, FORMAT_VERSION
            )));
        }
        if persisted.model != expected_model {
            return Err(WikiError::IndexLoad(format!(
                "built with embedder '{}', configured '{}'",
                persisted.model, expected_model
            )));
        }
        let checksum = crc32fast::hash(&serde_json::to_vec(&persisted.chunks)?);
        if checksum != persisted.checksum {
            return Err(WikiError::IndexLoad("checksum mismatch".to_string()));
        }

        let mut store = Self::new(persisted.model);
        store.add(persisted.chunks);
        Ok(store)
    }

    /// Commit recorded beside the index, if any
    pub fn read_marker(dir: &Path) -> Option<String> {
        std::fs::read_to_string(Self::marker_path(dir))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chunk(path: &str, i: usize, embedding: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            document: Document::new(path, i, format!("{path} chunk {i}"), 3),
            embedding,
        }
    }

    #[test]
    fn test_delete_file() {
        let mut store = VectorStore::new("hash-2");
        store.add([
            chunk("a.rs", 0, vec![1.0, 0.0]),
            chunk("a.rs", 1, vec![1.0, 0.0]),
            chunk("b.rs", 0, vec![0.0, 1.0]),
        ]);
        assert_eq!(store.delete_file("a.rs"), 2);
        assert_eq!(store.delete_file("a.rs"), 0);
        assert_eq!(store.files().into_iter().collect::<Vec<_>>(), vec!["b.rs"]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mut store = VectorStore::new("hash-2");
        store.add([chunk("a.rs", 0, vec![0.5, 0.25])]);
        store.save(dir.path(), "abc123").unwrap();

        let loaded = VectorStore::load(dir.path(), "hash-2").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.chunks_for("a.rs")[0].embedding, vec![0.5, 0.25]);
        assert_eq!(VectorStore::read_marker(dir.path()).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_load_failures_are_index_load_errors() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            VectorStore::load(dir.path(), "hash-2"),
            Err(WikiError::IndexLoad(_))
        ));

        let mut store = VectorStore::new("hash-2");
        store.add([chunk("a.rs", 0, vec![1.0, 0.0])]);
        store.save(dir.path(), "c1").unwrap();
        assert!(matches!(
            VectorStore::load(dir.path(), "text-embedding-3-small"),
            Err(WikiError::IndexLoad(_))
        ));

        std::fs::write(VectorStore::index_path(dir.path()), b"{not json").unwrap();
        assert!(matches!(
            VectorStore::load(dir.path(), "hash-2"),
            Err(WikiError::IndexLoad(_))
        ));
    }

    #[test]
    fn test_tampered_chunks_fail_checksum() {
        let dir = TempDir::new().unwrap();
        let mut store = VectorStore::new("hash-2");
        store.add([chunk("a.rs", 0, vec![1.0, 0.0])]);
        store.save(dir.path(), "c1").unwrap();

        let path = VectorStore::index_path(dir.path());
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, text.replace("a.rs chunk 0", "a.rs chunk X")).unwrap();
        assert!(matches!(
            VectorStore::load(dir.path(), "hash-2"),
            Err(WikiError::IndexLoad(_))
        ));
    }

    #[test]
    fn test_missing_marker() {
        let dir = TempDir::new().unwrap();
        assert!(VectorStore::read_marker(dir.path()).is_none());
    }
}
