//! Incremental retrieval index
//!
//! Keeps a semantic index of a repository's files consistent with the
//! checkout's current commit.
//!
//! ## Lifecycle
//!
//! 1. [`IndexRegistry::acquire`] loads the persisted index for a repository,
//!    or builds one from a full scan when loading fails, at most once per
//!    repository per process
//! 2. [`IndexHandle::synchronize`] compares the recorded commit with the
//!    checkout and applies only the file-level diff
//! 3. [`IndexHandle::query`] runs a diversity-aware (MMR) search
//!
//! Per-file failures while indexing are logged and skipped; a persisted index
//! that cannot be read is rebuilt rather than reported.

mod chunker;
mod loader;
mod mmr;
mod registry;
mod store;

pub use chunker::{Language, RecursiveChunker};
pub use loader::{Document, DocumentLoader};
pub use mmr::{cosine_similarity, maximal_marginal_relevance};
pub use registry::IndexRegistry;
pub use store::{IndexedChunk, VectorStore};

use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::ai::SharedEmbedder;
use crate::config::IndexConfig;
use crate::constants::index::PREVIEW_CHARS;
use crate::repo::RepositorySnapshot;
use crate::types::{Result, WikiError, truncate_chars};

/// Files embedded concurrently during a full build
const BUILD_CONCURRENCY: usize = 4;

const TRUNCATED_SUFFIX: &str = "...[truncated]";

/// What a build or synchronize did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Commit the index was at; `None` for a full build
    pub from: Option<String>,
    pub to: String,
    pub full_rebuild: bool,
    /// Diff entries processed
    pub entries: usize,
    pub files_indexed: usize,
    pub chunks_added: usize,
    pub chunks_removed: usize,
    /// Files skipped because they failed to load or embed
    pub failures: usize,
    pub persisted: bool,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        !self.full_rebuild && self.entries == 0
    }
}

/// One retrieval result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub file_path: String,
    /// Leading characters of the file
    pub preview: String,
}

/// Ready-to-query index of one repository
pub struct IndexHandle {
    key: String,
    dir: PathBuf,
    root: PathBuf,
    store: RwLock<VectorStore>,
    sync_lock: Mutex<()>,
    embedder: SharedEmbedder,
    loader: DocumentLoader,
    k: usize,
    fetch_k: usize,
    lambda: f32,
    last_report: StdMutex<Option<SyncReport>>,
}

impl std::fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexHandle")
            .field("key", &self.key)
            .field("dir", &self.dir)
            .field("root", &self.root)
            .finish()
    }
}

impl IndexHandle {
    pub fn new(
        repo: &dyn RepositorySnapshot,
        dir: PathBuf,
        store: VectorStore,
        embedder: SharedEmbedder,
        config: &IndexConfig,
    ) -> Self {
        Self {
            key: repo.key(),
            dir,
            root: repo.root().to_path_buf(),
            store: RwLock::new(store),
            sync_lock: Mutex::new(()),
            embedder,
            loader: DocumentLoader::new(config),
            k: config.k,
            fetch_k: config.fetch_k,
            lambda: config.lambda,
            last_report: StdMutex::new(None),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Directory holding the persisted index and commit marker
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    pub async fn indexed_files(&self) -> BTreeSet<String> {
        self.store.read().await.files()
    }

    /// Chunk texts of one file in order
    pub async fn chunk_texts(&self, path: &str) -> Vec<String> {
        self.store
            .read()
            .await
            .chunks_for(path)
            .into_iter()
            .map(|c| c.document.text.clone())
            .collect()
    }

    /// Commit recorded beside the persisted index
    pub fn recorded_commit(&self) -> Option<String> {
        VectorStore::read_marker(&self.dir)
    }

    /// Report of the most recent build or synchronize
    pub fn last_report(&self) -> Option<SyncReport> {
        self.last_report.lock().ok().and_then(|r| r.clone())
    }

    fn record(&self, report: &SyncReport) {
        if let Ok(mut last) = self.last_report.lock() {
            *last = Some(report.clone());
        }
    }

    // =========================================================================
    // Indexing
    // =========================================================================

    /// Load, chunk and embed one file without touching the store
    async fn prepare_file(&self, repo: &dyn RepositorySnapshot, path: &str) -> Result<Vec<IndexedChunk>> {
        let content = repo
            .read_file(path)
            .await
            .map_err(|e| WikiError::index_sync(path, e))?;
        let documents = self.loader.load(path, &content)?;
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed_documents(&texts)
            .await
            .map_err(|e| WikiError::index_sync(path, e))?;
        if embeddings.len() != documents.len() {
            return Err(WikiError::index_sync(
                path,
                format!("{} embeddings for {} chunks", embeddings.len(), documents.len()),
            ));
        }
        Ok(documents
            .into_iter()
            .zip(embeddings)
            .map(|(document, embedding)| IndexedChunk { document, embedding })
            .collect())
    }

    fn persist(&self, store: &VectorStore, commit: &str) -> Result<()> {
        store.save(&self.dir, commit)?;
        debug!("Persisted index for {} at {}", self.key, commit);
        Ok(())
    }

    /// Replace the contents with a full scan of the checkout and persist
    #[instrument(skip(self, repo), fields(repo = %self.key))]
    pub async fn build(&self, repo: &dyn RepositorySnapshot) -> Result<SyncReport> {
        let _guard = self.sync_lock.lock().await;
        let commit = repo.current_commit().await?;
        self.rebuild_locked(repo, None, commit).await
    }

    async fn rebuild_locked(
        &self,
        repo: &dyn RepositorySnapshot,
        from: Option<String>,
        commit: String,
    ) -> Result<SyncReport> {
        info!("Building index for {} at {}", self.key, commit);
        let paths = self.loader.scan(repo.root());
        let mut report = SyncReport {
            from,
            to: commit,
            full_rebuild: true,
            ..Default::default()
        };

        let mut prepared = stream::iter(paths)
            .map(|path: String| async move {
                let result = self.prepare_file(repo, &path).await;
                (path, result)
            })
            .buffer_unordered(BUILD_CONCURRENCY);

        let mut fresh = VectorStore::new(self.embedder.model_name());
        while let Some((path, result)) = prepared.next().await {
            match result {
                Ok(chunks) if chunks.is_empty() => {}
                Ok(chunks) => {
                    report.chunks_added += fresh.add(chunks);
                    report.files_indexed += 1;
                }
                Err(e) => {
                    warn!("Skipping {}: {}", path, e);
                    report.failures += 1;
                }
            }
        }

        if report.failures > 0 && report.files_indexed == 0 {
            return Err(WikiError::index_sync(
                self.key.as_str(),
                format!("all {} files failed to index", report.failures),
            ));
        }

        self.persist(&fresh, &report.to)?;
        report.persisted = true;
        *self.store.write().await = fresh;

        info!(
            "Indexed {} files ({} chunks) for {}",
            report.files_indexed, report.chunks_added, self.key
        );
        self.record(&report);
        Ok(report)
    }

    /// Bring the index to the checkout's current commit
    ///
    /// Same commit: nothing happens and nothing is written. Otherwise each
    /// diff entry removes the file's old chunks and/or indexes its current
    /// content; a failing file is logged and skipped. The index and marker
    /// are persisted only when at least one entry was processed. A missing
    /// marker or a failed diff means the contents cannot be trusted and a
    /// full rebuild runs instead.
    #[instrument(skip(self, repo), fields(repo = %self.key))]
    pub async fn synchronize(&self, repo: &dyn RepositorySnapshot) -> Result<SyncReport> {
        let _guard = self.sync_lock.lock().await;
        let current = repo.current_commit().await?;

        let recorded = match self.recorded_commit() {
            Some(commit) => commit,
            None => {
                warn!("No commit marker for {}, rebuilding", self.key);
                return self.rebuild_locked(repo, None, current).await;
            }
        };
        if recorded == current {
            debug!("Index for {} is at {}", self.key, current);
            let report = SyncReport {
                from: Some(recorded),
                to: current,
                ..Default::default()
            };
            self.record(&report);
            return Ok(report);
        }

        info!("Commit changed for {}: {} -> {}", self.key, recorded, current);
        let entries = match repo.diff(&recorded, &current).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Diff {}..{} failed, rebuilding: {}", recorded, current, e);
                return self.rebuild_locked(repo, Some(recorded), current).await;
            }
        };

        let mut report = SyncReport {
            from: Some(recorded),
            to: current,
            ..Default::default()
        };
        for entry in &entries {
            report.entries += 1;
            if entry.kind.removes() {
                let removed = self.store.write().await.delete_file(&entry.path);
                if removed > 0 {
                    debug!("Removed {} chunks of {}", removed, entry.path);
                }
                report.chunks_removed += removed;
            }
            if entry.kind.adds() && self.loader.accepts(&entry.path) {
                match self.prepare_file(repo, &entry.path).await {
                    Ok(chunks) if chunks.is_empty() => {}
                    Ok(chunks) => {
                        let added = self.store.write().await.add(chunks);
                        debug!("Added {} ({} chunks)", entry.path, added);
                        report.chunks_added += added;
                        report.files_indexed += 1;
                    }
                    Err(e) => {
                        warn!("Skipping {}: {}", entry.path, e);
                        report.failures += 1;
                    }
                }
            }
        }

        if report.entries > 0 {
            let store = self.store.read().await;
            self.persist(&store, &report.to)?;
            report.persisted = true;
        }
        self.record(&report);
        Ok(report)
    }

    // =========================================================================
    // Retrieval
    // =========================================================================

    /// Files related to `query`, most relevant first, one hit per file
    ///
    /// Each hit previews the first characters of the file as it is in the
    /// checkout; files that can no longer be read are left out.
    pub async fn query(&self, query: &str) -> Result<Vec<SearchHit>> {
        let vector = self.embedder.embed_query(query).await?;
        let paths: Vec<String> = {
            let store = self.store.read().await;
            let mut seen = BTreeSet::new();
            store
                .search_mmr(&vector, self.k, self.fetch_k, self.lambda)
                .into_iter()
                .map(|c| c.document.file_path.clone())
                .filter(|p| seen.insert(p.clone()))
                .collect()
        };

        let mut hits = Vec::with_capacity(paths.len());
        for file_path in paths {
            match tokio::fs::read(self.root.join(&file_path)).await {
                Ok(bytes) if !bytes.is_empty() => {
                    let text = String::from_utf8_lossy(&bytes);
                    hits.push(SearchHit {
                        preview: truncate_chars(&text, PREVIEW_CHARS, TRUNCATED_SUFFIX),
                        file_path,
                    });
                }
                Ok(_) => {}
                Err(e) => warn!("Error reading {} for preview: {}", file_path, e),
            }
        }
        Ok(hits)
    }
}
