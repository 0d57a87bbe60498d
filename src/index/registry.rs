//! Process-wide index cache
//!
//! One slot per repository key, each guarded by its own async mutex: the
//! first caller for a key loads or builds the index while later callers for
//! the same key wait on that slot, and callers for other keys proceed
//! independently. A ready handle stays cached for the registry's lifetime.

use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use super::{IndexHandle, VectorStore};
use crate::ai::SharedEmbedder;
use crate::config::IndexConfig;
use crate::repo::RepositorySnapshot;
use crate::types::Result;

type Slot = Arc<Mutex<Option<Arc<IndexHandle>>>>;

pub struct IndexRegistry {
    index_dir: PathBuf,
    config: IndexConfig,
    embedder: SharedEmbedder,
    slots: DashMap<String, Slot>,
}

impl std::fmt::Debug for IndexRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexRegistry")
            .field("index_dir", &self.index_dir)
            .field("embedder", &self.embedder.model_name())
            .field("cached", &self.slots.len())
            .finish()
    }
}

impl IndexRegistry {
    pub fn new(index_dir: impl Into<PathBuf>, config: IndexConfig, embedder: SharedEmbedder) -> Self {
        Self {
            index_dir: index_dir.into(),
            config,
            embedder,
            slots: DashMap::new(),
        }
    }

    /// `{index_dir}/{owner}/{name}`
    pub fn index_dir_for(&self, key: &str) -> PathBuf {
        key.split('/')
            .fold(self.index_dir.clone(), |dir, part| dir.join(part))
    }

    /// Ready handle for `repo`, loading or building it on first use
    #[instrument(skip(self, repo), fields(repo = %repo.key()))]
    pub async fn acquire(&self, repo: &dyn RepositorySnapshot) -> Result<Arc<IndexHandle>> {
        let key = repo.key();
        // Clone the slot out so the map shard is not held across the await
        let slot: Slot = self.slots.entry(key).or_default().value().clone();

        let mut guard = slot.lock().await;
        if let Some(handle) = guard.as_ref() {
            return Ok(Arc::clone(handle));
        }

        let handle = Arc::new(self.open(repo).await?);
        *guard = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Load and synchronize the persisted index, or build a fresh one
    async fn open(&self, repo: &dyn RepositorySnapshot) -> Result<IndexHandle> {
        let dir = self.index_dir_for(&repo.key());
        match VectorStore::load(&dir, self.embedder.model_name()) {
            Ok(store) => {
                info!("Loaded index for {} ({} chunks)", repo.key(), store.len());
                let handle = IndexHandle::new(repo, dir, store, Arc::clone(&self.embedder), &self.config);
                handle.synchronize(repo).await?;
                Ok(handle)
            }
            Err(e) => {
                warn!("{}; building a fresh index for {}", e, repo.key());
                let store = VectorStore::new(self.embedder.model_name());
                let handle = IndexHandle::new(repo, dir, store, Arc::clone(&self.embedder), &self.config);
                handle.build(repo).await?;
                Ok(handle)
            }
        }
    }

    /// Number of repositories with a ready handle
    pub fn cached(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.value().try_lock().map(|g| g.is_some()).unwrap_or(false))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{Embedder, HashEmbedder};
    use crate::repo::testing::FakeSnapshot;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Hash embedder that counts calls and yields to the scheduler
    struct CountingEmbedder {
        inner: HashEmbedder,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.inner.embed_documents(texts).await
        }

        fn model_name(&self) -> &str {
            self.inner.model_name()
        }

        fn dims(&self) -> usize {
            self.inner.dims()
        }
    }

    fn tree() -> BTreeMap<String, String> {
        (0..10)
            .map(|i| (format!("src/f{i}.rs"), format!("fn f{i}() {{}}")))
            .collect()
    }

    #[tokio::test]
    async fn test_concurrent_acquire_builds_once() {
        let work = TempDir::new().unwrap();
        let index = TempDir::new().unwrap();
        let repo = FakeSnapshot::new("acme/widgets", work.path());
        repo.commit("c1", tree());

        let embedder = Arc::new(CountingEmbedder {
            inner: HashEmbedder::new(16),
            calls: AtomicUsize::new(0),
        });
        let registry = IndexRegistry::new(index.path(), IndexConfig::default(), embedder.clone());

        let handles = futures::future::join_all((0..5).map(|_| registry.acquire(&repo))).await;
        let handles: Vec<_> = handles.into_iter().map(|h| h.unwrap()).collect();
        for handle in &handles[1..] {
            assert!(Arc::ptr_eq(&handles[0], handle));
        }
        // one embedding call per file, from a single build
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 10);
        assert_eq!(registry.cached(), 1);
    }

    #[tokio::test]
    async fn test_acquire_loads_persisted_index() {
        let work = TempDir::new().unwrap();
        let index = TempDir::new().unwrap();
        let repo = FakeSnapshot::new("acme/widgets", work.path());
        repo.commit("c1", tree());

        let first = IndexRegistry::new(index.path(), IndexConfig::default(), Arc::new(HashEmbedder::new(16)));
        first.acquire(&repo).await.unwrap();
        assert!(index.path().join("acme/widgets/index.json").exists());
        assert_eq!(
            std::fs::read_to_string(index.path().join("acme/widgets/commit_hash")).unwrap(),
            "c1"
        );

        // a new process sees the persisted index at the same commit
        let second = IndexRegistry::new(index.path(), IndexConfig::default(), Arc::new(HashEmbedder::new(16)));
        let handle = second.acquire(&repo).await.unwrap();
        let report = handle.last_report().unwrap();
        assert!(report.is_noop());
        assert_eq!(handle.len().await, 10);
    }

    #[tokio::test]
    async fn test_corrupt_index_rebuilds() {
        let work = TempDir::new().unwrap();
        let index = TempDir::new().unwrap();
        let repo = FakeSnapshot::new("acme/widgets", work.path());
        repo.commit("c1", tree());

        let dir = index.path().join("acme/widgets");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.json"), "garbage").unwrap();
        std::fs::write(dir.join("commit_hash"), "c1").unwrap();

        let registry = IndexRegistry::new(index.path(), IndexConfig::default(), Arc::new(HashEmbedder::new(16)));
        let handle = registry.acquire(&repo).await.unwrap();
        assert!(handle.last_report().unwrap().full_rebuild);
        assert_eq!(handle.indexed_files().await.len(), 10);
    }

    #[tokio::test]
    async fn test_different_repositories_get_different_handles() {
        let work_a = TempDir::new().unwrap();
        let work_b = TempDir::new().unwrap();
        let index = TempDir::new().unwrap();
        let a = FakeSnapshot::new("acme/a", work_a.path());
        let b = FakeSnapshot::new("acme/b", work_b.path());
        a.commit("c1", tree());
        b.commit("c1", tree());

        let registry = IndexRegistry::new(index.path(), IndexConfig::default(), Arc::new(HashEmbedder::new(16)));
        let (ha, hb) = tokio::join!(registry.acquire(&a), registry.acquire(&b));
        assert!(!Arc::ptr_eq(&ha.unwrap(), &hb.unwrap()));
        assert_eq!(registry.index_dir_for("acme/a"), index.path().join("acme").join("a"));
    }
}
