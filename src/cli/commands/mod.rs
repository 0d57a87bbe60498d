//! Command handlers
//!
//! Each handler is synchronous and owns its tokio runtime, so `main` stays
//! a plain dispatcher.

pub mod config;
pub mod generate;
pub mod index;
pub mod search;

use secrecy::SecretString;
use std::path::Path;
use std::sync::Arc;

use crate::ai::create_embedder;
use crate::config::{Settings, SettingsLoader};
use crate::index::IndexRegistry;
use crate::repo::GitRepository;
use crate::types::{RepoId, Result};

/// Settings from an explicit file, or the full resolution chain
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => SettingsLoader::load_from_file(path),
        None => SettingsLoader::load(),
    }
}

/// Checkout handle plus the index registry for one repository
pub(crate) fn open_repository(
    repo: &str,
    pat: Option<String>,
    settings: &Settings,
) -> Result<(Arc<GitRepository>, IndexRegistry)> {
    let id: RepoId = repo.parse()?;
    let pat = pat.map(SecretString::from);
    let repository = GitRepository::new(id, pat, &settings.paths, &settings.git);
    let embedder = create_embedder(&settings.embedder, &settings.llm)?;
    let registry = IndexRegistry::new(
        settings.paths.index_dir.clone(),
        settings.index.clone(),
        embedder,
    );
    Ok((Arc::new(repository), registry))
}
