//! Search Command
//!
//! Query a repository's retrieval index the way the agent's semantic search
//! tool does.
//!
//! Usage:
//!   repowiki search acme/widgets "how are plugins loaded" [-f json]

use tokio::runtime::Runtime;
use tracing::info;

use super::open_repository;
use crate::cli::ui::Output;
use crate::config::Settings;
use crate::index::SearchHit;
use crate::types::Result;

/// Hits as a JSON array of `{file_path, preview}`
pub fn hits_json(hits: &[SearchHit]) -> serde_json::Value {
    serde_json::Value::Array(
        hits.iter()
            .map(|hit| serde_json::json!({"file_path": hit.file_path, "preview": hit.preview}))
            .collect(),
    )
}

pub fn run(repo: &str, query: &str, pat: Option<String>, format: &str, settings: &Settings) -> Result<Vec<SearchHit>> {
    let (repository, registry) = open_repository(repo, pat, settings)?;

    let hits = Runtime::new()?.block_on(async {
        if !repository.is_cloned() {
            info!("No checkout for {}, downloading", repository.id());
            repository.download(None, &[]).await?;
        }
        let handle = registry.acquire(&*repository).await?;
        handle.query(query).await
    })?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&hits_json(&hits))?);
    } else {
        let output = Output::new();
        output.header(&format!("{} results for \"{}\"", hits.len(), query));
        output.search_hits(&hits);
    }
    Ok(hits)
}
