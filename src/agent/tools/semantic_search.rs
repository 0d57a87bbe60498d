use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{Tool, parse_args};
use crate::index::{IndexRegistry, SearchHit};
use crate::repo::RepositorySnapshot;
use crate::types::Result;

/// Natural-language file retrieval over the repository index
pub struct SemanticSearchTool {
    repo: Arc<dyn RepositorySnapshot>,
    registry: Arc<IndexRegistry>,
}

impl std::fmt::Debug for SemanticSearchTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticSearchTool")
            .field("repo", &self.repo.key())
            .finish()
    }
}

#[derive(Deserialize)]
struct Args {
    query: String,
}

impl SemanticSearchTool {
    pub fn new(repo: Arc<dyn RepositorySnapshot>, registry: Arc<IndexRegistry>) -> Self {
        Self { repo, registry }
    }
}

pub fn render_semantic_search(hits: &[SearchHit]) -> String {
    let mut lines = vec![format!("Found {} related files:\n\n", hits.len())];
    for hit in hits {
        lines.push(format!("[{}]", hit.file_path));
        lines.push(format!("Preview: {}\n", hit.preview));
    }
    lines.join("\n")
}

#[async_trait]
impl Tool for SemanticSearchTool {
    fn name(&self) -> &str {
        "semantic_search_files"
    }

    fn description(&self) -> &str {
        "Retrieve files related to a natural language query. \
         For specific symbols (class, function or constant names) use \
         code_index_search instead."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Natural language description of what to find."
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, args: &Value) -> Result<String> {
        let args: Args = parse_args(self.name(), args)?;
        let handle = self.registry.acquire(self.repo.as_ref()).await?;
        let hits = handle.query(&args.query).await?;
        Ok(render_semantic_search(&hits))
    }

    fn failure_observation(&self, _args: &Value) -> String {
        "Error occurred during semantic search.".to_string()
    }
}
