use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{Tool, parse_args};
use crate::constants::tools::CODE_SEARCH_MAX_RESULTS;
use crate::repo::{CodeSearchHit, GitHubClient};
use crate::types::{RepoId, Result};

/// Symbol lookup through GitHub code search
#[derive(Debug)]
pub struct CodeSearchTool {
    client: Arc<GitHubClient>,
    repo: RepoId,
}

#[derive(Deserialize)]
struct Args {
    symbol: String,
}

impl CodeSearchTool {
    pub fn new(client: Arc<GitHubClient>, repo: RepoId) -> Self {
        Self { client, repo }
    }
}

/// Render hits best score first, at most [`CODE_SEARCH_MAX_RESULTS`]
pub fn render_code_search(hits: &[CodeSearchHit]) -> String {
    let mut sorted: Vec<&CodeSearchHit> = hits.iter().collect();
    sorted.sort_by(|a, b| b.score.total_cmp(&a.score));
    sorted.truncate(CODE_SEARCH_MAX_RESULTS);

    let mut lines = vec![format!("Found {} results:", sorted.len())];
    for hit in sorted {
        lines.push(format!(">> File: {}", hit.path));
        lines.push(format!(">> Score: {}", hit.score));
        lines.push(">> Fragments:".to_string());
        for fragment in &hit.fragments {
            lines.push(format!("---\n{fragment}"));
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

#[async_trait]
impl Tool for CodeSearchTool {
    fn name(&self) -> &str {
        "code_index_search"
    }

    fn description(&self) -> &str {
        "Search the default branch of the repository for a specific symbol \
         (class, function or constant name) with GitHub code search. Returns \
         matching file paths with surrounding code fragments, most relevant first. \
         Useful for locating where a symbol is defined or used."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbol": {
                    "type": "string",
                    "description": "Exact symbol to search for."
                }
            },
            "required": ["symbol"]
        })
    }

    async fn invoke(&self, args: &Value) -> Result<String> {
        let args: Args = parse_args(self.name(), args)?;
        let hits = self.client.code_search(&self.repo, &args.symbol).await?;
        Ok(render_code_search(&hits))
    }

    fn failure_observation(&self, args: &Value) -> String {
        let symbol = args.get("symbol").and_then(Value::as_str).unwrap_or_default();
        format!("Error occurred while searching for symbol {symbol}.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitHubConfig;

    fn hit(path: &str, score: f64, fragments: &[&str]) -> CodeSearchHit {
        CodeSearchHit {
            path: path.into(),
            score,
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn test_render_sorted_by_score() {
        let out = render_code_search(&[
            hit("src/b.rs", 1.5, &["fn b()"]),
            hit("src/a.rs", 9.0, &["struct Parser", "impl Parser"]),
        ]);
        assert_eq!(
            out,
            "Found 2 results:\n\
             >> File: src/a.rs\n>> Score: 9\n>> Fragments:\n---\nstruct Parser\n---\nimpl Parser\n\n\
             >> File: src/b.rs\n>> Score: 1.5\n>> Fragments:\n---\nfn b()\n"
        );
    }

    #[test]
    fn test_render_caps_results() {
        let hits: Vec<_> = (0..15).map(|i| hit(&format!("f{i}.rs"), i as f64, &[])).collect();
        let out = render_code_search(&hits);
        assert!(out.starts_with("Found 10 results:"));
        assert!(out.contains(">> File: f14.rs"));
        assert!(!out.contains(">> File: f4.rs\n"));
    }

    #[tokio::test]
    async fn test_unreachable_api_is_observation() {
        let config = GitHubConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            token: None,
        };
        let client = Arc::new(GitHubClient::new(&config, None).unwrap());
        let tool = CodeSearchTool::new(client, RepoId::new("acme", "widgets"));
        let registry = super::super::ToolRegistry::new().register(tool);
        let observation = registry
            .execute(&crate::ai::ToolCall {
                id: "1".into(),
                name: "code_index_search".into(),
                arguments: json!({"symbol": "Parser"}),
            })
            .await;
        assert_eq!(observation, "Error occurred while searching for symbol Parser.");
    }
}
