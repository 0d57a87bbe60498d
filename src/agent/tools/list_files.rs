use async_trait::async_trait;
use ignore::WalkBuilder;
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

use super::{Tool, parse_args, resolve_under};
use crate::constants::tools::LIST_FILES_LIMIT;
use crate::types::{Result, WikiError};

/// Recursive file listing under a directory of the checkout
#[derive(Debug, Clone)]
pub struct ListFilesTool {
    root: PathBuf,
    limit: usize,
}

#[derive(Deserialize)]
struct Args {
    #[serde(default)]
    dir_path: String,
}

impl ListFilesTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            limit: LIST_FILES_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Repository-relative paths under `dir`, `.git` excluded, sorted
    fn collect(&self, dir: &Path) -> Vec<String> {
        WalkBuilder::new(dir)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(|entry| entry.file_name() != ".git")
            .build()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_some_and(|t| t.is_file()))
            .filter_map(|e| {
                e.path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
            })
            .collect()
    }

    fn render(&self, files: &[String]) -> String {
        if files.is_empty() {
            return "No files found.".to_string();
        }
        let shown = files.len().min(self.limit);
        let mut lines: Vec<String> = files[..shown].to_vec();
        let more = files.len() - shown;
        if more > 0 {
            lines.push(format!("... and {more} more files"));
        }
        lines.join("\n")
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List all files in a directory of the repository, recursively. \
         Use it to get an overview of what a directory contains. \
         Pass \"/\" for the repository root."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "dir_path": {
                    "type": "string",
                    "description": "Directory path relative to the repository root."
                }
            },
            "required": ["dir_path"]
        })
    }

    async fn invoke(&self, args: &Value) -> Result<String> {
        let args: Args = parse_args(self.name(), args)?;
        let dir = resolve_under(self.name(), &self.root, &args.dir_path)?;
        if !dir.exists() {
            return Ok("No files found.".to_string());
        }

        let tool = self.clone();
        let files = tokio::task::spawn_blocking(move || tool.collect(&dir))
            .await
            .map_err(|e| WikiError::tool("list_files", e.to_string()))?;
        Ok(self.render(&files))
    }

    fn failure_observation(&self, _args: &Value) -> String {
        "Error occurred while listing files.".to_string()
    }
}
