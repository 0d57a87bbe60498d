use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::info;

use super::{Tool, parse_args, resolve_under};
use crate::constants::tools::LINES_PER_PAGE;
use crate::types::Result;

/// Paged, line-numbered file viewer
#[derive(Debug, Clone)]
pub struct ViewFileTool {
    root: PathBuf,
    lines_per_page: usize,
}

#[derive(Deserialize)]
struct Args {
    file_path: String,
    #[serde(default)]
    page: usize,
}

impl ViewFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lines_per_page: LINES_PER_PAGE,
        }
    }

    pub fn with_lines_per_page(mut self, lines_per_page: usize) -> Self {
        self.lines_per_page = lines_per_page.max(1);
        self
    }

    fn render(&self, content: &str, page: usize) -> String {
        let lines: Vec<&str> = content.lines().collect();
        let start = page.saturating_mul(self.lines_per_page);
        let end = start.saturating_add(self.lines_per_page);
        let has_more = lines.len() > end;

        let mut out = format!(">> Page: {page}\n");
        if has_more {
            let _ = writeln!(out, ">> Next Page: {}", page + 1);
        } else {
            out.push_str(">> Next Page: [END]\n");
        }

        let body: Vec<String> = lines
            .iter()
            .enumerate()
            .skip(start)
            .take(self.lines_per_page)
            .map(|(i, line)| format!("{:4} | {}", i + 1, line.trim_end()))
            .collect();
        if body.is_empty() {
            out.push_str("[EMPTY_FILE]");
        } else {
            out.push_str(&body.join("\n"));
        }
        out
    }
}

#[async_trait]
impl Tool for ViewFileTool {
    fn name(&self) -> &str {
        "view_file_content"
    }

    fn description(&self) -> &str {
        "Read the content of a file in the repository. Output is line-numbered \
         and paged; request the next page number to keep reading."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "The path to the file in the repository."
                },
                "page": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "The page number to view. Default is 0."
                }
            },
            "required": ["file_path"]
        })
    }

    async fn invoke(&self, args: &Value) -> Result<String> {
        let args: Args = parse_args(self.name(), args)?;
        let path = resolve_under(self.name(), &self.root, &args.file_path)?;
        if !path.is_file() {
            info!("File {} not found", args.file_path);
            return Ok(format!("File {} not found.", args.file_path));
        }

        let bytes = tokio::fs::read(&path).await?;
        let content = String::from_utf8_lossy(&bytes);
        Ok(self.render(&content, args.page))
    }

    fn failure_observation(&self, _args: &Value) -> String {
        "Error occurred while reading the file.".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture(lines: usize) -> (TempDir, ViewFileTool) {
        let dir = TempDir::new().unwrap();
        let content: String = (1..=lines).map(|i| format!("line {i}  \n")).collect();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/app.rs"), content).unwrap();
        let tool = ViewFileTool::new(dir.path());
        (dir, tool)
    }

    #[tokio::test]
    async fn test_first_page_numbering() {
        let (_dir, tool) = fixture(150);
        let out = tool.invoke(&json!({"file_path": "src/app.rs"})).await.unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], ">> Page: 0");
        assert_eq!(lines[1], ">> Next Page: 1");
        assert_eq!(lines[2], "   1 | line 1");
        assert_eq!(lines.len(), 2 + 100);
    }

    #[tokio::test]
    async fn test_last_page_ends() {
        let (_dir, tool) = fixture(150);
        let out = tool
            .invoke(&json!({"file_path": "/src/app.rs", "page": 1}))
            .await
            .unwrap();
        assert!(out.starts_with(">> Page: 1\n>> Next Page: [END]\n 101 | line 101"));
        assert!(out.ends_with(" 150 | line 150"));
    }

    #[tokio::test]
    async fn test_empty_and_past_end() {
        let (dir, tool) = fixture(3);
        std::fs::write(dir.path().join("empty.txt"), "").unwrap();
        let out = tool.invoke(&json!({"file_path": "empty.txt"})).await.unwrap();
        assert_eq!(out, ">> Page: 0\n>> Next Page: [END]\n[EMPTY_FILE]");

        let out = tool.invoke(&json!({"file_path": "src/app.rs", "page": 5})).await.unwrap();
        assert!(out.ends_with("[EMPTY_FILE]"));
    }

    #[tokio::test]
    async fn test_missing_file_and_escape() {
        let (_dir, tool) = fixture(1);
        let out = tool.invoke(&json!({"file_path": "nope.rs"})).await.unwrap();
        assert_eq!(out, "File nope.rs not found.");
        assert!(tool.invoke(&json!({"file_path": "../secret"})).await.is_err());
    }

    #[test]
    fn test_custom_page_size() {
        let tool = ViewFileTool::new("/unused").with_lines_per_page(2);
        assert_eq!(
            tool.render("a\nb\nc", 0),
            ">> Page: 0\n>> Next Page: 1\n   1 | a\n   2 | b"
        );
    }
}
