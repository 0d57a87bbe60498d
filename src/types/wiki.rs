//! Wiki structure model
//!
//! Produced by the structure stage, consumed by the page and index stages.
//! The JSON schema is what the structured-output extraction pass targets.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// One page of the generated wiki
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiPage {
    /// Path of the page inside the wiki directory, e.g. `/getting-started.md`
    pub path: String,
    pub title: String,
    /// What the page will cover
    pub description: String,
    #[serde(default)]
    pub relevant_files: Vec<String>,
    #[serde(default)]
    pub relevant_page_paths: Vec<String>,
}

/// Title plus ordered pages of a wiki
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WikiStructure {
    pub title: String,
    #[serde(default)]
    pub pages: Vec<WikiPage>,
}

impl WikiStructure {
    /// JSON schema for the structure extraction pass
    pub fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "description": "Structure of a documentation wiki for a repository",
            "required": ["title", "pages"],
            "additionalProperties": false,
            "properties": {
                "title": {"type": "string", "description": "Title of the wiki."},
                "pages": {
                    "type": "array",
                    "description": "List of wiki pages.",
                    "items": {
                        "type": "object",
                        "required": ["path", "title", "description", "relevant_files", "relevant_page_paths"],
                        "additionalProperties": false,
                        "properties": {
                            "path": {"type": "string", "description": "Path of the wiki page. e.g. /getting-started.md"},
                            "title": {"type": "string", "description": "Title of the wiki page."},
                            "description": {"type": "string", "description": "Brief description of what this page will cover."},
                            "relevant_files": {
                                "type": "array",
                                "description": "List of relevant files for this wiki page.",
                                "items": {"type": "string"}
                            },
                            "relevant_page_paths": {
                                "type": "array",
                                "description": "List of relevant wiki page paths.",
                                "items": {"type": "string"}
                            }
                        }
                    }
                }
            }
        })
    }

    /// Look up a page by its path
    pub fn page(&self, path: &str) -> Option<&WikiPage> {
        self.pages.iter().find(|p| p.path == path)
    }

    /// Render the pages related to `page` as markdown links, one per line
    pub fn related_links(&self, page: &WikiPage) -> String {
        page.relevant_page_paths
            .iter()
            .filter_map(|path| self.page(path))
            .map(|p| format!("- [{}]({})", p.title, p.path))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
