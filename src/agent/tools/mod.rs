//! Agent Tools
//!
//! Read-only queries the agent may run against the repository checkout, its
//! retrieval index and GitHub code search. Every tool is an implementation of
//! [`Tool`]; the agent dispatches by name through a [`ToolRegistry`] built
//! once when the agent is assembled.
//!
//! A tool failure never reaches the agent loop as an error: the registry logs
//! it and hands the model a short observation instead.

mod code_search;
mod list_files;
mod semantic_search;
mod view_file;

pub use code_search::{CodeSearchTool, render_code_search};
pub use list_files::ListFilesTool;
pub use semantic_search::{SemanticSearchTool, render_semantic_search};
pub use view_file::ViewFileTool;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::ai::{ToolCall, ToolSpec};
use crate::types::{Result, WikiError, normalize_path};

/// Capability the agent loop invokes uniformly
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object
    fn parameters(&self) -> Value;

    /// Run the tool and render its observation text
    async fn invoke(&self, args: &Value) -> Result<String>;

    /// Observation shown to the model when [`invoke`](Self::invoke) fails
    fn failure_observation(&self, _args: &Value) -> String {
        format!("Error occurred while running {}.", self.name())
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

pub type SharedTool = Arc<dyn Tool>;

/// Name → tool mapping
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, SharedTool>,
    order: Vec<String>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool; a later tool with the same name replaces the earlier one
    pub fn register(mut self, tool: impl Tool + 'static) -> Self {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Arc::new(tool)).is_none() {
            self.order.push(name);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&SharedTool> {
        self.tools.get(name)
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Specs in registration order
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.spec())
            .collect()
    }

    /// Run one requested call, always yielding observation text
    pub async fn execute(&self, call: &ToolCall) -> String {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!("Model requested unknown tool '{}'", call.name);
            return format!(
                "Unknown tool '{}'. Available tools: {}",
                call.name,
                self.order.join(", ")
            );
        };

        debug!("Tool call {}({})", call.name, call.arguments);
        match tool.invoke(&call.arguments).await {
            Ok(observation) => observation,
            Err(e) => {
                warn!("Tool {} failed: {}", call.name, e);
                tool.failure_observation(&call.arguments)
            }
        }
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Deserialize a tool's arguments object
pub(crate) fn parse_args<T: DeserializeOwned>(tool: &str, args: &Value) -> Result<T> {
    serde_json::from_value(args.clone())
        .map_err(|e| WikiError::tool(tool, format!("invalid arguments: {e}")))
}

/// Resolve a model-supplied path under `root`, refusing anything that would
/// escape it
pub(crate) fn resolve_under(tool: &str, root: &Path, path: &str) -> Result<PathBuf> {
    let relative = Path::new(normalize_path(path));
    if relative
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return Err(WikiError::tool(tool, format!("path escapes repository: {path}")));
    }
    Ok(root.join(relative))
}
