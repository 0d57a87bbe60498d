//! Chat Model Abstraction
//!
//! Defines the [`ChatModel`] capability the agent loop drives: one call that
//! returns either final text or tool-call requests, and one call that returns
//! a value conforming to a JSON schema.
//!
//! Providers are selected by a `provider/model` string such as
//! `openai/gpt-4o`. OpenAI and OpenAI-compatible endpoints (including a local
//! Ollama server) share one binding.

mod openai;

pub use openai::OpenAiChatModel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::config::{LlmConfig, StageModelConfig};
use crate::types::{Result, WikiError};

// =============================================================================
// Conversation Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned id echoed back in the observation
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments
    pub arguments: Value,
}

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Set on `Role::Tool` observations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(Role::Assistant, content)
        }
    }

    /// Observation produced by executing `call_id`
    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::new(Role::Tool, content)
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Tool description advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: Value,
}

// =============================================================================
// Chat Model Trait
// =============================================================================

/// LLM worker capability used by the agent loop
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Produce the next assistant turn. With an empty `tools` slice the model
    /// cannot request tool calls.
    async fn invoke(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message>;

    /// Produce a value conforming to `schema` from the conversation
    async fn invoke_structured(&self, messages: &[Message], schema: &Value) -> Result<Value>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;
}

/// Shared chat model for concurrent page tasks
pub type SharedChatModel = Arc<dyn ChatModel>;

// =============================================================================
// Model Selection
// =============================================================================

/// `provider/model` pair parsed from a selector string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelector {
    pub provider: String,
    pub model: String,
}

impl std::str::FromStr for ModelSelector {
    type Err = WikiError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(WikiError::Config("Empty model selector".to_string()));
        }
        Ok(match s.split_once('/') {
            Some((provider, model)) if !provider.is_empty() && !model.is_empty() => Self {
                provider: provider.to_lowercase(),
                model: model.to_string(),
            },
            Some(_) => {
                return Err(WikiError::Config(format!("Invalid model selector: {s}")));
            }
            None => Self {
                provider: "openai".to_string(),
                model: s.to_string(),
            },
        })
    }
}

/// Create a chat model for one stage
///
/// `selector` wins over the stage's configured model, which wins over
/// `llm.default_model`.
pub fn create_chat_model(
    selector: Option<&str>,
    llm: &LlmConfig,
    stage: &StageModelConfig,
) -> Result<SharedChatModel> {
    let raw = selector
        .or(stage.model.as_deref())
        .unwrap_or(&llm.default_model);
    let selector: ModelSelector = raw.parse()?;

    match selector.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiChatModel::new(&selector.model, llm, stage)?)),
        "ollama" => Ok(Arc::new(OpenAiChatModel::ollama(&selector.model, llm, stage)?)),
        other => Err(WikiError::Config(format!(
            "Unknown provider: {}. Supported: openai, ollama",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_selector_parse() {
        let sel: ModelSelector = "openai/gpt-4o".parse().unwrap();
        assert_eq!(sel.provider, "openai");
        assert_eq!(sel.model, "gpt-4o");

        let sel: ModelSelector = "gpt-4o-mini".parse().unwrap();
        assert_eq!(sel.provider, "openai");

        let sel: ModelSelector = "ollama/qwen2.5-coder:7b".parse().unwrap();
        assert_eq!(sel.provider, "ollama");
        assert_eq!(sel.model, "qwen2.5-coder:7b");

        assert!("/gpt".parse::<ModelSelector>().is_err());
        assert!("".parse::<ModelSelector>().is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let result = create_chat_model(
            Some("acme/brain"),
            &LlmConfig::default(),
            &StageModelConfig::default(),
        );
        assert!(matches!(result, Err(WikiError::Config(_))));
    }

    #[test]
    fn test_message_constructors() {
        let call = ToolCall {
            id: "c1".into(),
            name: "list_files".into(),
            arguments: serde_json::json!({}),
        };
        let msg = Message::assistant_with_tools("", vec![call]);
        assert!(msg.has_tool_calls());
        let obs = Message::tool("c1", "ok");
        assert_eq!(obs.role, Role::Tool);
        assert_eq!(obs.tool_call_id.as_deref(), Some("c1"));
    }
}
