//! OpenAI Chat Completions binding
//!
//! Tool calling uses the `tools` / `tool_calls` fields; structured output uses
//! `response_format: json_schema`. Works against any OpenAI-compatible
//! endpoint, which is how local Ollama models are reached.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{ChatModel, Message, Role, ToolCall, ToolSpec};
use crate::config::{LlmConfig, StageModelConfig};
use crate::constants::network;
use crate::types::{ErrorClassifier, Result, WikiError};

const OLLAMA_API_BASE: &str = "http://localhost:11434/v1";

/// OpenAI-compatible chat model with secure API key handling
pub struct OpenAiChatModel {
    provider: &'static str,
    /// Never exposed in logs or debug output
    api_key: Option<SecretString>,
    api_base: String,
    model: String,
    temperature: f32,
    top_p: Option<f32>,
    max_tokens: Option<usize>,
    max_retries: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatModel")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl OpenAiChatModel {
    pub fn new(model: &str, llm: &LlmConfig, stage: &StageModelConfig) -> Result<Self> {
        let api_key = llm
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                WikiError::Config(
                    "OpenAI API key not found. Set OPENAI_API_KEY env var or llm.api_key"
                        .to_string(),
                )
            })?;
        let api_base = llm
            .api_base
            .clone()
            .unwrap_or_else(|| network::DEFAULT_OPENAI_API_BASE.to_string());
        Self::build("openai", Some(api_key), api_base, model, llm, stage)
    }

    /// Local Ollama server through its OpenAI-compatible API
    pub fn ollama(model: &str, llm: &LlmConfig, stage: &StageModelConfig) -> Result<Self> {
        let api_base = llm
            .api_base
            .clone()
            .unwrap_or_else(|| OLLAMA_API_BASE.to_string());
        Self::build("ollama", llm.api_key.clone(), api_base, model, llm, stage)
    }

    fn build(
        provider: &'static str,
        api_key: Option<String>,
        api_base: String,
        model: &str,
        llm: &LlmConfig,
        stage: &StageModelConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(llm.timeout_secs))
            .build()
            .map_err(|e| WikiError::LlmApi(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            provider,
            api_key: api_key.map(SecretString::from),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature: stage.temperature,
            top_p: stage.top_p,
            max_tokens: llm.max_tokens,
            max_retries: llm.max_retries,
            client,
        })
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        response_format: Option<ResponseFormat>,
    ) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages.iter().map(WireMessage::from).collect(),
            tools: tools
                .iter()
                .map(|t| WireTool {
                    tool_type: "function",
                    function: WireFunctionSpec {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.parameters.clone(),
                    },
                })
                .collect(),
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            response_format,
        }
    }

    /// Send once, classifying failures so the retry policy can decide
    async fn send_once(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let url = format!("{}/chat/completions", self.api_base);
        let mut builder = self.client.post(&url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| WikiError::Llm(ErrorClassifier::classify_transport(&e, self.provider)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WikiError::Llm(ErrorClassifier::classify_http_status(
                status.as_u16(),
                &body,
                self.provider,
            )));
        }

        response
            .json()
            .await
            .map_err(|e| WikiError::LlmApi(format!("Failed to parse {} response: {}", self.provider, e)))
    }

    async fn send(&self, request: &ChatCompletionRequest) -> Result<ResponseMessage> {
        let start = Instant::now();
        let policy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(network::BASE_DELAY_MS))
            .with_max_delay(Duration::from_secs(network::MAX_DELAY_SECS))
            .with_max_times(self.max_retries)
            .with_jitter();

        let response = (|| self.send_once(request))
            .retry(policy)
            .when(|e: &WikiError| e.is_retryable())
            // A provider-supplied wait never shortens the backoff
            .adjust(|e: &WikiError, delay: Option<Duration>| delay.map(|d| e.retry_after().map_or(d, |r| r.max(d))))
            .notify(|e: &WikiError, delay: Duration| {
                warn!("{} request failed, retrying in {:?}: {}", self.provider, delay, e);
            })
            .await?;

        if let Some(usage) = &response.usage {
            debug!(
                provider = self.provider,
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "chat completion"
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| WikiError::LlmApi(format!("No choices in {} response", self.provider)))
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn invoke(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message> {
        let request = self.build_request(messages, tools, None);
        let reply = self.send(&request).await?;

        let tool_calls = reply
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                // Malformed argument JSON is handed to the tool as a raw string
                let arguments = serde_json::from_str(&call.function.arguments)
                    .unwrap_or(Value::String(call.function.arguments));
                ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments,
                }
            })
            .collect();

        Ok(Message::assistant_with_tools(
            reply.content.unwrap_or_default(),
            tool_calls,
        ))
    }

    async fn invoke_structured(&self, messages: &[Message], schema: &Value) -> Result<Value> {
        let format = ResponseFormat {
            format_type: "json_schema",
            json_schema: Some(JsonSchemaFormat {
                name: "structured_response".to_string(),
                schema: schema.clone(),
                strict: false,
            }),
        };
        let request = self.build_request(messages, &[], Some(format));
        let reply = self.send(&request).await?;

        let content = reply
            .content
            .ok_or_else(|| WikiError::LlmApi("No content in structured response".to_string()))?;
        parse_json_content(&content)
    }

    fn name(&self) -> &str {
        self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Parse JSON content, tolerating a surrounding markdown code fence
fn parse_json_content(content: &str) -> Result<Value> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    Ok(serde_json::from_str(body.trim())?)
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: Role,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
            tool_calls: msg
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    call_type: "function".to_string(),
                    function: WireFunctionCall {
                        name: call.name.clone(),
                        arguments: match &call.arguments {
                            Value::String(raw) => raw.clone(),
                            other => other.to_string(),
                        },
                    },
                })
                .collect(),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: WireFunctionSpec,
}

#[derive(Debug, Serialize)]
struct WireFunctionSpec {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default)]
    call_type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    json_schema: Option<JsonSchemaFormat>,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: String,
    schema: Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> OpenAiChatModel {
        let llm = LlmConfig {
            api_key: Some("sk-test".into()),
            ..Default::default()
        };
        OpenAiChatModel::new("gpt-4o", &llm, &StageModelConfig::default()).unwrap()
    }

    #[test]
    fn test_request_serializes_tool_turns() {
        let model = model();
        let messages = vec![
            Message::system("sys"),
            Message::assistant_with_tools(
                "",
                vec![ToolCall {
                    id: "call_1".into(),
                    name: "list_files".into(),
                    arguments: json!({"dir_path": "src"}),
                }],
            ),
            Message::tool("call_1", "src/main.rs"),
        ];
        let tools = vec![ToolSpec {
            name: "list_files".into(),
            description: "List files".into(),
            parameters: json!({"type": "object"}),
        }];
        let request = serde_json::to_value(model.build_request(&messages, &tools, None)).unwrap();

        assert_eq!(request["messages"][1]["role"], "assistant");
        assert_eq!(
            request["messages"][1]["tool_calls"][0]["function"]["arguments"],
            r#"{"dir_path":"src"}"#
        );
        assert_eq!(request["messages"][2]["tool_call_id"], "call_1");
        assert_eq!(request["tools"][0]["type"], "function");
        assert!(request.get("response_format").is_none());
    }

    #[test]
    fn test_request_without_tools_omits_field() {
        let request =
            serde_json::to_value(model().build_request(&[Message::user("hi")], &[], None)).unwrap();
        assert!(request.get("tools").is_none());
    }

    #[test]
    fn test_debug_redacts_key() {
        assert!(!format!("{:?}", model()).contains("sk-test"));
    }

    #[test]
    fn test_parse_json_content_strips_fence() {
        let value = parse_json_content("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(value["a"], 1);
        assert!(parse_json_content("not json").is_err());
    }

    #[test]
    fn test_response_with_tool_calls_deserializes() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "view_file_content", "arguments": "{\"file_path\":\"a.rs\"}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2}
        });
        let parsed: ChatCompletionResponse = serde_json::from_value(body).unwrap();
        let calls = parsed.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "view_file_content");
    }
}
