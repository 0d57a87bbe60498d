//! Bounded tool-calling agent
//!
//! A ReAct-style state machine driving a [`ChatModel`] through rounds of
//! "reason → call tools → observe" until it answers.
//!
//! ## Phases
//!
//! ```text
//!              no tool calls                        schema?
//! Reasoning ───────────────────────────────────────┬──────► StructuredExtraction ─► Done
//!   │  ▲                                            │ no
//!   │  │ observations, steps_taken += 1             └──────► Done
//!   │  │                                            ▲
//!   ▼  │ tool calls, steps_taken < step_limit       │
//! ToolExecution                                     │
//!   tool calls, steps_taken ≥ step_limit            │
//! Reasoning ──────────────► ForcedFinalAnswer ──────┘
//! ```
//!
//! ## Bounds
//!
//! - At most `step_limit` tool rounds, so a model that always asks for tools
//!   is invoked at most `step_limit + 2` times before the answer (plus one
//!   structured extraction when a schema is set)
//! - Every phase visit counts against `recursion_limit`; exceeding it aborts
//!   the run with [`WikiError::RecursionLimit`]
//! - A failing tool becomes an observation and never aborts the round

pub mod tools;

pub use tools::{
    CodeSearchTool, ListFilesTool, SemanticSearchTool, SharedTool, Tool, ToolRegistry,
    ViewFileTool,
};

use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::ai::{Message, SharedChatModel, ToolSpec};
use crate::config::AgentConfig;
use crate::constants::agent::{
    DEFAULT_RECURSION_LIMIT, DEFAULT_STEP_LIMIT, FORCED_FINAL_ANSWER_INSTRUCTION,
};
use crate::index::IndexRegistry;
use crate::repo::{GitHubClient, GitRepository, RepositorySnapshot};
use crate::types::{Result, WikiError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reasoning,
    ToolExecution,
    ForcedFinalAnswer,
    StructuredExtraction,
    Done,
}

/// Conversation state of one run
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    /// Turns after the system prompt, append-only except for the dangling
    /// tool-call turn dropped when a final answer is forced
    pub messages: Vec<Message>,
    pub steps_taken: usize,
    pub final_output: Option<Value>,
}

impl AgentState {
    fn new(prompt: &str) -> Self {
        Self {
            messages: vec![Message::user(prompt)],
            ..Default::default()
        }
    }
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// Content of the final assistant turn
    pub text: String,
    /// Extracted value when a schema was requested
    pub structured: Option<Value>,
    pub steps_taken: usize,
    pub model_invocations: usize,
    /// The step budget ran out and the answer was forced
    pub forced: bool,
    pub messages: Vec<Message>,
}

pub struct BoundedAgentLoop {
    system_prompt: String,
    model: SharedChatModel,
    tools: Arc<ToolRegistry>,
    step_limit: usize,
    recursion_limit: usize,
    schema: Option<Value>,
}

impl std::fmt::Debug for BoundedAgentLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedAgentLoop")
            .field("model", &self.model.model())
            .field("tools", &self.tools)
            .field("step_limit", &self.step_limit)
            .field("recursion_limit", &self.recursion_limit)
            .field("structured", &self.schema.is_some())
            .finish()
    }
}

impl BoundedAgentLoop {
    pub fn new(system_prompt: impl Into<String>, model: SharedChatModel, tools: Arc<ToolRegistry>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            model,
            tools,
            step_limit: DEFAULT_STEP_LIMIT,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            schema: None,
        }
    }

    pub fn with_limits(mut self, config: &AgentConfig) -> Self {
        self.step_limit = config.step_limit;
        self.recursion_limit = config.recursion_limit;
        self
    }

    pub fn with_step_limit(mut self, step_limit: usize) -> Self {
        self.step_limit = step_limit;
        self
    }

    pub fn with_recursion_limit(mut self, recursion_limit: usize) -> Self {
        self.recursion_limit = recursion_limit;
        self
    }

    /// Finish with a structured extraction pass producing a value for `schema`
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    fn with_system(&self, messages: &[Message]) -> Vec<Message> {
        let mut all = Vec::with_capacity(messages.len() + 2);
        all.push(Message::system(self.system_prompt.as_str()));
        all.extend_from_slice(messages);
        all
    }

    fn after_answer(&self) -> Phase {
        if self.schema.is_some() {
            Phase::StructuredExtraction
        } else {
            Phase::Done
        }
    }

    /// Drive the state machine from `prompt` to `Done`
    #[instrument(skip_all, fields(run = %uuid::Uuid::new_v4(), model = %self.model.model()))]
    pub async fn run(&self, prompt: &str) -> Result<AgentOutcome> {
        let specs: Vec<ToolSpec> = self.tools.specs();
        let mut state = AgentState::new(prompt);
        let mut phase = Phase::Reasoning;
        let mut visits = 0usize;
        let mut invocations = 0usize;
        let mut forced = false;

        while phase != Phase::Done {
            visits += 1;
            if visits > self.recursion_limit {
                warn!("Agent exceeded recursion limit {} in {:?}", self.recursion_limit, phase);
                return Err(WikiError::RecursionLimit {
                    limit: self.recursion_limit,
                });
            }

            phase = match phase {
                Phase::Reasoning => {
                    let response = self.model.invoke(&self.with_system(&state.messages), &specs).await?;
                    invocations += 1;
                    let wants_tools = response.has_tool_calls();
                    state.messages.push(response);

                    if !wants_tools {
                        self.after_answer()
                    } else if state.steps_taken < self.step_limit {
                        Phase::ToolExecution
                    } else {
                        Phase::ForcedFinalAnswer
                    }
                }
                Phase::ToolExecution => {
                    let calls = state
                        .messages
                        .last()
                        .map(|m| m.tool_calls.clone())
                        .unwrap_or_default();
                    debug!(
                        "Step {}: {}",
                        state.steps_taken + 1,
                        calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
                    );
                    let observations = join_all(calls.iter().map(|call| self.tools.execute(call))).await;
                    for (call, observation) in calls.iter().zip(observations) {
                        state.messages.push(Message::tool(call.id.as_str(), observation));
                    }
                    state.steps_taken += 1;
                    Phase::Reasoning
                }
                Phase::ForcedFinalAnswer => {
                    info!("Step limit {} reached, forcing a final answer", self.step_limit);
                    forced = true;
                    // The unanswered tool-call turn has no observations; drop it
                    state.messages.pop();
                    let mut history = self.with_system(&state.messages);
                    history.push(Message::system(FORCED_FINAL_ANSWER_INSTRUCTION));

                    let mut response = self.model.invoke(&history, &[]).await?;
                    invocations += 1;
                    response.tool_calls.clear();
                    state.messages.push(response);
                    self.after_answer()
                }
                Phase::StructuredExtraction => {
                    let schema = self.schema.as_ref().ok_or_else(|| {
                        WikiError::Config("structured extraction without a schema".to_string())
                    })?;
                    let value = self
                        .model
                        .invoke_structured(&self.with_system(&state.messages), schema)
                        .await?;
                    invocations += 1;
                    state.final_output = Some(value);
                    Phase::Done
                }
                Phase::Done => Phase::Done,
            };
        }

        debug!(
            "Agent finished: {} steps, {} model invocations{}",
            state.steps_taken,
            invocations,
            if forced { " (forced)" } else { "" }
        );

        let text = state
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(AgentOutcome {
            text,
            structured: state.final_output,
            steps_taken: state.steps_taken,
            model_invocations: invocations,
            forced,
            messages: state.messages,
        })
    }
}

/// The four retrieval tools over one repository
pub fn repository_tools(
    repo: Arc<GitRepository>,
    index: Arc<IndexRegistry>,
    github: Arc<GitHubClient>,
) -> ToolRegistry {
    let root = repo.path().to_path_buf();
    let id = repo.id().clone();
    let snapshot: Arc<dyn RepositorySnapshot> = repo;
    ToolRegistry::new()
        .register(SemanticSearchTool::new(snapshot, index))
        .register(CodeSearchTool::new(github, id))
        .register(ViewFileTool::new(root.clone()))
        .register(ListFilesTool::new(root))
}
