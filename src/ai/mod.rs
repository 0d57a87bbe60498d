//! AI Integration Layer
//!
//! Capability interfaces the job engine drives, plus their HTTP bindings:
//! - [`ChatModel`]: tool-calling and schema-constrained completions
//! - [`Embedder`]: text → vector for the retrieval index
//! - token estimation and timeout helpers

pub mod embedding;
pub mod provider;
pub mod timeout;
pub mod tokenizer;

pub use embedding::{Embedder, HashEmbedder, OpenAiEmbedder, SharedEmbedder, create_embedder};
pub use provider::{
    ChatModel, Message, ModelSelector, OpenAiChatModel, Role, SharedChatModel, ToolCall, ToolSpec,
    create_chat_model,
};
pub use timeout::with_timeout;
pub use tokenizer::{TokenCounter, TokenEstimator};
