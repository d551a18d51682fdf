//! LLM integration for the agent.
//!
//! - `LlmProvider`: a chat completion backend (OpenAI-compatible by default)
//! - `Model`: what the agent loop thinks with, implemented by `Reasoning`
//! - `parser`: tool calls and reasoning sections out of raw model text

mod openai_chat;
pub mod parser;
mod provider;
mod reasoning;

pub use openai_chat::OpenAiChatProvider;
pub use parser::{ThinkingSplit, ToolCall, parse_tool_calls, split_thinking_and_answer};
pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};
pub use reasoning::{Model, Reasoning, ThinkingResult};

use std::sync::Arc;

use crate::config::LlmConfig;

/// Create the configured LLM provider.
pub fn create_llm_provider(config: &LlmConfig) -> Arc<dyn LlmProvider> {
    tracing::info!(
        base_url = %config.base_url,
        model = %config.model,
        "Using OpenAI-compatible chat completions"
    );
    Arc::new(OpenAiChatProvider::new(config.clone()))
}
