//! Model provider trait
//!
//! Abstracts the LLM interface so that different vendors (OpenAI-compatible,
//! Gemini, ...) can be used interchangeably by the clinical agent.

use anyhow::Result;

use super::types::{Message, ModelReply, TextStream, ToolDefinition};

/// Trait for LLM providers used by `ClinicalAgent`.
///
/// Adapters own the HTTP transport, authentication and any request timeout.
/// The agent races every call against its cancellation token, so an adapter
/// does not need to observe cancellation itself; dropping the returned future
/// or stream must be enough to abandon the request.
#[async_trait::async_trait]
pub trait ModelProvider: Send + Sync {
    /// Send messages with the tool catalog and wait for the full reply.
    ///
    /// Returns either plain text or the tool calls the model wants to make.
    async fn invoke(&self, messages: Vec<Message>, tools: Vec<ToolDefinition>)
        -> Result<ModelReply>;

    /// Stream a plain-text answer (no tools offered).
    ///
    /// Yields text deltas as they arrive. The agent accumulates them and
    /// forwards the cumulative buffer to the caller.
    async fn stream(&self, messages: Vec<Message>) -> Result<TextStream>;

    /// Get the current model name.
    fn model(&self) -> String;

    /// Get the provider name (e.g., "openai", "gemini").
    fn provider_name(&self) -> &str;
}
