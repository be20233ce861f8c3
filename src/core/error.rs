//! Agent error types

use thiserror::Error;

/// Errors that can end an agent turn
///
/// Tool failures never appear here; they are captured in `ToolCallResult`.
/// Cancellation is not an error either: a cancelled turn resolves with
/// whatever text was already accumulated.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Model provider call failed (unreachable, rejected request, stream error)
    #[error("Provider error: {0}")]
    Provider(String),

    /// The system prompt leaves no room for any conversation message
    #[error("Prompt too large: system prompt uses {system_tokens} tokens of a {budget} token budget")]
    PromptTooLarge {
        /// Estimated tokens of the system prompt
        system_tokens: usize,
        /// Context limit minus the response reserve
        budget: usize,
    },

    /// The system prompt fits, but a message that must be sent does not
    #[error("Message too large: needs {message_tokens} tokens but only {available} remain after the system prompt")]
    MessageTooLarge {
        /// Estimated tokens of the message (or follow-up pair) that must be kept
        message_tokens: usize,
        /// Budget left once the system prompt is counted
        available: usize,
    },

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Create a provider error from any displayable error
    pub fn provider(err: impl std::fmt::Display) -> Self {
        let message = err.to_string();
        if message.trim().is_empty() {
            AgentError::Provider(crate::tools::UNKNOWN_ERROR.to_string())
        } else {
            AgentError::Provider(message)
        }
    }

    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        AgentError::Other(msg.into())
    }
}

/// Result type alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;
