//! Conversation namer helper
//!
//! Generates a short title for a conversation from its first exchange. The
//! agent runs it on a detached task after the first turn; failures are
//! logged, never propagated.
//!
//! # Example
//!
//! ```ignore
//! use clinical_agent_sdk::helpers::ConversationNamer;
//!
//! let namer = ConversationNamer::new(llm.clone());
//! let name = namer.generate_name(&messages).await?;
//! ```

use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;

use crate::llm::{Message, ModelProvider, ModelReply, Role};

/// Receives a generated conversation name (e.g. to persist it)
pub type NameSink = Arc<dyn Fn(String) -> Result<()> + Send + Sync>;

/// Longest message excerpt included in the naming request
const MAX_EXCERPT_CHARS: usize = 500;

/// System prompt for generating conversation names
const NAMING_SYSTEM_PROMPT: &str = r#"You are a conversation naming assistant. Generate a short, descriptive name for a clinical conversation based on its content.

Rules:
- The name should be 3-7 words maximum
- It should capture the main clinical topic or question
- Use sentence case (capitalize first word only)
- Do not use quotes or special characters
- Do not include patient names or identifiers

Respond with ONLY the conversation name, nothing else."#;

/// Helper for generating conversation names
pub struct ConversationNamer {
    llm: Arc<dyn ModelProvider>,
}

impl ConversationNamer {
    pub fn new(llm: Arc<dyn ModelProvider>) -> Self {
        Self { llm }
    }

    /// Generate a conversation name from a list of messages
    pub async fn generate_name(&self, messages: &[Message]) -> Result<String> {
        let formatted = Self::format_messages(messages);
        if formatted.is_empty() {
            anyhow::bail!("Cannot name an empty conversation");
        }

        tracing::debug!(
            "[ConversationNamer] Generating name for {} messages",
            messages.len()
        );

        let reply = self
            .llm
            .invoke(
                vec![Message::system(NAMING_SYSTEM_PROMPT), Message::user(formatted)],
                Vec::new(),
            )
            .await?;

        let ModelReply::Text(text) = reply else {
            anyhow::bail!("Model requested tools while naming a conversation");
        };

        let name = text.trim().trim_matches('"').trim().to_string();
        if name.is_empty() {
            anyhow::bail!("Model returned an empty conversation name");
        }

        tracing::info!("[ConversationNamer] Generated name: {}", name);
        Ok(name)
    }

    /// Format user/assistant messages as `User: ...` / `Assistant: ...` lines
    fn format_messages(messages: &[Message]) -> String {
        let mut formatted = String::new();

        for message in messages {
            let role = match message.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
                Role::System => continue,
            };

            let content = message.content.trim();
            if content.is_empty() {
                continue;
            }

            let excerpt: String = content.chars().take(MAX_EXCERPT_CHARS).collect();
            formatted.push_str(&format!("{}: {}\n", role, excerpt));
        }

        formatted
    }
}

/// Name a conversation on a detached task
///
/// The caller does not await the handle; the result goes to `sink` and any
/// failure (model or sink) is logged.
pub fn spawn_conversation_naming(
    llm: Arc<dyn ModelProvider>,
    messages: Vec<Message>,
    sink: NameSink,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let namer = ConversationNamer::new(llm);
        match namer.generate_name(&messages).await {
            Ok(name) => {
                if let Err(e) = sink(name) {
                    tracing::warn!("[ConversationNamer] Failed to store conversation name: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!("[ConversationNamer] Failed to generate conversation name: {}", e);
            }
        }
    })
}
