//! Provider-neutral conversation and tool types
//!
//! These are the shapes exchanged with a `ModelProvider`. Concrete adapters
//! (OpenAI-compatible, Gemini, ...) translate them to their own wire format.

use std::fmt;
use std::pin::Pin;

use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Messages
// ============================================================================

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message in the conversation
///
/// Order is significant. When a system message is present it is always the
/// first element of a message list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,

    /// Plain text content
    pub content: String,
}

impl Message {
    /// Create a system message
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }

    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

// ============================================================================
// Tool Definitions
// ============================================================================

/// Catalog entry describing a callable tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name
    pub name: String,

    /// Description shown to the model
    pub description: String,

    /// JSON schema for the tool input
    pub input_schema: ToolInputSchema,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: ToolInputSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// JSON schema for tool input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInputSchema {
    /// Type (always "object")
    #[serde(rename = "type")]
    pub schema_type: String,

    /// Properties of the input object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,

    /// Required properties
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl ToolInputSchema {
    /// Create a new tool input schema
    pub fn new() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: None,
            required: None,
        }
    }

    /// Set the properties
    pub fn with_properties(mut self, properties: Value) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Set the required fields
    pub fn with_required(mut self, required: Vec<String>) -> Self {
        self.required = Some(required);
        self
    }
}

impl Default for ToolInputSchema {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Responses
// ============================================================================

/// A structured request from the model to invoke a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Provider-assigned call id (may be empty for providers without ids)
    #[serde(default)]
    pub id: String,

    /// Name of the requested tool
    pub name: String,

    /// Structured arguments
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            arguments,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Result of a non-streaming model invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    /// Plain answer, no tools requested
    Text(String),
    /// One or more tool calls requested
    ToolCalls(Vec<ToolCallRequest>),
}

impl ModelReply {
    /// Tool calls requested by the model (empty for a text reply)
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match self {
            ModelReply::Text(_) => &[],
            ModelReply::ToolCalls(calls) => calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }
}

/// Stream of text deltas from a streaming model call
pub type TextStream = Pin<Box<dyn Stream<Item = anyhow::Result<String>> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_serialization() {
        let msg = Message::user("Hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("\"content\":\"Hello\""));
    }

    #[test]
    fn test_tool_definition_schema_type() {
        let def = ToolDefinition::new(
            "query_conditions",
            "Query conditions",
            ToolInputSchema::new().with_properties(json!({"parameters": {"type": "object"}})),
        );
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["input_schema"]["type"], "object");
        assert!(json["input_schema"].get("required").is_none());
    }

    #[test]
    fn test_model_reply_tool_calls() {
        let text = ModelReply::Text("hi".into());
        assert!(!text.has_tool_calls());

        let calls = ModelReply::ToolCalls(vec![ToolCallRequest::new("get_patient_info", json!({}))]);
        assert!(calls.has_tool_calls());
        assert_eq!(calls.tool_calls()[0].name, "get_patient_info");
    }

    #[test]
    fn test_tool_call_request_deserializes_without_id() {
        let call: ToolCallRequest =
            serde_json::from_str(r#"{"name": "query_conditions"}"#).unwrap();
        assert_eq!(call.id, "");
        assert!(call.arguments.is_null());
    }
}
