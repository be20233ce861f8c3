//! Tool trait definition
//!
//! All clinical tools implement this trait to provide a consistent interface.

use async_trait::async_trait;
use serde_json::Value;

use super::result::ToolCallResult;
use crate::llm::ToolDefinition;

/// Per-turn context handed to tools
///
/// Hidden from the model: the patient scope comes from the caller, never from
/// tool arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolContext {
    /// Patient the conversation is bound to, if any
    pub patient_id: Option<String>,
}

impl ToolContext {
    pub fn new(patient_id: Option<String>) -> Self {
        Self { patient_id }
    }

    pub fn for_patient(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: Some(patient_id.into()),
        }
    }
}

/// Trait for tools that the agent can dispatch
///
/// `execute` is infallible by contract: failures are returned as a
/// `ToolCallResult` with `success == false`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the name of this tool
    fn name(&self) -> &str;

    /// Get the catalog entry for this tool
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the model-supplied arguments
    async fn execute(&self, input: &Value, context: &ToolContext) -> ToolCallResult;
}
