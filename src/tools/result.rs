//! Tool call results
//!
//! A tool never fails across the agent loop boundary. Every dispatched call
//! produces exactly one `ToolCallResult`, successful or not.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message used whenever an error carries no usable text
pub const UNKNOWN_ERROR: &str = "Unknown error occurred";

/// Tool-specific payload of a successful call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolPayload {
    /// FHIR search result (a Bundle, usually)
    FhirQuery {
        resource_type: String,
        count: usize,
        data: Value,
    },
    /// Single Patient resource
    PatientInfo { data: Value },
    /// Narrative answer plus citation URLs
    LiteratureSearch {
        content: String,
        citations: Vec<String>,
    },
}

/// Result of one dispatched tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Name of the tool that produced this result
    pub tool_name: String,

    /// Whether the call succeeded
    pub success: bool,

    /// Human-readable one-line summary
    pub summary: String,

    /// Error message when the call failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Payload on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<ToolPayload>,
}

impl ToolCallResult {
    /// Create a successful result
    pub fn success(
        tool_name: impl Into<String>,
        summary: impl Into<String>,
        payload: ToolPayload,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            summary: summary.into(),
            error: None,
            payload: Some(payload),
        }
    }

    /// Create a failed result; a blank error becomes `UNKNOWN_ERROR`
    pub fn failure(
        tool_name: impl Into<String>,
        summary: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let error = error.into();
        Self {
            tool_name: tool_name.into(),
            success: false,
            summary: summary.into(),
            error: Some(normalize_message(&error)),
            payload: None,
        }
    }

    /// Number of records for count-based payloads
    pub fn count(&self) -> Option<usize> {
        match &self.payload {
            Some(ToolPayload::FhirQuery { count, .. }) => Some(*count),
            Some(ToolPayload::PatientInfo { .. }) => Some(1),
            Some(ToolPayload::LiteratureSearch { .. }) | None => None,
        }
    }

    /// Citation URLs carried by a literature payload
    pub fn citations(&self) -> &[String] {
        match &self.payload {
            Some(ToolPayload::LiteratureSearch { citations, .. }) => citations,
            _ => &[],
        }
    }
}

/// Render an error for inclusion in a result or summary
pub fn normalize_error(err: &anyhow::Error) -> String {
    normalize_message(&err.to_string())
}

/// Map blank messages to `UNKNOWN_ERROR`
pub fn normalize_message(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        trimmed.to_string()
    }
}
