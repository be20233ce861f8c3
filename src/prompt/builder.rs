//! System prompt builder
//!
//! Composes the instruction text sent to the model: the caller's base prompt,
//! the bound patient, the organized clinical data (when there is any), the
//! enumerated tool catalog and the usage guidelines. Pure and deterministic.

use serde::{Deserialize, Serialize};

use crate::llm::ToolDefinition;
use crate::tools::tool_catalog;

/// Inputs of `build_system_prompt`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemPromptInput {
    /// Caller-supplied instructions, emitted verbatim as the prefix
    pub base_system_prompt: String,

    /// Pre-organized clinical data; omitted when blank
    #[serde(default)]
    pub clinical_context: String,

    /// Bound patient, if any
    #[serde(default)]
    pub patient_id: Option<String>,

    /// Whether a literature provider key is configured
    #[serde(default)]
    pub has_literature_key: bool,

    /// Tools to list; the standard catalog for `has_literature_key` when unset
    #[serde(default)]
    pub tools: Option<Vec<ToolDefinition>>,
}

impl SystemPromptInput {
    pub fn new(base_system_prompt: impl Into<String>) -> Self {
        Self {
            base_system_prompt: base_system_prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_clinical_context(mut self, context: impl Into<String>) -> Self {
        self.clinical_context = context.into();
        self
    }

    pub fn with_patient_id(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }

    pub fn with_literature_key(mut self, has_key: bool) -> Self {
        self.has_literature_key = has_key;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// Heading of the organized clinical data section
pub const CLINICAL_DATA_HEADING: &str = "## Organized Clinical Data";

/// Heading of the tool catalog section
pub const TOOLS_HEADING: &str = "## Available Tools";

const GUIDELINES_WITH_DATA: &str = "\
- Prioritize the organized clinical data above when it answers the question; call tools only for information it does not contain or to confirm recent changes.";

const GUIDELINES_WITHOUT_DATA: &str = "\
- No clinical data was provided up front. Use the query tools directly to retrieve the records you need.";

const GUIDELINES_COMMON: &str = "\
- No additional authorization is required to call the tools; access for the current patient is already granted.
- Explain tool results in clinical terms. Do not paste raw JSON or raw tool output.
- Provide analysis and clinical interpretation, not just a list of data.
- If a query returns no records, say so explicitly instead of silently omitting that category.";

/// Build the final system prompt
pub fn build_system_prompt(input: &SystemPromptInput) -> String {
    let mut prompt = String::with_capacity(input.base_system_prompt.len() + 2048);
    prompt.push_str(&input.base_system_prompt);

    prompt.push_str("\n\n## Current Patient\n");
    match input.patient_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
        Some(patient_id) => {
            prompt.push_str(&format!(
                "A patient context is bound to this conversation (patient ID: {}). \
                 You are authorized to use the FHIR query tools to read this patient's records.\n",
                patient_id
            ));
        }
        None => {
            prompt.push_str(
                "No patient context is bound to this conversation. \
                 The FHIR query tools will not function until a patient is selected.\n",
            );
        }
    }

    let clinical_context = input.clinical_context.trim();
    let has_clinical_data = !clinical_context.is_empty();
    if has_clinical_data {
        prompt.push_str(&format!("\n{}\n{}\n", CLINICAL_DATA_HEADING, clinical_context));
    }

    prompt.push_str(&format!("\n{}\n", TOOLS_HEADING));
    let tools = input
        .tools
        .clone()
        .unwrap_or_else(|| tool_catalog(input.has_literature_key));
    for (index, tool) in tools.iter().enumerate() {
        prompt.push_str(&format!("{}. **{}**: {}\n", index + 1, tool.name, tool.description));
    }

    prompt.push_str("\n## Guidelines\n");
    prompt.push_str(if has_clinical_data {
        GUIDELINES_WITH_DATA
    } else {
        GUIDELINES_WITHOUT_DATA
    });
    prompt.push('\n');
    prompt.push_str(GUIDELINES_COMMON);
    prompt.push('\n');

    prompt
}
