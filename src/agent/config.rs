//! Agent Configuration
//!
//! Configuration options for the ClinicalAgent.

use crate::context::DEFAULT_RESPONSE_RESERVE;
use crate::helpers::NameSink;

/// Maximum records shown per tool in the follow-up summary
pub const DEFAULT_MAX_SUMMARY_RECORDS: usize = 10;

/// Configuration for a ClinicalAgent
///
/// Use the builder pattern to configure the agent:
///
/// ```ignore
/// let config = AgentConfig::new()
///     .with_patient_id("patient-123")
///     .with_max_response_tokens(8000)
///     .with_debug(true);
/// ```
#[derive(Clone)]
pub struct AgentConfig {
    /// Patient bound to this agent's conversations
    pub patient_id: Option<String>,

    /// Tokens reserved for the model's answer when truncating history
    pub max_response_tokens: usize,

    /// Records per tool included in the follow-up JSON excerpt
    pub max_summary_records: usize,

    /// Log full outgoing messages and tool payloads at debug level
    pub debug_enabled: bool,

    /// Generate a conversation title in the background after the first turn
    pub auto_name_conversation: bool,

    /// Receives generated conversation titles
    pub name_sink: Option<NameSink>,
}

impl AgentConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self {
            patient_id: None,
            max_response_tokens: DEFAULT_RESPONSE_RESERVE,
            max_summary_records: DEFAULT_MAX_SUMMARY_RECORDS,
            debug_enabled: false,
            auto_name_conversation: false,
            name_sink: None,
        }
    }

    /// Bind a patient
    pub fn with_patient_id(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }

    /// Set the response token reserve
    pub fn with_max_response_tokens(mut self, tokens: usize) -> Self {
        self.max_response_tokens = tokens;
        self
    }

    /// Set how many records per tool the follow-up summary shows
    pub fn with_max_summary_records(mut self, records: usize) -> Self {
        self.max_summary_records = records;
        self
    }

    /// Enable or disable debug payload logging
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug_enabled = enabled;
        self
    }

    /// Name the conversation after its first turn, delivering the title to `sink`
    ///
    /// Naming runs on a detached task; the turn never waits for it.
    pub fn with_conversation_naming(mut self, sink: NameSink) -> Self {
        self.auto_name_conversation = true;
        self.name_sink = Some(sink);
        self
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("patient_id", &self.patient_id)
            .field("max_response_tokens", &self.max_response_tokens)
            .field("max_summary_records", &self.max_summary_records)
            .field("debug_enabled", &self.debug_enabled)
            .field("auto_name_conversation", &self.auto_name_conversation)
            .field("name_sink", &self.name_sink.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
