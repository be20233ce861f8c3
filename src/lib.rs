//! Orchestration core for a clinical AI assistant
//!
//! One agent turn builds a patient-scoped system prompt, fits the
//! conversation into the model's context window, lets the model call FHIR
//! and literature tools, and streams the final answer with linked
//! citations.

pub mod core;
pub mod context;
pub mod prompt;
pub mod tools;
pub mod citations;

// Model provider interface
pub mod llm;
pub mod logging;

// Useful helpers for agent implementations
pub mod helpers;

// Clinical agent implementation
pub mod agent;

pub use agent::{AgentConfig, ClinicalAgent, TurnRequest};
pub use citations::process_citations;
pub use context::{
    estimate_tokens, get_token_stats, truncate_to_context_window, would_exceed_context_window,
    ContextConfig, TokenStats,
};
pub use crate::core::{AgentError, AgentResult, AgentTurnOutput, ChunkSink, TurnState};
pub use logging::{init_logging, LoggingConfig};
pub use prompt::{build_system_prompt, SystemPromptInput};
pub use tools::{tool_catalog, FhirClient, LiteratureSearchProvider, ToolCallResult, ToolRegistry};
