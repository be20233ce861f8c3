//! Clinical agent implementation
//!
//! - `ClinicalAgent` - Runs one user turn end to end
//! - `AgentConfig` - Builder for agent options
//! - `ToolExecutor` - Concurrent, cancellable tool dispatch
//! - `summarize_tool_results` - Follow-up summary for the model

mod agent_loop;
mod config;
mod executor;
mod summary;

pub use agent_loop::{ClinicalAgent, TurnRequest};
pub use config::{AgentConfig, DEFAULT_MAX_SUMMARY_RECORDS};
pub use executor::ToolExecutor;
pub use summary::{
    fit_followup, restated_question, summarize_tool_results, summary_message, FollowupRound,
    FollowupSummary,
};
