//! System prompt composition

mod builder;

pub use builder::{build_system_prompt, SystemPromptInput, CLINICAL_DATA_HEADING, TOOLS_HEADING};
