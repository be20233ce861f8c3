//! Useful helpers for agent implementations
//!
//! - `ConversationNamer` - Generate descriptive names for conversations

mod conversation_namer;

pub use conversation_namer::{spawn_conversation_naming, ConversationNamer, NameSink};
