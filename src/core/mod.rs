//! Core types for the clinical agent
//!
//! This module provides the fundamental types used throughout the crate:
//! - `TurnState` - State machine of a single agent turn
//! - `AgentTurnOutput` / `ChunkSink` - Turn result and streaming sink
//! - `AgentError` - Error types

pub mod error;
pub mod output;
pub mod state;

pub use error::{AgentError, AgentResult};
pub use output::{AgentTurnOutput, ChunkSink, NoopSink};
pub use state::TurnState;
pub(crate) use state::TurnTracker;
