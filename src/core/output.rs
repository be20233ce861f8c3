//! Turn output and streaming sink types

use serde::{Deserialize, Serialize};

use super::state::TurnState;
use crate::tools::ToolCallResult;

/// Receiver for streamed answer text
///
/// Every chunk is the entire accumulated answer so far, not a delta. The
/// latest chunk is authoritative; consumers replace their displayed buffer.
pub trait ChunkSink: Send + Sync {
    fn on_chunk(&self, cumulative_text: &str);
}

impl<F> ChunkSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_chunk(&self, cumulative_text: &str) {
        self(cumulative_text)
    }
}

/// Sink that discards all chunks
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ChunkSink for NoopSink {
    fn on_chunk(&self, _cumulative_text: &str) {}
}

/// Terminal result of one agent turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTurnOutput {
    /// Identifier used to correlate log lines for this turn
    pub turn_id: String,

    /// Final answer text, with citation markers linkified
    pub final_text: String,

    /// Citation URLs gathered from literature search, first-seen order
    pub citations: Vec<String>,

    /// Results of every dispatched tool call, in request order
    pub tool_results: Vec<ToolCallResult>,

    /// Completed or Cancelled
    pub final_state: TurnState,
}

impl AgentTurnOutput {
    /// Whether the turn was cut short by cancellation
    pub fn is_cancelled(&self) -> bool {
        self.final_state == TurnState::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |text: &str| seen.lock().unwrap().push(text.to_string());
        sink.on_chunk("He");
        sink.on_chunk("Hello");
        assert_eq!(*seen.lock().unwrap(), vec!["He", "Hello"]);
    }

    #[test]
    fn test_is_cancelled() {
        let output = AgentTurnOutput {
            turn_id: "t".into(),
            final_text: "partial".into(),
            citations: vec![],
            tool_results: vec![],
            final_state: TurnState::Cancelled,
        };
        assert!(output.is_cancelled());
    }
}
