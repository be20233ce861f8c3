//! Agent turn state machine

use serde::{Deserialize, Serialize};

/// State of a single agent turn
///
/// ```text
/// Idle -> PromptBuilt -> ModelRequested -> DirectAnswer ----------------------> StreamingFinal -> Completed
///                                       \-> ToolsRequested -> ToolsExecuting
///                                             -> FollowupRequested -> ModelRequested (once)
/// any non-terminal -> Cancelled | Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnState {
    Idle,
    PromptBuilt,
    ModelRequested,
    DirectAnswer,
    ToolsRequested,
    ToolsExecuting,
    FollowupRequested,
    StreamingFinal,
    Completed,
    Cancelled,
    Failed,
}

impl TurnState {
    /// Check if the turn has finished (Completed, Cancelled or Failed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TurnState::Completed | TurnState::Cancelled | TurnState::Failed
        )
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: TurnState) -> bool {
        use TurnState::*;

        if self.is_terminal() {
            return false;
        }
        if matches!(next, Cancelled | Failed) {
            return true;
        }

        matches!(
            (self, next),
            (Idle, PromptBuilt)
                | (PromptBuilt, ModelRequested)
                | (ModelRequested, DirectAnswer)
                | (ModelRequested, ToolsRequested)
                | (ModelRequested, StreamingFinal)
                | (DirectAnswer, StreamingFinal)
                | (ToolsRequested, ToolsExecuting)
                | (ToolsExecuting, FollowupRequested)
                | (FollowupRequested, ModelRequested)
                | (StreamingFinal, Completed)
        )
    }
}

/// Tracks the current state of a turn and logs transitions
#[derive(Debug)]
pub(crate) struct TurnTracker {
    turn_id: String,
    state: TurnState,
}

impl TurnTracker {
    pub(crate) fn new(turn_id: impl Into<String>) -> Self {
        Self {
            turn_id: turn_id.into(),
            state: TurnState::Idle,
        }
    }

    pub(crate) fn state(&self) -> TurnState {
        self.state
    }

    pub(crate) fn advance(&mut self, next: TurnState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(
                "[TurnTracker] Unexpected transition {:?} -> {:?} (turn {})",
                self.state,
                next,
                self.turn_id
            );
        } else {
            tracing::debug!(
                "[TurnTracker] {:?} -> {:?} (turn {})",
                self.state,
                next,
                self.turn_id
            );
        }
        self.state = next;
    }
}
