//! Context window management
//!
//! Trims conversation history so that the system prompt plus the kept
//! messages fit the model's context limit minus the response reserve.

use serde::{Deserialize, Serialize};

use super::tokens::{estimate_message_tokens, estimate_messages_tokens, estimate_tokens};
use crate::llm::Message;

/// Context limit used for model ids missing from the table
pub const DEFAULT_CONTEXT_LIMIT: usize = 15_000;

/// Tokens reserved for the model's answer when the caller does not say
pub const DEFAULT_RESPONSE_RESERVE: usize = 4_000;

/// Known model context limits, in token-units
const MODEL_CONTEXT_LIMITS: &[(&str, usize)] = &[
    ("gpt-5", 400_000),
    ("gpt-5-mini", 400_000),
    ("gpt-5-nano", 400_000),
    ("gpt-4.1", 1_047_576),
    ("gpt-4.1-mini", 1_047_576),
    ("gpt-4o", 128_000),
    ("gpt-4o-mini", 128_000),
    ("gpt-4-turbo", 128_000),
    ("gpt-4", 8_192),
    ("gpt-3.5-turbo", 16_385),
    ("o3", 200_000),
    ("o4-mini", 200_000),
    ("gemini-2.5-pro", 1_048_576),
    ("gemini-2.5-flash", 1_048_576),
    ("gemini-2.0-flash", 1_048_576),
    ("gemini-1.5-pro", 2_097_152),
    ("gemini-1.5-flash", 1_048_576),
];

/// Look up the context limit for a model id
///
/// Exact match first, then the longest table key that prefixes the id (so
/// dated variants resolve to their family), then `DEFAULT_CONTEXT_LIMIT`.
pub fn context_limit_for_model(model_id: &str) -> usize {
    let model_id = model_id.trim().to_ascii_lowercase();

    if let Some((_, limit)) = MODEL_CONTEXT_LIMITS.iter().find(|(id, _)| *id == model_id) {
        return *limit;
    }

    MODEL_CONTEXT_LIMITS
        .iter()
        .filter(|(id, _)| model_id.starts_with(id))
        .max_by_key(|(id, _)| id.len())
        .map(|(_, limit)| *limit)
        .unwrap_or(DEFAULT_CONTEXT_LIMIT)
}

/// Context limit and response reserve for one model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBudget {
    pub model_context_limit: usize,
    pub reserved_for_response: usize,
}

impl ContextBudget {
    /// Budget for a model, using `DEFAULT_RESPONSE_RESERVE` when no reserve is given
    pub fn for_model(model_id: &str, reserved_for_response: Option<usize>) -> Self {
        Self {
            model_context_limit: context_limit_for_model(model_id),
            reserved_for_response: reserved_for_response.unwrap_or(DEFAULT_RESPONSE_RESERVE),
        }
    }

    /// Tokens available for the system prompt plus messages
    pub fn input_budget(&self) -> usize {
        self.model_context_limit
            .saturating_sub(self.reserved_for_response)
    }
}

/// Per-call truncation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Model identifier used to look up the context limit
    pub model_id: String,

    /// System prompt that will accompany the messages
    pub system_prompt: String,

    /// Tokens reserved for the response (defaults to `DEFAULT_RESPONSE_RESERVE`)
    #[serde(default)]
    pub max_response_tokens: Option<usize>,
}

impl ContextConfig {
    pub fn new(model_id: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            system_prompt: system_prompt.into(),
            max_response_tokens: None,
        }
    }

    pub fn with_max_response_tokens(mut self, tokens: usize) -> Self {
        self.max_response_tokens = Some(tokens);
        self
    }

    pub fn budget(&self) -> ContextBudget {
        ContextBudget::for_model(&self.model_id, self.max_response_tokens)
    }
}

/// Drop the oldest non-system messages until the rest fits the budget.
///
/// A leading system message is always kept while anything is kept. The
/// remaining output is a contiguous, chronologically ordered suffix of the
/// input. An empty result means the system prompt alone exhausts the budget
/// (or not even the newest message fits); callers must treat that as a
/// "prompt too large" condition.
pub fn truncate_to_context_window(messages: &[Message], config: &ContextConfig) -> Vec<Message> {
    let budget = config.budget();
    let system_tokens = estimate_tokens(&config.system_prompt);

    let mut available = budget.input_budget() as i64 - system_tokens as i64;
    if available <= 0 {
        tracing::warn!(
            "[ContextWindow] System prompt ({} tokens) exhausts the budget for {} ({} tokens)",
            system_tokens,
            config.model_id,
            budget.input_budget()
        );
        return Vec::new();
    }

    let (pinned, rest) = match messages.split_first() {
        Some((first, rest)) if first.is_system() => (Some(first), rest),
        _ => (None, messages),
    };

    if let Some(system) = pinned {
        let cost = estimate_message_tokens(system) as i64;
        if cost > available {
            tracing::warn!("[ContextWindow] Leading system message does not fit the budget");
            return Vec::new();
        }
        available -= cost;
    }

    let mut used: i64 = 0;
    let mut kept: Vec<&Message> = Vec::new();
    for message in rest.iter().rev() {
        let cost = estimate_message_tokens(message) as i64;
        if used + cost > available {
            break;
        }
        used += cost;
        kept.push(message);
    }

    let dropped = rest.len() - kept.len();
    if dropped > 0 {
        tracing::info!(
            "[ContextWindow] Dropped {} oldest message(s) to fit {} ({} tokens available)",
            dropped,
            config.model_id,
            available
        );
    }

    pinned
        .into_iter()
        .chain(kept.into_iter().rev())
        .cloned()
        .collect()
}

/// Whether the messages plus system prompt exceed the budget as-is
pub fn would_exceed_context_window(messages: &[Message], config: &ContextConfig) -> bool {
    let total = estimate_tokens(&config.system_prompt) + estimate_messages_tokens(messages);
    total > config.budget().input_budget()
}

/// Token accounting snapshot, for diagnostics and tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenStats {
    pub system_tokens: usize,
    pub message_tokens: usize,
    pub total_tokens: usize,
    /// Model context limit
    pub context_limit: usize,
    /// Context limit minus the response reserve
    pub available_tokens: usize,
    /// `available_tokens - total_tokens`; negative when over budget
    pub remaining_tokens: i64,
    /// `total_tokens / available_tokens` as a percentage
    pub utilization_percent: f64,
}

/// Compute token statistics for a message list under a config
pub fn get_token_stats(messages: &[Message], config: &ContextConfig) -> TokenStats {
    let budget = config.budget();
    let system_tokens = estimate_tokens(&config.system_prompt);
    let message_tokens = estimate_messages_tokens(messages);
    let total_tokens = system_tokens + message_tokens;
    let available_tokens = budget.input_budget();

    let utilization_percent = if available_tokens == 0 {
        100.0
    } else {
        let raw = total_tokens as f64 / available_tokens as f64 * 100.0;
        (raw * 100.0).round() / 100.0
    };

    TokenStats {
        system_tokens,
        message_tokens,
        total_tokens,
        context_limit: budget.model_context_limit,
        available_tokens,
        remaining_tokens: available_tokens as i64 - total_tokens as i64,
        utilization_percent,
    }
}
