//! Token estimation and context window truncation

mod tokens;
mod window;

pub use tokens::{
    estimate_message_tokens, estimate_messages_tokens, estimate_tokens, MESSAGE_OVERHEAD_TOKENS,
};
pub use window::{
    context_limit_for_model, get_token_stats, truncate_to_context_window,
    would_exceed_context_window, ContextBudget, ContextConfig, TokenStats,
    DEFAULT_CONTEXT_LIMIT, DEFAULT_RESPONSE_RESERVE,
};
