//! Heuristic token estimation
//!
//! Not a real tokenizer. The estimate is deterministic and monotonic in the
//! input length, which is all the truncation logic relies on.

use crate::llm::Message;

/// Structural cost of a role/content envelope
pub const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// CJK ideographs cost roughly one token per 1.5 characters
const CJK_CHARS_PER_TOKEN: f64 = 1.5;

/// Everything else costs roughly one token per 4 characters
const OTHER_CHARS_PER_TOKEN: f64 = 4.0;

fn is_cjk_ideograph(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
}

/// Estimate the token count of a piece of text
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    let (cjk, other) = text.chars().fold((0usize, 0usize), |(cjk, other), c| {
        if is_cjk_ideograph(c) {
            (cjk + 1, other)
        } else {
            (cjk, other + 1)
        }
    });

    let estimate = cjk as f64 / CJK_CHARS_PER_TOKEN + other as f64 / OTHER_CHARS_PER_TOKEN;
    estimate.ceil() as usize
}

/// Estimate the cost of a single message including its envelope
pub fn estimate_message_tokens(message: &Message) -> usize {
    estimate_tokens(&message.content) + MESSAGE_OVERHEAD_TOKENS
}

/// Estimate the token count of a message list
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}
