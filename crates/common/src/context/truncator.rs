//! Context truncation
//!
//! Keeps the most recent messages whose estimated token count fits a budget.
//! Estimation is deliberately rough: 1 whitespace-separated word ≈ 1.3 tokens.

use crate::models::Message;

/// Estimated tokens per word, in tenths
const TENTHS_PER_WORD: usize = 13;

/// Estimate the token count of a piece of text (`words * 1.3`)
pub fn estimated_tokens(content: &str) -> f64 {
    estimated_tenths(content) as f64 / 10.0
}

/// Sum of estimated tokens over a message slice
pub fn total_estimated_tokens(messages: &[Message]) -> f64 {
    messages.iter().map(|m| estimated_tenths(&m.content)).sum::<usize>() as f64 / 10.0
}

// Integer tenths keep budget comparisons exact at the boundary.
fn estimated_tenths(content: &str) -> usize {
    content.split_whitespace().count() * TENTHS_PER_WORD
}

/// Keep the longest trailing run of messages that fits in `max_tokens`.
///
/// Walks from the newest message backwards and stops at the first message
/// that would overflow the budget, so the result is always a contiguous
/// suffix of `messages` in chronological order. If the newest message alone
/// is over budget the result is empty.
pub fn truncate_messages(messages: &[Message], max_tokens: usize) -> &[Message] {
    let budget = max_tokens.saturating_mul(10);
    let mut total = 0usize;
    let mut start = messages.len();

    for (idx, message) in messages.iter().enumerate().rev() {
        let cost = estimated_tenths(&message.content);
        if total + cost > budget {
            break;
        }
        total += cost;
        start = idx;
    }

    &messages[start..]
}
