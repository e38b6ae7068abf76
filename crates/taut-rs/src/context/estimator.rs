//! Heuristic token estimation without a real tokenizer.
//!
//! Token counts here are an engineering approximation of a sub-word
//! tokenizer, not a byte-exact reimplementation. Latin/ASCII text averages
//! about four characters per token; CJK and other wide scripts compress far
//! worse under byte-pair-style tokenizers, so each wide character is charged
//! more than a full token. Every message also pays a small fixed overhead
//! approximating chat-format role framing.
//!
//! Estimation is total: empty input yields zero, nothing ever fails.

use crate::{ContentBlock, Message, MessageContent};
use serde::{Deserialize, Serialize};

/// Characters per token for Latin/ASCII text.
pub const LATIN_CHARS_PER_TOKEN: f64 = 4.0;

/// Tokens per character for CJK and other wide scripts.
pub const WIDE_TOKENS_PER_CHAR: f64 = 1.5;

/// Fixed per-message overhead approximating role-tag framing cost.
pub const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Extra framing overhead per tool-use / tool-result block.
pub const TOOL_BLOCK_OVERHEAD_TOKENS: usize = 2;

/// Token counts for a message sequence plus optional system prompt.
///
/// `available` is `max_tokens - total` and may go negative — that is a
/// signal the caller must react to, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCount {
    /// Estimated tokens across all messages.
    pub messages: usize,
    /// Estimated tokens of the system prompt (0 when none).
    pub system_prompt: usize,
    /// `messages + system_prompt`.
    pub total: usize,
    /// Remaining budget; negative means the history already overflows.
    pub available: i64,
}

/// Whether a character belongs to a wide script (CJK ideographs, kana,
/// hangul, fullwidth forms). These are charged [`WIDE_TOKENS_PER_CHAR`].
fn is_wide_char(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x115F     // Hangul Jamo
        | 0x2E80..=0x303E   // CJK radicals, symbols and punctuation
        | 0x3041..=0x33FF   // Hiragana, Katakana, CJK compatibility
        | 0x3400..=0x4DBF   // CJK Extension A
        | 0x4E00..=0x9FFF   // CJK Unified Ideographs
        | 0xA000..=0xA4CF   // Yi
        | 0xAC00..=0xD7A3   // Hangul syllables
        | 0xF900..=0xFAFF   // CJK compatibility ideographs
        | 0xFE30..=0xFE4F   // CJK compatibility forms
        | 0xFF00..=0xFF60   // Fullwidth forms
        | 0x20000..=0x2FA1F // CJK Extensions B and beyond
    )
}

/// Estimate the token cost of a piece of text.
///
/// Scans and classifies each character, accumulates weighted counts, and
/// rounds the sum up. Non-empty text always costs at least one token; empty
/// text costs zero.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    let mut narrow = 0usize;
    let mut wide = 0usize;
    for c in text.chars() {
        if is_wide_char(c) {
            wide += 1;
        } else {
            narrow += 1;
        }
    }

    let weighted = narrow as f64 / LATIN_CHARS_PER_TOKEN + wide as f64 * WIDE_TOKENS_PER_CHAR;
    (weighted.ceil() as usize).max(1)
}

/// Estimate the token cost of a single message, including role framing
/// overhead and per-block tool framing.
pub fn estimate_message_tokens(message: &Message) -> usize {
    let content_tokens = match &message.content {
        MessageContent::Text(t) => estimate_tokens(t),
        MessageContent::Blocks(blocks) => blocks
            .iter()
            .map(|b| match b {
                ContentBlock::Text { text } => estimate_tokens(text),
                ContentBlock::ToolUse { name, input } => {
                    let args = serde_json::to_string(input).unwrap_or_default();
                    estimate_tokens(name) + estimate_tokens(&args) + TOOL_BLOCK_OVERHEAD_TOKENS
                }
                ContentBlock::ToolResult { output } => {
                    estimate_tokens(output) + TOOL_BLOCK_OVERHEAD_TOKENS
                }
            })
            .sum(),
    };

    content_tokens + MESSAGE_OVERHEAD_TOKENS
}

/// Sum of [`estimate_message_tokens`] across a sequence.
pub fn total_message_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

/// Count tokens for a full request: all messages plus the optional system
/// prompt, with the remaining budget against `max_tokens`.
pub fn count_tokens(
    messages: &[Message],
    system_prompt: Option<&str>,
    max_tokens: usize,
) -> TokenCount {
    let message_tokens = total_message_tokens(messages);
    let system_tokens = system_prompt.map_or(0, estimate_tokens);
    let total = message_tokens + system_tokens;

    TokenCount {
        messages: message_tokens,
        system_prompt: system_tokens,
        total,
        available: max_tokens as i64 - total as i64,
    }
}
