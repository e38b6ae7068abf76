//! Context window management engine for LLM agent runtimes.
//!
//! `taut-rs` keeps a long-running conversation inside a fixed token budget.
//! It estimates token consumption across heterogeneous message content,
//! scores message importance, and applies lossy compression strategies —
//! without losing the semantically critical parts of the history (system
//! instructions, recent turns, referenced file fragments).
//!
//! The engine is a pure library: data in, data out. The session driver owns
//! the message history; the engine reads it and produces reduced sequences.
//! There is no I/O, no network, and no async inside the engine — every
//! operation is a bounded, deterministic computation over an in-memory
//! message list.
//!
//! # Getting started
//!
//! ```
//! use taut_rs::prelude::*;
//!
//! let mut manager = ContextManager::new(ContextConfig::default());
//!
//! let messages = vec![
//!     Message::system("You are a helpful coding assistant."),
//!     Message::user("Read src/main.rs and summarize it."),
//! ];
//!
//! let state = manager.context_window_state(&messages, None);
//! assert!(!state.needs_compression);
//!
//! let outcome = manager.auto_manage_context(&messages);
//! assert!(!outcome.compressed);
//! ```
//!
//! # Where to find things
//!
//! If you're looking for how to...
//!
//! - **Estimate token cost:** see [`context::estimator`] —
//!   [`estimate_tokens`](context::estimator::estimate_tokens),
//!   [`estimate_message_tokens`](context::estimator::estimate_message_tokens),
//!   and [`count_tokens`](context::estimator::count_tokens) for the full
//!   [`TokenCount`](context::estimator::TokenCount) breakdown.
//!
//! - **Rank messages by importance:** see
//!   [`ImportanceScorer`](context::scorer::ImportanceScorer) and
//!   [`ScoredMessage`](context::scorer::ScoredMessage). Tunable constants
//!   live in [`ScoringConfig`](context::scorer::ScoringConfig).
//!
//! - **Compress a history:** see [`ContextManager`](context::engine::ContextManager)
//!   with a [`CompressionConfig`](context::engine::CompressionConfig) — four
//!   strategies (`remove_old`, `truncate`, `summarize`, `smart`), always
//!   best-effort, never an error.
//!
//! - **Decide when to compress:** see
//!   [`ContextWindowMonitor`](context::monitor::ContextWindowMonitor) and
//!   [`ContextWindowState`](context::monitor::ContextWindowState), or let
//!   [`ContextManager::auto_manage_context`](context::engine::ContextManager::auto_manage_context)
//!   make the call once per turn.
//!
//! - **Pull relevant file excerpts:** see
//!   [`extract_file_fragments`](context::fragments::extract_file_fragments).
//!
//! - **Persist a transcript:** see [`SessionHistory`](session::SessionHistory)
//!   for the append-only store plus JSON load/save.
//!
//! # Design principles
//!
//! 1. **Context is the scarcest resource.** Every component treats the
//!    context window as a finite budget to be spent deliberately.
//!
//! 2. **Graceful degradation over failure.** The engine sits in the hot
//!    per-turn path; it never errors for in-range input. Under-achieved
//!    compression is signalled through the returned token counts, not
//!    through an error kind.
//!
//! 3. **Compression never grows the history.** Every strategy guarantees
//!    `compressed_tokens <= original_tokens`, falling back to the unchanged
//!    input when a reduction cannot be found.
//!
//! 4. **Observability over magic.** Compression passes log what they decided
//!    (strategy, tokens before/after, messages removed) via `tracing`.

pub mod context;
pub mod prelude;
pub mod session;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single block of structured message content.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text { text: String },
    /// A recorded tool invocation (name + JSON arguments).
    ToolUse {
        name: String,
        input: serde_json::Value,
    },
    /// The output of a tool invocation.
    ToolResult { output: String },
}

/// Message content: plain text in the common case, or a sequence of
/// structured blocks when the turn carried tool activity.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// Flatten the content to a single text rendering. Tool-use blocks are
    /// rendered as `name(args)` records so scoring and summarization can see
    /// them.
    pub fn flattened_text(&self) -> String {
        match self {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Blocks(blocks) => {
                let parts: Vec<String> = blocks
                    .iter()
                    .map(|b| match b {
                        ContentBlock::Text { text } => text.clone(),
                        ContentBlock::ToolUse { name, input } => {
                            format!("[tool: {name}({input})]")
                        }
                        ContentBlock::ToolResult { output } => output.clone(),
                    })
                    .collect();
                parts.join("\n")
            }
        }
    }

    /// Whether the content contains any tool-use or tool-result blocks.
    pub fn has_tool_blocks(&self) -> bool {
        match self {
            MessageContent::Text(_) => false,
            MessageContent::Blocks(blocks) => blocks.iter().any(|b| {
                matches!(
                    b,
                    ContentBlock::ToolUse { .. } | ContentBlock::ToolResult { .. }
                )
            }),
        }
    }
}

/// A message in the conversation history.
///
/// Messages are owned by the caller's session history. The context engine
/// never mutates a message in place — compression always produces a new
/// sequence, and deletion only ever means exclusion from a compressed result.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    /// Unique identifier, assigned at construction.
    pub id: String,
    pub role: MessageRole,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
}

/// Process-local monotonic counter for message ids.
static MESSAGE_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_message_id() -> String {
    let n = MESSAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("msg-{n}")
}

impl Message {
    fn new(role: MessageRole, content: MessageContent) -> Self {
        Self {
            id: next_message_id(),
            role,
            content,
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, MessageContent::Text(content.into()))
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, MessageContent::Text(content.into()))
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, MessageContent::Text(content.into()))
    }

    /// An assistant message carrying structured content blocks.
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self::new(MessageRole::Assistant, MessageContent::Blocks(blocks))
    }

    /// A user message carrying structured content blocks (e.g. tool results
    /// echoed back into the conversation).
    pub fn user_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self::new(MessageRole::User, MessageContent::Blocks(blocks))
    }

    /// Flattened text rendering of the content.
    pub fn text(&self) -> String {
        self.content.flattened_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("hello");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.text(), "hello");

        let user = Message::user("world");
        assert_eq!(user.role, MessageRole::User);

        let assist = Message::assistant_text("reply");
        assert_eq!(assist.role, MessageRole::Assistant);
        assert_eq!(assist.text(), "reply");
    }

    #[test]
    fn message_ids_are_unique() {
        let a = Message::user("a");
        let b = Message::user("b");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn flattened_text_renders_tool_blocks() {
        let msg = Message::assistant_blocks(vec![
            ContentBlock::Text {
                text: "Let me check.".into(),
            },
            ContentBlock::ToolUse {
                name: "read_file".into(),
                input: serde_json::json!({"path": "src/main.rs"}),
            },
        ]);
        let text = msg.text();
        assert!(text.contains("Let me check."));
        assert!(text.contains("read_file"));
        assert!(text.contains("src/main.rs"));
    }

    #[test]
    fn has_tool_blocks_detection() {
        let plain = Message::user("no tools here");
        assert!(!plain.content.has_tool_blocks());

        let with_tools = Message::assistant_blocks(vec![ContentBlock::ToolResult {
            output: "ok".into(),
        }]);
        assert!(with_tools.content.has_tool_blocks());
    }

    #[test]
    fn message_serde_roundtrip() {
        let msg = Message::user("Hello, how are you?");
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn content_blocks_serde_tagged() {
        let block = ContentBlock::ToolUse {
            name: "grep".into(),
            input: serde_json::json!({"pattern": "TODO"}),
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_use");
        assert_eq!(json["name"], "grep");
    }
}
