//! Context window management: estimation, scoring, compression, monitoring.
//!
//! The context window is the scarcest resource in any LLM agent. This module
//! provides layered strategies for keeping a conversation within budget:
//!
//! 1. **[`estimator`]** — heuristic token estimation over heterogeneous
//!    message content (no real tokenizer; ~4 Latin chars per token, heavier
//!    weight for CJK scripts, fixed per-message framing overhead).
//!
//! 2. **[`scorer`]** — per-message importance scoring: role base, recency
//!    bonus, content-marker bonus, mapped into categorical tiers.
//!
//! 3. **[`fragments`]** — query-relevant, line-ranged excerpts of file text,
//!    for assembling file context without injecting whole files.
//!
//! 4. **[`summarizer`]** — heuristic extractive summarization of message
//!    spans into a single compact [`ConversationSummary`].
//!
//! 5. **[`engine`]** — the [`ContextManager`] orchestrator: four compression
//!    strategies plus once-per-turn automatic management.
//!
//! 6. **[`monitor`]** — [`ContextWindowMonitor`] derives the live
//!    [`ContextWindowState`] (usage ratio, near-limit and must-compress
//!    signals) against the configured budget.
//!
//! All operations are synchronous, CPU-bound, and total: malformed or empty
//! input degrades to zeros and identity results, never to errors.

pub mod engine;
pub mod estimator;
pub mod fragments;
pub mod monitor;
pub mod scorer;
pub mod summarizer;

// Re-export commonly used items at the module level.
pub use engine::{
    AutoManageOutcome, CompressionConfig, CompressionResult, CompressionStrategy, ContextManager,
};
pub use estimator::{TokenCount, count_tokens, estimate_message_tokens, estimate_tokens};
pub use fragments::{FileFragment, extract_file_fragments};
pub use monitor::{ContextConfig, ContextWindowMonitor, ContextWindowState};
pub use scorer::{ImportanceScorer, ImportanceTier, ScoredMessage, ScoringConfig};
pub use summarizer::{ConversationSummary, Summarizer, SummarizerConfig};
