//! The compression engine: multi-strategy reduction of message histories.
//!
//! [`ContextManager`] orchestrates the other context components. Given a
//! message sequence, a token budget, and a strategy, it produces a reduced
//! sequence satisfying the budget — or the best achievable approximation.
//! Compression is always lossy-but-best-effort, never an error: when the
//! target cannot be met (a single oversized message, nothing droppable
//! left), the engine returns what it has and lets the caller inspect the
//! token counts.
//!
//! Postconditions for every strategy:
//! - output order is preserved relative to input (no reordering);
//! - system messages survive whenever `keep_system_messages` is set;
//! - `compressed_tokens <= original_tokens`, falling back to the unchanged
//!   input when no reduction was found.
//!
//! The manager owns the append-only summary log — an instance field, never
//! process-global state. Callers running multiple interleaved sessions in
//! one process give each its own manager.

use crate::context::estimator::{estimate_message_tokens, total_message_tokens};
use crate::context::monitor::{ContextConfig, ContextWindowMonitor, ContextWindowState};
use crate::context::scorer::{ImportanceScorer, ImportanceTier, ScoringConfig};
use crate::context::summarizer::{ConversationSummary, Summarizer, SummarizerConfig};
use crate::{Message, MessageContent, MessageRole};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fraction of the effective budget targeted by automatic compression.
/// Compressing well below the trigger threshold spaces out compression
/// passes instead of re-triggering every turn.
const AUTO_RETAINED_FRACTION: f64 = 0.6;

/// Character prefix kept by the `truncate` strategy.
const TRUNCATE_KEEP_CHARS: usize = 240;

/// Marker appended to content shortened by the `truncate` strategy.
pub const TRUNCATION_MARKER: &str = "… [truncated]";

/// A policy for reducing message-sequence token cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionStrategy {
    /// Drop the oldest droppable messages entirely.
    RemoveOld,
    /// Keep every message but shorten old content to a bounded prefix.
    Truncate,
    /// Replace the old span with one synthetic summary message.
    Summarize,
    /// Hybrid: importance-ranked dropping with a summarization fallback.
    Smart,
}

impl std::fmt::Display for CompressionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompressionStrategy::RemoveOld => write!(f, "remove_old"),
            CompressionStrategy::Truncate => write!(f, "truncate"),
            CompressionStrategy::Summarize => write!(f, "summarize"),
            CompressionStrategy::Smart => write!(f, "smart"),
        }
    }
}

impl std::str::FromStr for CompressionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remove_old" => Ok(CompressionStrategy::RemoveOld),
            "truncate" => Ok(CompressionStrategy::Truncate),
            "summarize" => Ok(CompressionStrategy::Summarize),
            "smart" => Ok(CompressionStrategy::Smart),
            other => Err(format!(
                "unknown strategy '{other}' (expected remove_old, truncate, summarize, or smart)"
            )),
        }
    }
}

/// Per-pass compression parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub strategy: CompressionStrategy,
    /// Token budget the pass tries to reach.
    pub target_tokens: usize,
    /// Most-recent messages kept verbatim by every strategy.
    pub keep_recent_messages: usize,
    /// Retain every system message regardless of position.
    pub keep_system_messages: bool,
    /// Allow the `summarize`/`smart` strategies to build a synthetic
    /// summary message.
    pub generate_summary: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        let ctx = ContextConfig::default();
        Self {
            strategy: CompressionStrategy::Smart,
            target_tokens: (ctx.effective_max_tokens() as f64 * AUTO_RETAINED_FRACTION) as usize,
            keep_recent_messages: ctx.keep_recent_messages,
            keep_system_messages: true,
            generate_summary: true,
        }
    }
}

/// Outcome of one compression pass.
#[derive(Debug, Clone)]
pub struct CompressionResult {
    /// The reduced sequence, input order preserved.
    pub messages: Vec<Message>,
    /// Original messages no longer present in the output (the synthetic
    /// summary message counts as present, not removed).
    pub removed_count: usize,
    pub original_tokens: usize,
    pub compressed_tokens: usize,
    pub saved_tokens: usize,
    /// Summary generated during this pass, when any. Present even when the
    /// strategy fell back without inserting a synthetic message.
    pub summary: Option<ConversationSummary>,
}

/// Outcome of once-per-turn automatic context management.
#[derive(Debug, Clone)]
pub struct AutoManageOutcome {
    pub compressed: bool,
    /// The history to send: the input (value-equal, not reference-identical)
    /// when no compression ran, otherwise the reduced sequence.
    pub messages: Vec<Message>,
    pub result: Option<CompressionResult>,
}

/// Orchestrator for context compression.
///
/// Owns the monitor, scorer, summarizer, and the append-only summary log.
/// All operations are synchronous and total; the caller (the session loop)
/// is responsible for running at most one compression pass per conversation
/// at a time.
#[derive(Debug, Default)]
pub struct ContextManager {
    monitor: ContextWindowMonitor,
    scorer: ImportanceScorer,
    summarizer: Summarizer,
    summaries: Vec<ConversationSummary>,
}

impl ContextManager {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            monitor: ContextWindowMonitor::new(config),
            scorer: ImportanceScorer::new(),
            summarizer: Summarizer::new(),
            summaries: Vec::new(),
        }
    }

    /// Override the scoring constants.
    pub fn with_scoring_config(mut self, config: ScoringConfig) -> Self {
        self.scorer = ImportanceScorer::with_config(config);
        self
    }

    /// Override the summarizer configuration.
    pub fn with_summarizer_config(mut self, config: SummarizerConfig) -> Self {
        self.summarizer = Summarizer::with_config(config);
        self
    }

    pub fn config(&self) -> &ContextConfig {
        self.monitor.config()
    }

    /// Current window state for a history and optional system prompt.
    pub fn context_window_state(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
    ) -> ContextWindowState {
        self.monitor.context_window_state(messages, system_prompt)
    }

    /// Whether usage has reached the mandatory compression threshold.
    pub fn needs_compression(&self, messages: &[Message]) -> bool {
        self.monitor
            .context_window_state(messages, None)
            .needs_compression
    }

    /// All summaries generated so far, oldest first.
    pub fn summaries(&self) -> &[ConversationSummary] {
        &self.summaries
    }

    pub fn clear_summaries(&mut self) {
        self.summaries.clear();
    }

    /// Run one compression pass with the given strategy and budget.
    ///
    /// Always returns a result; when the target cannot be met the result is
    /// the best achievable reduction (possibly the unchanged input).
    pub fn compress_messages(
        &mut self,
        messages: &[Message],
        config: &CompressionConfig,
    ) -> CompressionResult {
        let original_tokens = total_message_tokens(messages);

        let (output, summary, synthetic) = match config.strategy {
            CompressionStrategy::RemoveOld => (self.remove_old(messages, config), None, false),
            CompressionStrategy::Truncate => (self.truncate(messages, config), None, false),
            CompressionStrategy::Summarize => self.summarize(messages, config),
            CompressionStrategy::Smart => self.smart(messages, config),
        };

        if let Some(ref s) = summary {
            self.summaries.push(s.clone());
        }

        let compressed_tokens = total_message_tokens(&output);
        if compressed_tokens > original_tokens {
            // Compression must never grow the history. Keep the input.
            debug!(
                "compression pass grew the history ({original_tokens} -> {compressed_tokens} \
                 tokens); keeping input unchanged"
            );
            return CompressionResult {
                messages: messages.to_vec(),
                removed_count: 0,
                original_tokens,
                compressed_tokens: original_tokens,
                saved_tokens: 0,
                summary,
            };
        }

        let kept_original = output.len() - usize::from(synthetic);
        let result = CompressionResult {
            removed_count: messages.len().saturating_sub(kept_original),
            original_tokens,
            compressed_tokens,
            saved_tokens: original_tokens - compressed_tokens,
            messages: output,
            summary,
        };
        debug!(
            "compression: strategy={} tokens {} -> {} (target {}), removed {} of {} messages",
            config.strategy,
            result.original_tokens,
            result.compressed_tokens,
            config.target_tokens,
            result.removed_count,
            messages.len(),
        );
        result
    }

    /// Once-per-turn automatic management: compress with the `smart`
    /// strategy when the monitor says usage crossed the threshold,
    /// otherwise hand the history back untouched.
    pub fn auto_manage_context(&mut self, messages: &[Message]) -> AutoManageOutcome {
        if !self.needs_compression(messages) {
            return AutoManageOutcome {
                compressed: false,
                messages: messages.to_vec(),
                result: None,
            };
        }

        let config = CompressionConfig {
            strategy: CompressionStrategy::Smart,
            target_tokens: (self.config().effective_max_tokens() as f64 * AUTO_RETAINED_FRACTION)
                as usize,
            keep_recent_messages: self.config().keep_recent_messages,
            keep_system_messages: true,
            generate_summary: true,
        };
        let result = self.compress_messages(messages, &config);

        AutoManageOutcome {
            compressed: true,
            messages: result.messages.clone(),
            result: Some(result),
        }
    }

    // ── Strategies ─────────────────────────────────────────────────

    /// Drop older non-retained messages from the oldest end until the
    /// budget is met or nothing droppable remains.
    fn remove_old(&self, messages: &[Message], config: &CompressionConfig) -> Vec<Message> {
        let len = messages.len();
        let tail_start = len.saturating_sub(config.keep_recent_messages);

        let mut kept = vec![true; len];
        let mut total = total_message_tokens(messages);
        for i in 0..len {
            if total <= config.target_tokens {
                break;
            }
            if is_protected(messages, i, tail_start, config.keep_system_messages) {
                continue;
            }
            kept[i] = false;
            total -= estimate_message_tokens(&messages[i]);
        }

        messages
            .iter()
            .zip(kept)
            .filter_map(|(m, keep)| keep.then(|| m.clone()))
            .collect()
    }

    /// Keep every message but shorten old content to a bounded prefix,
    /// oldest first, until the budget is met or nothing truncatable remains.
    fn truncate(&self, messages: &[Message], config: &CompressionConfig) -> Vec<Message> {
        let len = messages.len();
        let tail_start = len.saturating_sub(config.keep_recent_messages);

        let mut out = messages.to_vec();
        let mut total = total_message_tokens(&out);
        for i in 0..len {
            if total <= config.target_tokens {
                break;
            }
            if is_protected(messages, i, tail_start, config.keep_system_messages) {
                continue;
            }
            let text = out[i].text();
            if text.chars().count() <= TRUNCATE_KEEP_CHARS {
                continue;
            }

            let prefix: String = text.chars().take(TRUNCATE_KEEP_CHARS).collect();
            let before = estimate_message_tokens(&out[i]);
            out[i].content = MessageContent::Text(format!("{prefix}{TRUNCATION_MARKER}"));
            total = total - before + estimate_message_tokens(&out[i]);
        }
        out
    }

    /// Replace the old span with one synthetic assistant-authored summary
    /// message. Falls back to `remove_old` when summarization is disabled,
    /// there is nothing to summarize, or the summary failed to shrink.
    fn summarize(
        &self,
        messages: &[Message],
        config: &CompressionConfig,
    ) -> (Vec<Message>, Option<ConversationSummary>, bool) {
        let len = messages.len();
        let tail_start = len.saturating_sub(config.keep_recent_messages);

        let old_indices: Vec<usize> = (0..tail_start)
            .filter(|&i| !(config.keep_system_messages && messages[i].role == MessageRole::System))
            .collect();

        if !config.generate_summary || old_indices.is_empty() {
            return (self.remove_old(messages, config), None, false);
        }

        let old_span: Vec<Message> = old_indices.iter().map(|&i| messages[i].clone()).collect();
        let summary = self.summarizer.generate_summary(&old_span);

        if summary.summary_tokens >= total_message_tokens(&old_span) {
            // Shrink guarantee failed; dropping outright is the safer
            // strategy. The summary is still surfaced to the caller.
            debug!(
                "summary did not shrink its span ({} >= {} tokens); falling back to remove_old",
                summary.summary_tokens, summary.original_tokens,
            );
            return (self.remove_old(messages, config), Some(summary), false);
        }

        let mut dropped = vec![false; len];
        for &i in &old_indices {
            dropped[i] = true;
        }
        let first_old = old_indices[0];

        let mut out = Vec::with_capacity(len - old_indices.len() + 1);
        for (i, msg) in messages.iter().enumerate() {
            if i == first_old {
                out.push(synthetic_summary_message(&summary));
            }
            if !dropped[i] {
                out.push(msg.clone());
            }
        }
        (out, Some(summary), true)
    }

    /// Importance-ranked hybrid: retain the critical tier and the recency
    /// tail, drop the lowest-scored of the rest until under budget, and
    /// summarize the dropped span when even that was not enough.
    fn smart(
        &self,
        messages: &[Message],
        config: &CompressionConfig,
    ) -> (Vec<Message>, Option<ConversationSummary>, bool) {
        let len = messages.len();
        let tail_start = len.saturating_sub(config.keep_recent_messages);
        let scored = self.scorer.score_messages(messages);

        // Droppable: outside the recency tail and below the critical tier.
        // Lowest score drops first; ties drop the older message.
        let mut candidates: Vec<usize> = (0..len)
            .filter(|&i| i < tail_start && scored[i].tier != ImportanceTier::Critical)
            .collect();
        candidates.sort_by(|&a, &b| {
            scored[a]
                .score
                .partial_cmp(&scored[b].score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        let mut kept = vec![true; len];
        let mut total = total_message_tokens(messages);
        for &i in &candidates {
            if total <= config.target_tokens {
                break;
            }
            kept[i] = false;
            total -= scored[i].estimated_tokens;
        }

        let dropped_indices: Vec<usize> = (0..len).filter(|&i| !kept[i]).collect();

        // Still over budget with everything droppable gone: summarize the
        // dropped span so its information is not lost entirely.
        let mut summary = None;
        let mut insert_summary = false;
        if total > config.target_tokens
            && config.generate_summary
            && !dropped_indices.is_empty()
        {
            let dropped_span: Vec<Message> = dropped_indices
                .iter()
                .map(|&i| messages[i].clone())
                .collect();
            let s = self.summarizer.generate_summary(&dropped_span);
            insert_summary = s.summary_tokens < total_message_tokens(&dropped_span);
            summary = Some(s);
        }

        let first_dropped = dropped_indices.first().copied();
        let mut out = Vec::with_capacity(len - dropped_indices.len() + 1);
        for (i, msg) in messages.iter().enumerate() {
            if insert_summary
                && Some(i) == first_dropped
                && let Some(ref s) = summary
            {
                out.push(synthetic_summary_message(s));
            }
            if kept[i] {
                out.push(msg.clone());
            }
        }
        (out, summary, insert_summary)
    }
}

/// Whether message `i` is protected from dropping/truncation: inside the
/// recency tail, or a retained system message.
fn is_protected(messages: &[Message], i: usize, tail_start: usize, keep_system: bool) -> bool {
    i >= tail_start || (keep_system && messages[i].role == MessageRole::System)
}

/// The synthetic assistant-authored message carrying a span summary.
fn synthetic_summary_message(summary: &ConversationSummary) -> Message {
    Message::assistant_text(format!(
        "<conversation_summary>\n{}\n</conversation_summary>",
        summary.content
    ))
}
