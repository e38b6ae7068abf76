//! Message importance scoring for compression decisions.
//!
//! The design rationale: preserve instructions and recent context, decay
//! older turns. System messages always score at the maximum and map to the
//! `critical` tier. User and assistant messages start from a moderate base,
//! gain a recency bonus that grows monotonically toward the end of the
//! sequence, and a small content-marker bonus when they carry code fences,
//! error/warning keywords, or recorded tool invocations.
//!
//! All scoring magnitudes and tier cut points are tunable constants exposed
//! through [`ScoringConfig`], not hidden magic numbers.

use crate::context::estimator::estimate_message_tokens;
use crate::{Message, MessageRole};
use serde::{Deserialize, Serialize};

/// Content markers that suggest likely future relevance.
const MARKER_KEYWORDS: &[&str] = &["error", "warning", "failed", "exception", "panic"];

/// Tunable scoring constants.
///
/// The defaults place non-system scores in roughly `[0.40, 0.90]`:
/// base 0.40–0.45, up to 0.35 recency bonus, up to 0.10 marker bonus.
/// Tier cut points partition that range into three roughly equal bands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Score assigned to system messages (the maximum).
    pub system_base: f64,
    /// Base score for user messages.
    pub user_base: f64,
    /// Base score for assistant messages.
    pub assistant_base: f64,
    /// Weight of the normalized recency bonus (0 = oldest, 1 = most recent).
    pub recency_weight: f64,
    /// Additive bonus for content markers (code fences, error keywords,
    /// tool-invocation records).
    pub marker_bonus: f64,
    /// Minimum score for the `high` tier.
    pub high_cutoff: f64,
    /// Minimum score for the `medium` tier.
    pub medium_cutoff: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            system_base: 1.0,
            user_base: 0.45,
            assistant_base: 0.40,
            recency_weight: 0.35,
            marker_bonus: 0.10,
            high_cutoff: 0.72,
            medium_cutoff: 0.55,
        }
    }
}

/// Categorical importance bucket derived from the continuous score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportanceTier {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for ImportanceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportanceTier::Low => write!(f, "low"),
            ImportanceTier::Medium => write!(f, "medium"),
            ImportanceTier::High => write!(f, "high"),
            ImportanceTier::Critical => write!(f, "critical"),
        }
    }
}

/// Ephemeral scored view of a message, computed per compression pass.
#[derive(Debug, Clone)]
pub struct ScoredMessage {
    pub message: Message,
    pub score: f64,
    pub tier: ImportanceTier,
    pub estimated_tokens: usize,
}

/// Assigns importance scores and tiers to messages.
#[derive(Debug, Default)]
pub struct ImportanceScorer {
    config: ScoringConfig,
}

impl ImportanceScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score a single message at position `index` in a sequence of
    /// `total` messages.
    ///
    /// For two same-role messages with equivalent content, the strictly more
    /// recent one never scores lower (non-strict recency monotonicity).
    pub fn score_message(&self, message: &Message, index: usize, total: usize) -> ScoredMessage {
        let cfg = &self.config;

        let (score, tier) = if message.role == MessageRole::System {
            // System messages are always critical, regardless of position.
            (cfg.system_base, ImportanceTier::Critical)
        } else {
            let base = match message.role {
                MessageRole::User => cfg.user_base,
                MessageRole::Assistant => cfg.assistant_base,
                MessageRole::System => unreachable!(),
            };

            // Normalized recency: 0 = oldest, 1 = most recent.
            let recency = if total > 1 {
                index as f64 / (total - 1) as f64
            } else {
                1.0
            };

            let mut score = base + cfg.recency_weight * recency;
            if has_content_markers(message) {
                score += cfg.marker_bonus;
            }

            let tier = if score >= cfg.high_cutoff {
                ImportanceTier::High
            } else if score >= cfg.medium_cutoff {
                ImportanceTier::Medium
            } else {
                ImportanceTier::Low
            };
            (score, tier)
        };

        ScoredMessage {
            message: message.clone(),
            score,
            tier,
            estimated_tokens: estimate_message_tokens(message),
        }
    }

    /// Score every message in a sequence.
    pub fn score_messages(&self, messages: &[Message]) -> Vec<ScoredMessage> {
        let total = messages.len();
        messages
            .iter()
            .enumerate()
            .map(|(i, m)| self.score_message(m, i, total))
            .collect()
    }
}

/// Whether the message carries structured markers: code fences, error or
/// warning keywords, or tool-invocation records.
fn has_content_markers(message: &Message) -> bool {
    if message.content.has_tool_blocks() {
        return true;
    }
    let text = message.text();
    if text.contains("```") {
        return true;
    }
    let lower = text.to_lowercase();
    MARKER_KEYWORDS.iter().any(|kw| lower.contains(kw))
}
