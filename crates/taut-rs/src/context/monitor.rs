//! Context window monitoring: live usage ratio against the configured budget.
//!
//! The monitor derives a fresh [`ContextWindowState`] on every call — the
//! history mutates between turns, so nothing is cached. Usage is computed
//! against the *effective* budget: the hard ceiling minus the fraction
//! reserved for anticipated tool output. The ratio is not capped at 1.0;
//! values above 1.0 signal overflow.

use crate::Message;
use crate::context::estimator::count_tokens;
use serde::{Deserialize, Serialize};

/// Engine configuration: token budget and thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Hard budget ceiling in tokens.
    pub max_tokens: usize,
    /// Fraction of the budget reserved for anticipated tool output; reduces
    /// the effective budget available to history.
    pub tool_output_reserve_ratio: f64,
    /// Usage fraction that triggers mandatory compression.
    pub compression_threshold: f64,
    /// Usage fraction for the early-warning band, below the compression
    /// threshold.
    pub near_limit_threshold: f64,
    /// Floor on verbatim-kept most-recent messages across all strategies.
    pub keep_recent_messages: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: 200_000,
            tool_output_reserve_ratio: 0.2,
            compression_threshold: 0.8,
            near_limit_threshold: 0.6,
            keep_recent_messages: 5,
        }
    }
}

impl ContextConfig {
    /// Override the hard budget ceiling.
    pub fn with_max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = max;
        self
    }

    /// Override the tool-output reserve ratio.
    pub fn with_tool_output_reserve_ratio(mut self, ratio: f64) -> Self {
        self.tool_output_reserve_ratio = ratio;
        self
    }

    /// Override the compression threshold.
    pub fn with_compression_threshold(mut self, threshold: f64) -> Self {
        self.compression_threshold = threshold;
        self
    }

    /// Override the near-limit (early warning) threshold.
    pub fn with_near_limit_threshold(mut self, threshold: f64) -> Self {
        self.near_limit_threshold = threshold;
        self
    }

    /// Override the verbatim-kept recent message floor.
    pub fn with_keep_recent_messages(mut self, n: usize) -> Self {
        self.keep_recent_messages = n;
        self
    }

    /// Effective budget: `max_tokens` minus the tool-output reserve.
    ///
    /// All threshold calculations use this value instead of the raw ceiling
    /// so the model always has room for anticipated tool output.
    pub fn effective_max_tokens(&self) -> usize {
        let reserve = self.tool_output_reserve_ratio.clamp(0.0, 1.0);
        (self.max_tokens as f64 * (1.0 - reserve)) as usize
    }
}

/// Snapshot of the context window at a point in time.
///
/// Threshold-driven booleans are recomputed on every call, never cached
/// across turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextWindowState {
    /// The raw budget ceiling (not the effective budget).
    pub max_tokens: usize,
    /// Estimated tokens consumed by history plus system prompt.
    pub used_tokens: usize,
    /// `used_tokens` over the effective budget; may exceed 1.0 on overflow.
    pub usage_percent: f64,
    /// Early warning: usage reached the near-limit band.
    pub near_limit: bool,
    /// Mandatory compression: usage reached the compression threshold.
    pub needs_compression: bool,
}

impl ContextWindowState {
    /// Format as a short log-friendly string.
    pub fn to_log_string(&self) -> String {
        format!(
            "context: ~{} tokens ({:.0}% of {}){}",
            self.used_tokens,
            self.usage_percent * 100.0,
            self.max_tokens,
            if self.needs_compression {
                ", needs compression"
            } else if self.near_limit {
                ", near limit"
            } else {
                ""
            },
        )
    }
}

/// Derives [`ContextWindowState`] from a message history.
#[derive(Debug, Clone, Default)]
pub struct ContextWindowMonitor {
    config: ContextConfig,
}

impl ContextWindowMonitor {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Compute the current window state for a history and optional system
    /// prompt.
    pub fn context_window_state(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
    ) -> ContextWindowState {
        let count = count_tokens(messages, system_prompt, self.config.max_tokens);
        let effective = self.config.effective_max_tokens();
        let usage_percent = if effective > 0 {
            count.total as f64 / effective as f64
        } else {
            1.0
        };

        ContextWindowState {
            max_tokens: self.config.max_tokens,
            used_tokens: count.total,
            usage_percent,
            near_limit: usage_percent >= self.config.near_limit_threshold,
            needs_compression: usage_percent >= self.config.compression_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    #[test]
    fn low_usage_raises_no_flags() {
        let monitor = ContextWindowMonitor::new(ContextConfig::default());
        let state = monitor.context_window_state(&[Message::user("hello")], None);
        assert!(!state.near_limit);
        assert!(!state.needs_compression);
        assert!(state.usage_percent < 0.01);
    }

    #[test]
    fn oversized_message_trips_both_thresholds() {
        // 30k ASCII chars -> ~7.5k tokens against a 10k budget with a 20%
        // reserve (effective 8k) -> ~94% usage.
        let monitor =
            ContextWindowMonitor::new(ContextConfig::default().with_max_tokens(10_000));
        let state = monitor.context_window_state(&[Message::user(&"x".repeat(30_000))], None);
        assert!(state.near_limit);
        assert!(state.needs_compression);
    }

    #[test]
    fn usage_can_exceed_one() {
        let monitor = ContextWindowMonitor::new(ContextConfig::default().with_max_tokens(100));
        let state = monitor.context_window_state(&[Message::user(&"x".repeat(4_000))], None);
        assert!(state.usage_percent > 1.0);
    }

    #[test]
    fn system_prompt_counts_toward_usage() {
        let monitor = ContextWindowMonitor::new(ContextConfig::default().with_max_tokens(1_000));
        let without = monitor.context_window_state(&[], None);
        let with = monitor.context_window_state(&[], Some(&"s".repeat(2_000)));
        assert_eq!(without.used_tokens, 0);
        assert!(with.used_tokens > 400);
    }

    #[test]
    fn reserve_shrinks_effective_budget() {
        let plain = ContextConfig::default()
            .with_max_tokens(100_000)
            .with_tool_output_reserve_ratio(0.0);
        let reserved = ContextConfig::default()
            .with_max_tokens(100_000)
            .with_tool_output_reserve_ratio(0.2);
        assert_eq!(plain.effective_max_tokens(), 100_000);
        assert_eq!(reserved.effective_max_tokens(), 80_000);

        // Same history, higher usage ratio with the reserve.
        let messages = vec![Message::user(&"a".repeat(100_000))];
        let u_plain = ContextWindowMonitor::new(plain).context_window_state(&messages, None);
        let u_reserved = ContextWindowMonitor::new(reserved).context_window_state(&messages, None);
        assert_eq!(u_plain.used_tokens, u_reserved.used_tokens);
        assert!(u_reserved.usage_percent > u_plain.usage_percent);
    }

    #[test]
    fn near_limit_band_precedes_compression() {
        // ~66% usage: inside the warning band, below the compression
        // threshold.
        let monitor =
            ContextWindowMonitor::new(ContextConfig::default().with_max_tokens(10_000));
        let state = monitor.context_window_state(&[Message::user(&"x".repeat(21_000))], None);
        assert!(state.near_limit);
        assert!(!state.needs_compression);
    }

    #[test]
    fn log_string_format() {
        let monitor = ContextWindowMonitor::new(ContextConfig::default());
        let state = monitor.context_window_state(&[Message::user("hello world")], None);
        let log = state.to_log_string();
        assert!(log.contains("context:"));
        assert!(log.contains("tokens"));
    }

    #[test]
    fn state_recomputed_per_call() {
        let monitor = ContextWindowMonitor::new(ContextConfig::default().with_max_tokens(1_000));
        let mut messages = vec![Message::user("short")];
        let before = monitor.context_window_state(&messages, None);
        messages.push(Message::user(&"y".repeat(4_000)));
        let after = monitor.context_window_state(&messages, None);
        assert!(after.used_tokens > before.used_tokens);
        assert!(after.needs_compression);
    }
}
