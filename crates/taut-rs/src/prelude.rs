//! Convenience re-exports for common `taut-rs` types.
//!
//! Meant to be glob-imported by session drivers:
//!
//! ```ignore
//! use taut_rs::prelude::*;
//! ```
//!
//! This pulls in the types needed for the vast majority of callers: the
//! [`Message`] constructors, the [`ContextManager`] with its compression
//! config and result types, the window monitor, and the session store.
//! Specialized types (scoring constants, summarizer config, fragment
//! extraction) are intentionally excluded — import those from their modules
//! directly when needed.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{ContentBlock, Message, MessageContent, MessageRole};

// ── Context management ──────────────────────────────────────────────
pub use crate::context::{
    AutoManageOutcome, CompressionConfig, CompressionResult, CompressionStrategy, ContextConfig,
    ContextManager, ContextWindowMonitor, ContextWindowState,
};

// ── Session store ───────────────────────────────────────────────────
pub use crate::session::SessionHistory;
