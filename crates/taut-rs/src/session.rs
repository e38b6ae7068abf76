//! Append-only session transcripts with JSON persistence.
//!
//! The session driver owns the message history; the context engine only
//! reads it. [`SessionHistory`] is that owned store: messages append in
//! arrival order, compression passes replace the sequence wholesale, and
//! the whole transcript saves to and loads from a single JSON file.

use crate::Message;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Transcript file format version.
const TRANSCRIPT_VERSION: u32 = 1;

/// On-disk shape of a saved transcript.
#[derive(Serialize, Deserialize, Debug)]
struct Transcript {
    version: u32,
    system_prompt: Option<String>,
    messages: Vec<Message>,
}

/// The owned, append-only message store for one conversation.
///
/// Mutation is restricted to appending and to wholesale replacement with a
/// compressed sequence; individual messages are never edited in place.
#[derive(Debug, Default, Clone)]
pub struct SessionHistory {
    system_prompt: Option<String>,
    messages: Vec<Message>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the system prompt tracked alongside the history.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a message in arrival order.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Replace the whole sequence with a compressed one.
    pub fn replace_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Atomic save: serialize to a temp file, then rename into place.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)
                .map_err(|e| format!("Failed to create transcript dir: {e}"))?;
        }

        let transcript = Transcript {
            version: TRANSCRIPT_VERSION,
            system_prompt: self.system_prompt.clone(),
            messages: self.messages.clone(),
        };
        let json = serde_json::to_string_pretty(&transcript)
            .map_err(|e| format!("Failed to serialize transcript: {e}"))?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)
            .map_err(|e| format!("Failed to write temp transcript: {e}"))?;
        std::fs::rename(&tmp_path, path)
            .map_err(|e| format!("Failed to rename transcript: {e}"))?;

        Ok(())
    }

    /// Load a transcript saved by [`SessionHistory::save`].
    pub fn load(path: &Path) -> Result<Self, String> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read transcript: {e}"))?;
        let transcript: Transcript =
            serde_json::from_str(&json).map_err(|e| format!("Failed to parse transcript: {e}"))?;

        if transcript.version != TRANSCRIPT_VERSION {
            return Err(format!(
                "Unsupported transcript version {} (expected {TRANSCRIPT_VERSION})",
                transcript.version
            ));
        }

        Ok(Self {
            system_prompt: transcript.system_prompt,
            messages: transcript.messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageRole;

    #[test]
    fn push_preserves_arrival_order() {
        let mut history = SessionHistory::new();
        history.push(Message::user("first"));
        history.push(Message::assistant_text("second"));
        history.push(Message::user("third"));

        assert_eq!(history.len(), 3);
        assert_eq!(history.messages()[0].text(), "first");
        assert_eq!(history.messages()[2].text(), "third");
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.json");

        let mut history = SessionHistory::new().with_system_prompt("Be helpful.");
        history.push(Message::user("hello"));
        history.push(Message::assistant_text("hi there"));
        history.save(&path).unwrap();

        let loaded = SessionHistory::load(&path).unwrap();
        assert_eq!(loaded.system_prompt(), Some("Be helpful."));
        assert_eq!(loaded.messages(), history.messages());
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.json");

        let mut history = SessionHistory::new();
        history.push(Message::user("x"));
        history.save(&path).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("t.json");

        SessionHistory::new().save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn replace_messages_swaps_sequence() {
        let mut history = SessionHistory::new();
        for i in 0..10 {
            history.push(Message::user(format!("m{i}")));
        }
        let compressed: Vec<Message> = history.messages()[5..].to_vec();
        history.replace_messages(compressed);

        assert_eq!(history.len(), 5);
        assert_eq!(history.messages()[0].text(), "m5");
    }

    #[test]
    fn load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = SessionHistory::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.contains("Failed to read"));
    }

    #[test]
    fn load_malformed_json_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = SessionHistory::load(&path).unwrap_err();
        assert!(err.contains("Failed to parse"));
    }

    #[test]
    fn load_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.json");
        std::fs::write(
            &path,
            r#"{"version": 99, "system_prompt": null, "messages": []}"#,
        )
        .unwrap();

        let err = SessionHistory::load(&path).unwrap_err();
        assert!(err.contains("Unsupported transcript version"));
    }

    #[test]
    fn roundtrip_preserves_roles_and_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");

        let mut history = SessionHistory::new();
        history.push(Message::system("rules"));
        history.push(Message::assistant_blocks(vec![
            crate::ContentBlock::ToolUse {
                name: "bash".into(),
                input: serde_json::json!({"command": "ls"}),
            },
        ]));
        history.save(&path).unwrap();

        let loaded = SessionHistory::load(&path).unwrap();
        assert_eq!(loaded.messages()[0].role, MessageRole::System);
        assert!(loaded.messages()[1].content.has_tool_blocks());
    }
}
