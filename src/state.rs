//! UI-agnostic conversation state types
//!
//! These structures are shared by the TUI and the one-shot CLI and don't
//! depend on any rendering surface.

use serde::{Deserialize, Serialize};

/// A single transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub content: String,
    pub is_user: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_user: true,
            timestamp: Some(timestamp.into()),
        }
    }

    pub fn bot(content: impl Into<String>, timestamp: Option<String>) -> Self {
        Self {
            content: content.into(),
            is_user: false,
            timestamp,
        }
    }
}

/// A prior question as listed in the sidebar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub question: String,
}

/// Everything the view needs to draw the conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub history: Vec<HistoryEntry>,
    pub draft_input: String,
    pub is_sending: bool,
    pub is_history_loading: bool,
    pub is_clearing: bool,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }
}
