//! Chat view messages

use mist_api::{StoredMessage, StoredRole};
use serde::{Deserialize, Serialize};

use crate::emotion::{Emotion, extract_emotion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the chat view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Set on messages recorded from a tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// False while an assistant message is still receiving deltas
    pub complete: bool,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_name: None,
            complete: true,
        }
    }

    /// A finished assistant message (history rows, REST replies)
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_name: None,
            complete: true,
        }
    }

    /// An assistant message that is still streaming
    pub fn streaming(content: impl Into<String>) -> Self {
        Self {
            complete: false,
            ..Self::assistant(content)
        }
    }

    pub fn is_streaming_assistant(&self) -> bool {
        self.role == Role::Assistant && !self.complete
    }

    /// Emotion and display text. User messages are shown verbatim.
    pub fn display(&self) -> (Emotion, String) {
        match self.role {
            Role::User => (Emotion::Neutral, self.content.clone()),
            Role::Assistant => extract_emotion(&self.content),
        }
    }
}

impl From<StoredMessage> for ChatMessage {
    fn from(stored: StoredMessage) -> Self {
        let role = match stored.role {
            StoredRole::User => Role::User,
            StoredRole::Assistant | StoredRole::Tool | StoredRole::Other => Role::Assistant,
        };
        Self {
            role,
            content: stored.content,
            tool_name: stored.tool_name,
            complete: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn stored(role: StoredRole, content: &str, tool_name: Option<&str>) -> StoredMessage {
        StoredMessage {
            id: Uuid::new_v4(),
            role,
            content: content.to_string(),
            tool_name: tool_name.map(str::to_string),
            created_at: None,
        }
    }

    #[test]
    fn test_history_rows_are_complete() {
        let user: ChatMessage = stored(StoredRole::User, "hi", None).into();
        assert_eq!(user, ChatMessage::user("hi"));

        let tool: ChatMessage = stored(StoredRole::Tool, "42", Some("calculator")).into();
        assert_eq!(tool.role, Role::Assistant);
        assert_eq!(tool.tool_name.as_deref(), Some("calculator"));
        assert!(tool.complete);
    }

    #[test]
    fn test_display_strips_emotion_for_assistant_only() {
        let reply = ChatMessage::assistant("<emotion>happy</emotion>Hello!");
        assert_eq!(reply.display(), (Emotion::Happy, "Hello!".to_string()));

        let user = ChatMessage::user("<happy>not parsed");
        assert_eq!(user.display(), (Emotion::Neutral, "<happy>not parsed".to_string()));
    }

    #[test]
    fn test_streaming_flag() {
        assert!(ChatMessage::streaming("x").is_streaming_assistant());
        assert!(!ChatMessage::assistant("x").is_streaming_assistant());
        assert!(!ChatMessage::user("x").is_streaming_assistant());
    }
}
