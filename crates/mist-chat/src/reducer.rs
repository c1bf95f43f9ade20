//! Folds streamed server events into the chat view state

use mist_api::ServerEvent;
use uuid::Uuid;

use crate::message::ChatMessage;

/// Live tool activity during a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub name: String,
    pub content: Option<String>,
    /// The assistant invoked this tool during the turn
    pub calling: bool,
    /// Waiting on the tool's result
    pub communicating: bool,
}

/// Everything the chat view renders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatState {
    pub messages: Vec<ChatMessage>,
    pub tool_status: Option<ToolStatus>,
    /// A tool call is in flight
    pub thinking: bool,
    /// A turn is in flight
    pub loading: bool,
}

/// Side effects requested by the reducer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// The server bound the connection to a conversation
    ConversationAssigned(Uuid),
    RefreshConversations,
    /// Tell the user something went wrong
    Notify(String),
}

impl ChatState {
    /// Replace the view with a loaded history
    pub fn load_history(&mut self, messages: Vec<ChatMessage>) {
        *self = ChatState {
            messages,
            ..ChatState::default()
        };
    }

    /// Reset to the empty new-chat view
    pub fn clear(&mut self) {
        *self = ChatState::default();
    }

    /// Append the user's message and mark the turn in flight
    pub fn begin_turn(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::user(text));
        self.loading = true;
    }

    /// Append a single-shot reply and end the turn
    pub fn complete_with(&mut self, reply: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(reply));
        self.end_turn();
    }

    /// End the turn after a transport failure
    pub fn fail_turn(&mut self) {
        self.end_turn();
    }

    fn end_turn(&mut self) {
        self.tool_status = None;
        self.thinking = false;
        self.loading = false;
    }

    /// The tail assistant message still receiving deltas, if any
    pub fn streaming_message(&self) -> Option<&ChatMessage> {
        self.messages.last().filter(|m| m.is_streaming_assistant())
    }
}

/// Apply one server event to the state, returning the effects to run.
pub fn reduce(state: &mut ChatState, event: &ServerEvent) -> Vec<Effect> {
    match event {
        ServerEvent::ConversationId { conversation_id } => {
            vec![
                Effect::ConversationAssigned(*conversation_id),
                Effect::RefreshConversations,
            ]
        }
        ServerEvent::ToolCall { name, .. } => {
            state.tool_status = Some(ToolStatus {
                name: name.clone(),
                content: None,
                calling: true,
                communicating: true,
            });
            state.thinking = true;
            vec![]
        }
        ServerEvent::Tool { name, content } => {
            let previous = state.tool_status.take();
            let name = name
                .clone()
                .or_else(|| previous.as_ref().map(|s| s.name.clone()))
                .unwrap_or_default();
            state.tool_status = Some(ToolStatus {
                name,
                content: Some(content.clone().unwrap_or_default()),
                calling: previous.as_ref().is_some_and(|s| s.calling),
                communicating: false,
            });
            vec![]
        }
        ServerEvent::Content { content } => {
            match state.messages.last_mut() {
                Some(last) if last.is_streaming_assistant() => last.content.push_str(content),
                _ => state.messages.push(ChatMessage::streaming(content.clone())),
            }
            vec![]
        }
        ServerEvent::Done => {
            if let Some(last) = state.messages.last_mut() {
                last.complete = true;
            }
            state.end_turn();
            vec![Effect::RefreshConversations]
        }
        ServerEvent::Error { message } => {
            state.end_turn();
            let message = if message.is_empty() {
                "The assistant failed to respond".to_string()
            } else {
                message.clone()
            };
            vec![Effect::Notify(message)]
        }
        ServerEvent::Unknown => {
            tracing::debug!("Ignoring unknown server event");
            vec![]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    fn content(s: &str) -> ServerEvent {
        ServerEvent::Content {
            content: s.to_string(),
        }
    }

    fn tool_call(name: &str) -> ServerEvent {
        ServerEvent::ToolCall {
            name: name.to_string(),
            args: serde_json::json!({}),
        }
    }

    fn tool(name: Option<&str>, out: &str) -> ServerEvent {
        ServerEvent::Tool {
            name: name.map(str::to_string),
            content: Some(out.to_string()),
        }
    }

    #[test]
    fn test_content_deltas_concatenate() {
        let mut state = ChatState::default();
        state.begin_turn("hi");
        for delta in ["Hel", "lo", ", ", "world", "lo"] {
            reduce(&mut state, &content(delta));
        }
        assert_eq!(state.messages.len(), 2);
        let last = state.messages.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "Hello, worldlo");
        assert!(!last.complete);
        assert!(state.streaming_message().is_some());
    }

    #[test]
    fn test_content_after_complete_starts_new_message() {
        let mut state = ChatState::default();
        state.load_history(vec![ChatMessage::assistant("earlier")]);
        reduce(&mut state, &content("new"));
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].content, "new");
    }

    #[test]
    fn test_done_only_flips_completeness() {
        let mut state = ChatState::default();
        state.begin_turn("hi");
        reduce(&mut state, &content("answer"));
        let before = state.messages.len();

        let effects = reduce(&mut state, &ServerEvent::Done);
        assert_eq!(state.messages.len(), before);
        assert!(state.messages.last().unwrap().complete);
        assert!(!state.loading);
        assert!(!state.thinking);
        assert!(state.tool_status.is_none());
        assert_eq!(effects, vec![Effect::RefreshConversations]);
    }

    #[test]
    fn test_done_without_messages() {
        let mut state = ChatState::default();
        state.loading = true;
        reduce(&mut state, &ServerEvent::Done);
        assert!(state.messages.is_empty());
        assert!(!state.loading);
    }

    #[test]
    fn test_tool_call_then_result() {
        let mut state = ChatState::default();
        state.begin_turn("weather?");
        reduce(&mut state, &tool_call("weather"));
        assert!(state.thinking);
        assert_eq!(
            state.tool_status,
            Some(ToolStatus {
                name: "weather".into(),
                content: None,
                calling: true,
                communicating: true,
            })
        );

        reduce(&mut state, &tool(Some("weather"), "sunny"));
        let status = state.tool_status.clone().unwrap();
        assert_eq!(status.name, "weather");
        assert!(!status.communicating);
        assert!(status.calling);
        assert_eq!(status.content.as_deref(), Some("sunny"));
    }

    #[test]
    fn test_tool_without_name_keeps_previous() {
        let mut state = ChatState::default();
        reduce(&mut state, &tool_call("search"));
        reduce(&mut state, &tool(None, "3 hits"));
        assert_eq!(state.tool_status.unwrap().name, "search");
    }

    #[test]
    fn test_tool_without_prior_call() {
        let mut state = ChatState::default();
        reduce(&mut state, &tool(Some("memory"), "stored"));
        let status = state.tool_status.unwrap();
        assert!(!status.calling);
        assert!(!status.communicating);
    }

    #[test]
    fn test_error_leaves_messages_untouched() {
        let mut state = ChatState::default();
        state.begin_turn("hi");
        reduce(&mut state, &tool_call("search"));
        reduce(&mut state, &content("partial"));
        let messages = state.messages.clone();

        let effects = reduce(
            &mut state,
            &ServerEvent::Error {
                message: "model exploded".into(),
            },
        );
        assert_eq!(state.messages, messages);
        assert!(!state.messages.last().unwrap().complete);
        assert!(state.tool_status.is_none());
        assert!(!state.loading);
        assert!(!state.thinking);
        assert_eq!(effects, vec![Effect::Notify("model exploded".into())]);
    }

    #[test]
    fn test_conversation_id_assignment() {
        let mut state = ChatState::default();
        let id = Uuid::new_v4();
        let effects = reduce(&mut state, &ServerEvent::ConversationId { conversation_id: id });
        assert_eq!(
            effects,
            vec![Effect::ConversationAssigned(id), Effect::RefreshConversations]
        );
        assert_eq!(state, ChatState::default());
    }

    #[test]
    fn test_rest_reply_completes_turn() {
        let mut state = ChatState::default();
        state.begin_turn("hello");
        assert!(state.loading);
        state.complete_with("<emotion>happy</emotion>Hi!");
        assert_eq!(state.messages.len(), 2);
        assert!(state.messages[1].complete);
        assert!(!state.loading);
    }
}
