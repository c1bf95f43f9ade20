//! Streaming frame types exchanged over the chat WebSocket

use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;
use uuid::Uuid;

/// Frames pushed by the server during a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Conversation bound to this connection (sent right after connect)
    ConversationId { conversation_id: Uuid },
    /// Assistant text delta
    Content { content: String },
    /// A tool finished and reported its output
    Tool {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        content: Option<String>,
    },
    /// The assistant invoked a tool
    ToolCall {
        name: String,
        #[serde(default)]
        args: serde_json::Value,
    },
    /// The turn completed
    Done,
    /// The turn failed server-side
    Error {
        #[serde(default)]
        message: String,
    },
    /// Any frame type this client does not know
    #[serde(other)]
    Unknown,
}

/// Frames sent by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Message { message: String },
}

impl ClientFrame {
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message {
            message: text.into(),
        }
    }
}

/// What a connection reports to its reader
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Frame(ServerEvent),
    /// Transport-level failure; the connection is closed afterwards
    Error(String),
    Closed,
}

/// A stream of connection events
pub type SocketEventStream = Pin<Box<dyn Stream<Item = SocketEvent> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_frames() {
        let frames = [
            r#"{"type":"content","content":"Hel"}"#,
            r#"{"type":"tool_call","name":"search","args":{"q":"rust"}}"#,
            r#"{"type":"tool","name":"search","content":"3 results"}"#,
            r#"{"type":"done"}"#,
            r#"{"type":"error","message":"boom"}"#,
        ];
        let parsed: Vec<ServerEvent> = frames
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect();
        assert_eq!(parsed[0], ServerEvent::Content { content: "Hel".into() });
        assert!(matches!(&parsed[1], ServerEvent::ToolCall { name, .. } if name == "search"));
        assert_eq!(
            parsed[2],
            ServerEvent::Tool {
                name: Some("search".into()),
                content: Some("3 results".into())
            }
        );
        assert_eq!(parsed[3], ServerEvent::Done);
        assert_eq!(parsed[4], ServerEvent::Error { message: "boom".into() });
    }

    #[test]
    fn test_parse_conversation_id_frame() {
        let ev: ServerEvent = serde_json::from_str(
            r#"{"type":"conversation_id","conversation_id":"6f1c1c1e-3d5b-4c55-9a3e-0a3c2d1e9f00"}"#,
        )
        .unwrap();
        assert!(matches!(ev, ServerEvent::ConversationId { .. }));
    }

    #[test]
    fn test_unknown_frame_type() {
        let ev: ServerEvent = serde_json::from_str(r#"{"type":"heartbeat","at":1}"#).unwrap();
        assert_eq!(ev, ServerEvent::Unknown);
    }

    #[test]
    fn test_tool_frame_without_name() {
        let ev: ServerEvent = serde_json::from_str(r#"{"type":"tool","content":"ok"}"#).unwrap();
        assert_eq!(
            ev,
            ServerEvent::Tool {
                name: None,
                content: Some("ok".into())
            }
        );
    }

    #[test]
    fn test_client_frame_shape() {
        let json = serde_json::to_value(ClientFrame::message("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "message", "message": "hi"}));
    }
}
