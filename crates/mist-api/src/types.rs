//! Request and response bodies for the chat backend

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Response of `POST /api/auth/jwt/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Body of `POST /api/auth/register`
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// The authenticated account, from `GET /api/auth/users/me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub is_verified: bool,
}

/// One row of the conversation list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConversationSummary {
    /// Timestamp used for ordering and recency labels
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }
}

/// Author of a persisted message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredRole {
    User,
    Assistant,
    Tool,
    #[serde(other)]
    Other,
}

/// A persisted message from `GET /api/chat/conversations/{id}/messages`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub role: StoredRole,
    pub content: String,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of `POST /api/chat/`
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
    pub conversation_id: Option<Uuid>,
}

/// Single-shot reply of `POST /api/chat/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub conversation_id: Uuid,
    pub message: String,
}

/// Response of `DELETE /api/chat/conversations/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// Which conversation a streaming connection is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationTarget {
    /// The server creates a conversation and reports its id
    New,
    Existing(Uuid),
}

impl ConversationTarget {
    pub fn from_active(active: Option<Uuid>) -> Self {
        active.map_or(Self::New, Self::Existing)
    }

    pub fn id(&self) -> Option<Uuid> {
        match self {
            Self::New => None,
            Self::Existing(id) => Some(*id),
        }
    }

    /// Path segment of the WebSocket route
    pub fn path_segment(&self) -> String {
        match self {
            Self::New => "new".to_string(),
            Self::Existing(id) => id.to_string(),
        }
    }
}

impl fmt::Display for ConversationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path_segment())
    }
}

/// Lenient timestamp parsing.
///
/// The backend serializes naive datetimes without an offset; those are UTC.
pub mod timestamp {
    use super::*;

    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        s.parse::<NaiveDateTime>().ok().map(|n| n.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) if raw.is_empty() => Ok(None),
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_naive_timestamp_as_utc() {
        let dt = timestamp::parse("2025-03-01T12:30:45.123456").unwrap();
        assert_eq!(dt.timestamp(), Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 45).unwrap().timestamp());
        let whole = timestamp::parse("2025-03-01T12:30:45").unwrap();
        assert_eq!(whole, Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 45).unwrap());
    }

    #[test]
    fn test_parse_offset_timestamp() {
        let dt = timestamp::parse("2025-03-01T12:30:45+02:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 3, 1, 10, 30, 45).unwrap());
        assert!(timestamp::parse("yesterday").is_none());
    }

    #[test]
    fn test_conversation_summary_from_backend() {
        let json = r#"{
            "id": "6f1c1c1e-3d5b-4c55-9a3e-0a3c2d1e9f00",
            "title": null,
            "created_at": "2025-03-01T09:00:00",
            "updated_at": "2025-03-02T09:00:00.5"
        }"#;
        let conv: ConversationSummary = serde_json::from_str(json).unwrap();
        assert!(conv.title.is_none());
        assert_eq!(conv.last_activity(), conv.updated_at.unwrap());
    }

    #[test]
    fn test_last_activity_falls_back_to_created() {
        let json = r#"{"id":"6f1c1c1e-3d5b-4c55-9a3e-0a3c2d1e9f00","created_at":"2025-03-01T09:00:00"}"#;
        let conv: ConversationSummary = serde_json::from_str(json).unwrap();
        assert_eq!(conv.last_activity(), conv.created_at);
    }

    #[test]
    fn test_stored_message_roles() {
        let json = r#"[
            {"id":"6f1c1c1e-3d5b-4c55-9a3e-0a3c2d1e9f01","role":"tool","content":"42","tool_name":"calculator","created_at":"2025-03-01T09:00:00"},
            {"id":"6f1c1c1e-3d5b-4c55-9a3e-0a3c2d1e9f02","role":"system","content":"x","tool_name":null,"created_at":"2025-03-01T09:00:00"}
        ]"#;
        let rows: Vec<StoredMessage> = serde_json::from_str(json).unwrap();
        assert_eq!(rows[0].role, StoredRole::Tool);
        assert_eq!(rows[0].tool_name.as_deref(), Some("calculator"));
        assert_eq!(rows[1].role, StoredRole::Other);
    }

    #[test]
    fn test_chat_request_new_conversation_is_null() {
        let body = serde_json::to_value(ChatRequest {
            message: "hello",
            conversation_id: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"message": "hello", "conversation_id": null}));
    }

    #[test]
    fn test_target_path_segment() {
        assert_eq!(ConversationTarget::New.path_segment(), "new");
        let id = Uuid::new_v4();
        assert_eq!(ConversationTarget::from_active(Some(id)).to_string(), id.to_string());
        assert_eq!(ConversationTarget::from_active(None), ConversationTarget::New);
    }
}
