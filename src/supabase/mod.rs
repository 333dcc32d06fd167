mod realtime;
mod rest;

pub use realtime::{ChangeEvent, RealtimeFeed};
pub use rest::RestClient;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::stream::{lenient_id, CodePayload, ThoughtPayload};

pub const SESSIONS_TABLE: &str = "ai_agent_sessions";
pub const EVENTS_TABLE: &str = "ai_stream_events";

/// Connection details for the Supabase project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

/// Lifecycle of an agent's live build
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum SessionStatus {
    #[default]
    Offline,
    Starting,
    Live,
    Paused,
    Error,
    /// Any other value, kept verbatim
    Other(String),
}

impl SessionStatus {
    /// Status as announced on the stream socket, where `working` means live
    pub fn from_wire(value: &str) -> Self {
        if value == "working" {
            Self::Live
        } else {
            Self::from(value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Offline => "offline",
            Self::Starting => "starting",
            Self::Live => "live",
            Self::Paused => "paused",
            Self::Error => "error",
            Self::Other(value) => value,
        }
    }

    pub fn is_live(&self) -> bool {
        *self == Self::Live
    }
}

impl From<String> for SessionStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "offline" => Self::Offline,
            "starting" => Self::Starting,
            "live" => Self::Live,
            "paused" => Self::Paused,
            "error" => Self::Error,
            _ => Self::Other(value),
        }
    }
}

/// Row of `ai_agent_sessions`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Session {
    pub id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub agent_avatar: Option<String>,
    pub status: SessionStatus,
    pub current_task: Option<String>,
    pub preview_url: Option<String>,
    pub viewers_count: i64,
    pub creation_type: Option<String>,
}

impl Session {
    /// Stand-in used when no session store is configured
    pub fn placeholder(agent_id: &str) -> Self {
        Self {
            id: agent_id.to_string(),
            agent_id: agent_id.to_string(),
            agent_name: agent_id.to_string(),
            ..Default::default()
        }
    }

    /// Emoji avatar, or the first letter of the name when the avatar is an image URL
    pub fn avatar_glyph(&self) -> String {
        match self.agent_avatar.as_deref().map(str::trim) {
            Some(avatar) if !avatar.is_empty() && !avatar.contains("://") => avatar.to_string(),
            _ => self
                .agent_name
                .chars()
                .next()
                .map(|c| c.to_uppercase().collect())
                .unwrap_or_else(|| "?".to_string()),
        }
    }
}

/// Kinds of persisted stream events the viewer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Code,
    Thought,
    Other,
}

/// Row of `ai_stream_events`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventRecord {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub session_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
    pub created_at: Option<String>,
}

impl EventRecord {
    pub fn event_kind(&self) -> EventKind {
        match self.kind.as_str() {
            "code" => EventKind::Code,
            "thinking" | "thought" => EventKind::Thought,
            _ => EventKind::Other,
        }
    }

    pub fn code(&self) -> Option<CodePayload> {
        CodePayload::deserialize(&self.data).ok()
    }

    pub fn thought(&self) -> Option<ThoughtPayload> {
        ThoughtPayload::deserialize(&self.data).ok()
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_status_mapping() {
        assert_eq!(SessionStatus::from_wire("working"), SessionStatus::Live);
        assert_eq!(SessionStatus::from_wire("paused"), SessionStatus::Paused);
        assert_eq!(SessionStatus::from_wire("thinking").as_str(), "thinking");
        assert_eq!(SessionStatus::from_wire("done").as_str(), "done");
    }

    #[test]
    fn test_session_row() {
        let session: Session = serde_json::from_value(json!({
            "id": "s-1",
            "agent_id": "nex",
            "agent_name": "Nex",
            "agent_avatar": null,
            "status": "live",
            "current_task": "Building a todo app",
            "preview_url": null,
            "viewers_count": 12,
            "creation_type": "code",
            "created_at": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(session.status.is_live());
        assert_eq!(session.viewers_count, 12);
        assert_eq!(session.avatar_glyph(), "N");
    }

    #[test]
    fn test_avatar_glyph_prefers_emoji() {
        let session = Session {
            agent_name: "nex".to_string(),
            agent_avatar: Some("🤖".to_string()),
            ..Default::default()
        };
        assert_eq!(session.avatar_glyph(), "🤖");

        let session = Session {
            agent_name: "nex".to_string(),
            agent_avatar: Some("https://cdn/nex.png".to_string()),
            ..Default::default()
        };
        assert_eq!(session.avatar_glyph(), "N");
    }

    #[test]
    fn test_event_record_payloads() {
        let record: EventRecord = serde_json::from_value(json!({
            "id": 42,
            "session_id": "s-1",
            "type": "thought",
            "data": {"content": "check schema", "thoughtType": "observation"},
            "created_at": "2025-01-01T10:00:00.123456+00:00"
        }))
        .unwrap();
        assert_eq!(record.id.as_deref(), Some("42"));
        assert_eq!(record.event_kind(), EventKind::Thought);
        let thought = record.thought().unwrap();
        assert_eq!(thought.content(), "check schema");
        assert_eq!(thought.kind(), crate::view::ThoughtKind::Observation);
        assert!(record.timestamp().is_some());

        let code: EventRecord = serde_json::from_value(json!({
            "type": "code",
            "data": {"filename": "a.py", "content": "print()", "language": "python"}
        }))
        .unwrap();
        assert_eq!(code.event_kind(), EventKind::Code);
        assert_eq!(code.code().unwrap().filename(), "a.py");
    }
}
