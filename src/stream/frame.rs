//! Inbound frames from the stream server.
//!
//! Every top-level field is optional and decoded on its own, so one field
//! with an unexpected shape never costs the rest of the frame.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::view::{FileAction, ThoughtKind, ThoughtMetadata, ThoughtPriority};

/// A file write announced by the agent
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CodePayload {
    pub filename: Option<String>,
    pub content: Option<String>,
    pub action: Option<String>,
    pub language: Option<String>,
}

impl CodePayload {
    pub fn filename(&self) -> &str {
        self.filename
            .as_deref()
            .filter(|f| !f.is_empty())
            .unwrap_or("untitled")
    }

    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    pub fn action(&self) -> FileAction {
        self.action
            .as_deref()
            .map(FileAction::from_tag)
            .unwrap_or_default()
    }
}

/// A structured thought as sent over the wire.
///
/// The canonical tag field is `type`; `thoughtType` / `thought_type` are
/// accepted from older producers and from persisted rows.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ThoughtPayload {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(alias = "thoughtType")]
    pub thought_type: Option<String>,
    pub content: Option<String>,
    pub priority: Option<String>,
    pub timestamp: Option<String>,
    pub metadata: Option<Value>,
}

impl ThoughtPayload {
    /// Adapt the legacy scalar `thinking` field
    pub fn legacy(text: &str) -> Self {
        Self {
            content: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    pub fn kind(&self) -> ThoughtKind {
        self.kind
            .as_deref()
            .or(self.thought_type.as_deref())
            .map(ThoughtKind::from_tag)
            .unwrap_or_default()
    }

    /// Malformed metadata is dropped rather than the whole thought
    pub fn metadata(&self) -> ThoughtMetadata {
        match &self.metadata {
            Some(value) => ThoughtMetadata::deserialize(value).unwrap_or_else(|e| {
                debug!(error = %e, "dropping malformed thought metadata");
                ThoughtMetadata::default()
            }),
            None => ThoughtMetadata::default(),
        }
    }

    /// Top-level priority wins over the one nested in metadata
    pub fn priority(&self, metadata: &ThoughtMetadata) -> ThoughtPriority {
        self.priority
            .as_deref()
            .or(metadata.priority.as_deref())
            .map(ThoughtPriority::from_tag)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskPayload {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PreviewPayload {
    pub url: Option<String>,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Goal {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Milestone {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub completed: bool,
    pub timestamp: Option<String>,
}

/// An error the agent hit while building
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AgentError {
    #[serde(default)]
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub stack: Option<String>,
    pub recovery_strategy: Option<String>,
    pub timestamp: Option<String>,
}

impl AgentError {
    /// `file:line`, or just `file`
    pub fn location(&self) -> Option<String> {
        let file = self.file.as_deref()?;
        Some(match self.line {
            Some(line) => format!("{}:{}", file, line),
            None => file.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DiffHunk {
    #[serde(default)]
    pub start: u64,
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub added: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Diff {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub hunks: Vec<DiffHunk>,
}

/// One decoded frame from the stream socket
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamFrame {
    pub code: Option<CodePayload>,
    pub thoughts: Vec<ThoughtPayload>,
    pub status: Option<String>,
    pub task: Option<TaskPayload>,
    pub preview: Option<PreviewPayload>,
    pub goal: Option<Goal>,
    pub milestones: Option<Vec<Milestone>>,
    pub recent_errors: Option<Vec<AgentError>>,
    pub diff: Option<Diff>,
}

impl StreamFrame {
    /// Decode a text frame. Fails only if the text is not a JSON object.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        match value {
            Value::Object(map) => Ok(Self::from_object(&map)),
            other => Err(serde::de::Error::custom(format!(
                "expected a JSON object, got {}",
                kind_of(&other)
            ))),
        }
    }

    pub fn from_object(map: &Map<String, Value>) -> Self {
        let mut thoughts: Vec<ThoughtPayload> = field(map, "thoughts").unwrap_or_default();
        if let Some(single) = field::<ThoughtPayload>(map, "thought") {
            thoughts.push(single);
        }
        if let Some(text) = field::<String>(map, "thinking").filter(|t| !t.is_empty()) {
            thoughts.push(ThoughtPayload::legacy(&text));
        }

        Self {
            code: field(map, "code"),
            thoughts,
            status: field::<String>(map, "status").filter(|s| !s.is_empty()),
            task: field(map, "task"),
            preview: field(map, "preview"),
            goal: field(map, "goal"),
            milestones: field(map, "milestones"),
            recent_errors: field(map, "recent_errors"),
            diff: field(map, "diff"),
        }
    }
}

/// Decode one optional field, treating null and bad shapes as absent
fn field<T: DeserializeOwned>(map: &Map<String, Value>, key: &str) -> Option<T> {
    let value = map.get(key)?;
    if value.is_null() {
        return None;
    }
    match T::deserialize(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!(field = key, error = %e, "dropping malformed frame field");
            None
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Accept string or numeric ids
pub(crate) fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
