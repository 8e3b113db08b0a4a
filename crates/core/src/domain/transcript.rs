use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
}

impl TranscriptEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    /// Raw state form, as threaded back through the caller.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("role".to_string(), Value::String(self.role.as_str().to_string()));
        object.insert("content".to_string(), Value::String(self.content.clone()));
        Value::Object(object)
    }

    fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let role = object.get("role").and_then(Value::as_str).and_then(Role::parse)?;
        let content = object.get("content").and_then(Value::as_str)?;
        if content.trim().is_empty() {
            return None;
        }
        Some(Self { role, content: content.to_string() })
    }
}

/// Keeps only well-formed entries: an object with a `user`/`assistant` role and
/// non-blank string content. Content is passed through untouched.
pub fn sanitize(raw: &[Value]) -> Vec<TranscriptEntry> {
    raw.iter().filter_map(TranscriptEntry::from_value).collect()
}
