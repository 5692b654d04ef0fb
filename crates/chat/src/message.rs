use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Stable identifier for one message, unique within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Time-ordered random id for user and assistant turns.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Id of the greeting injected into an empty conversation.
    pub fn welcome(created_at_unix_millis: u128) -> Self {
        Self(format!("welcome-{created_at_unix_millis}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolState {
    Pending,
    OutputAvailable,
}

/// One unit of message content.
///
/// The variant set is closed: every consumer matches exhaustively, so a new kind of part
/// shows up as a compile error wherever it is not handled yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Part {
    Text {
        content: String,
    },
    Reasoning {
        content: String,
    },
    ToolInvocation {
        #[serde(rename = "callId")]
        call_id: String,
        name: String,
        state: ToolState,
        input: Value,
        /// A present `null` stays `Some(Value::Null)`; only a missing field is `None`.
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            deserialize_with = "deserialize_present_output"
        )]
        output: Option<Value>,
    },
}

impl Part {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn reasoning(content: impl Into<String>) -> Self {
        Self::Reasoning {
            content: content.into(),
        }
    }

    pub fn tool_call(call_id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self::ToolInvocation {
            call_id: call_id.into(),
            name: name.into(),
            state: ToolState::Pending,
            input,
            output: None,
        }
    }

    pub fn is_reasoning(&self) -> bool {
        matches!(self, Self::Reasoning { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn new(id: MessageId, role: Role, parts: Vec<Part>) -> Self {
        Self { id, role, parts }
    }

    pub fn user_text(id: MessageId, text: impl Into<String>) -> Self {
        Self::new(id, Role::User, vec![Part::text(text)])
    }

    pub fn assistant_text(id: MessageId, text: impl Into<String>) -> Self {
        Self::new(id, Role::Assistant, vec![Part::text(text)])
    }

    /// Assistant message with no content yet, filled in by streamed deltas.
    pub fn assistant_empty(id: MessageId) -> Self {
        Self::new(id, Role::Assistant, Vec::new())
    }

    /// Concatenated text parts, the form sent back to the model as history.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { content } => Some(content.as_str()),
                Part::Reasoning { .. } | Part::ToolInvocation { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Extends the trailing text part, or starts a new one after any other kind of part.
    pub fn append_text(&mut self, delta: &str) -> usize {
        match self.parts.last_mut() {
            Some(Part::Text { content }) => content.push_str(delta),
            _ => self.parts.push(Part::text(delta)),
        }
        self.parts.len() - 1
    }

    /// Extends the trailing reasoning part, or starts a new one. Returns its index.
    pub fn append_reasoning(&mut self, delta: &str) -> usize {
        match self.parts.last_mut() {
            Some(Part::Reasoning { content }) => content.push_str(delta),
            _ => self.parts.push(Part::reasoning(delta)),
        }
        self.parts.len() - 1
    }

    pub fn push_tool_call(&mut self, call_id: &str, name: &str, input: Value) -> usize {
        self.parts.push(Part::tool_call(call_id, name, input));
        self.parts.len() - 1
    }

    /// Marks the pending invocation with `call_id` as finished. Returns false when no
    /// pending invocation matches.
    pub fn complete_tool_call(&mut self, call_id: &str, result: Value) -> bool {
        for part in &mut self.parts {
            if let Part::ToolInvocation {
                call_id: id,
                state,
                output,
                ..
            } = part
                && id.as_str() == call_id
                && *state == ToolState::Pending
            {
                *state = ToolState::OutputAvailable;
                *output = Some(result);
                return true;
            }
        }
        false
    }
}

fn deserialize_present_output<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

pub(crate) fn current_unix_timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis())
}
