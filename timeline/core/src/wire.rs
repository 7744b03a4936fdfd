//! Wire Protocol
//!
//! JSON frames exchanged with the agent event source.
//!
//! # Outbound
//!
//! One message per user submission:
//!
//! ```json
//! { "type": "TextMessage", "source": "user", "content": "<user text>" }
//! ```
//!
//! # Inbound
//!
//! Every frame is an object carrying `type`, `id`, `source`, `content` and
//! optionally `request_id` / `created_at`. The producer is not
//! schema-enforced, so decoding is deliberately lenient: only a frame that is
//! not a JSON object at all is rejected. Frames with an unknown (or missing)
//! `type` decode fine and are simply not mapped to an [`EventKind`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Participant name the upstream uses for the human side of the chat
pub const USER_SOURCE: &str = "user";

/// Errors from decoding or encoding frames
#[derive(Debug, Error)]
pub enum WireError {
    /// Frame text is not JSON
    #[error("Frame is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    /// Frame is JSON but not an object
    #[error("Frame is not a JSON object (got {0})")]
    NotAnObject(&'static str),
}

/// The closed set of event kinds the timeline understands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A participant is about to invoke a capability
    Request,
    /// A capability finished and produced a result, mid-turn
    Execution,
    /// A capability pipeline concluded with a summary that may be the answer
    Summary,
    /// The upstream process is waiting on the user
    InputRequested,
    /// Plain-text terminal message from a non-user participant
    FinalAnswer,
    /// Out-of-band "run finished" signal with no content
    TaskCompleted,
    /// The upstream run failed; content carries its error message
    UpstreamError,
}

impl EventKind {
    /// Map a wire `type` tag to a kind
    ///
    /// `TextMessage` from the `user` participant is the upstream echoing the
    /// submitted task back and maps to nothing, as does any unknown tag.
    #[must_use]
    pub fn from_tag(tag: &str, source: &str) -> Option<Self> {
        match tag {
            "ToolCallRequestEvent" => Some(Self::Request),
            "ToolCallExecutionEvent" => Some(Self::Execution),
            "ToolCallSummaryMessage" => Some(Self::Summary),
            "UserInputRequestedEvent" => Some(Self::InputRequested),
            "TextMessage" if source != USER_SOURCE => Some(Self::FinalAnswer),
            "task_completed" => Some(Self::TaskCompleted),
            "error" => Some(Self::UpstreamError),
            _ => None,
        }
    }

    /// The wire `type` tag for this kind
    #[must_use]
    pub fn wire_tag(&self) -> &'static str {
        match self {
            Self::Request => "ToolCallRequestEvent",
            Self::Execution => "ToolCallExecutionEvent",
            Self::Summary => "ToolCallSummaryMessage",
            Self::InputRequested => "UserInputRequestedEvent",
            Self::FinalAnswer => "TextMessage",
            Self::TaskCompleted => "task_completed",
            Self::UpstreamError => "error",
        }
    }

    /// Whether this kind needs `content` to mean anything
    ///
    /// An upstream error without a message is still an error.
    #[must_use]
    pub fn carries_content(&self) -> bool {
        !matches!(
            self,
            Self::InputRequested | Self::TaskCompleted | Self::UpstreamError
        )
    }
}

/// One decoded inbound frame
#[derive(Clone, Debug, PartialEq)]
pub struct InboundFrame {
    /// Raw `type` tag, if present
    pub tag: Option<String>,
    /// Upstream message id
    pub id: Option<String>,
    /// Participant that emitted the frame
    pub source: String,
    /// Text, list or object payload; `Null` when absent
    pub content: Value,
    /// Correlation id (present on input requests)
    pub request_id: Option<String>,
    /// Producer timestamp, as sent
    pub created_at: Option<String>,
}

impl InboundFrame {
    /// Decode one text frame
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] when the text is not a JSON object.
    pub fn decode(text: &str) -> Result<Self, WireError> {
        let value: Value = serde_json::from_str(text)?;
        let mut map = match value {
            Value::Object(map) => map,
            Value::Array(_) => return Err(WireError::NotAnObject("array")),
            Value::String(_) => return Err(WireError::NotAnObject("string")),
            Value::Number(_) => return Err(WireError::NotAnObject("number")),
            Value::Bool(_) => return Err(WireError::NotAnObject("bool")),
            Value::Null => return Err(WireError::NotAnObject("null")),
        };

        Ok(Self {
            tag: take_string(&mut map, "type"),
            id: take_string(&mut map, "id"),
            source: take_string(&mut map, "source").unwrap_or_default(),
            content: map.remove("content").unwrap_or(Value::Null),
            request_id: take_string(&mut map, "request_id"),
            created_at: take_string(&mut map, "created_at"),
        })
    }

    /// The event kind this frame maps to, if any
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_tag(self.tag.as_deref()?, &self.source)
    }

    /// Producer timestamp, when present and parseable
    ///
    /// Accepts RFC 3339 and naive ISO-8601 (read as UTC).
    #[must_use]
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key)? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// A user submission, client to server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Always `TextMessage`
    #[serde(rename = "type")]
    pub kind: String,
    /// Always `user`
    pub source: String,
    /// The user's text
    pub content: String,
}

impl OutboundMessage {
    /// Build the frame for a user-originated request
    pub fn user_text(content: impl Into<String>) -> Self {
        Self {
            kind: "TextMessage".to_string(),
            source: USER_SOURCE.to_string(),
            content: content.into(),
        }
    }

    /// Serialize to the JSON text frame
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Decode`] if serialization fails.
    pub fn encode(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }
}
