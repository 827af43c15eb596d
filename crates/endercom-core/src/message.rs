use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sender id recorded for direct deliveries that do not name their sender.
pub const EXTERNAL_SENDER: &str = "external";

/// An inbound message, normalized from a fetch result or a direct delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    /// Empty when the frequency did not report a sender.
    pub sender_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_agent: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl Message {
    /// Normalize a message returned by the transport.
    pub fn from_raw(raw: RawMessage) -> Self {
        Self {
            id: raw.id,
            content: raw.content,
            sender_id: raw.sender_id.unwrap_or_default(),
            target_agent: raw.target_agent.filter(|t| !t.is_empty()),
            received_at: raw.created_at.unwrap_or_else(Utc::now),
        }
    }

    /// Build a message handed to the runtime directly (bypassing fetch).
    pub fn direct(
        content: impl Into<String>,
        sender_id: Option<String>,
        target_agent: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            sender_id: sender_id
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| EXTERNAL_SENDER.to_string()),
            target_agent: target_agent.filter(|t| !t.is_empty()),
            received_at: Utc::now(),
        }
    }

    /// Where a response to this message should be published.
    /// `None` means broadcast on the frequency.
    pub fn reply_target(&self) -> Option<&str> {
        if self.sender_id.is_empty() {
            None
        } else {
            Some(self.sender_id.as_str())
        }
    }
}

/// A message as it arrives on the wire, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    #[serde(alias = "message_id")]
    pub id: String,
    pub content: String,
    #[serde(default, alias = "from_agent", alias = "agent_id")]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub target_agent: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl RawMessage {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            sender_id: None,
            target_agent: None,
            created_at: None,
        }
    }

    pub fn from_sender(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }
}

/// Opaque fetch position. Starts empty; the polling engine moves it forward
/// past every message it dispatches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(Option<String>);

impl Cursor {
    /// The position before any message.
    pub fn start() -> Self {
        Self(None)
    }

    /// The position just past the message with `id`.
    pub fn after(id: impl Into<String>) -> Self {
        Self(Some(id.into()))
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_start(&self) -> bool {
        self.0.is_none()
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(pos) => write!(f, "{pos}"),
            None => write!(f, "<start>"),
        }
    }
}
