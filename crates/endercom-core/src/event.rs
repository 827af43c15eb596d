use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::sync::Arc;
use tokio::sync::broadcast;

/// Observable record of what the runtime did. Failures that are isolated
/// from the loop (handler errors, publish errors, retried fetches) are
/// reported here instead of being raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentEvent {
    // ── Run lifecycle ──────────────────────────────────────────
    RunStarted {
        frequency_id: String,
        at: DateTime<Utc>,
    },
    RunStopped {
        reason: StopReason,
        at: DateTime<Utc>,
    },

    // ── Polling ────────────────────────────────────────────────
    FetchFailed {
        attempt: u32,
        error: String,
        /// Whether another attempt follows before the next interval.
        retrying: bool,
    },
    MessageReceived {
        message_id: String,
        sender_id: String,
    },
    MessageSkipped {
        message_id: String,
    },
    HandlerFailed {
        message_id: String,
        error: String,
    },
    ResponsePublished {
        message_id: String,
        target: Option<String>,
    },
    PublishFailed {
        message_id: String,
        error: String,
    },
    /// Fetched but never dispatched because the run was cancelled.
    MessageAbandoned {
        message_id: String,
    },

    // ── Direct delivery ────────────────────────────────────────
    DirectDelivery {
        message_id: String,
        ok: bool,
    },
}

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopReason {
    Cancelled,
    Fatal { error: String },
}

/// A broadcast-based event bus. Publishing never blocks the loop.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<AgentEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn publish(&self, event: AgentEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
