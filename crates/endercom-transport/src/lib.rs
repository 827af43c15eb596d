//! # endercom-transport
//!
//! The narrow boundary between the runtime and the remote frequency
//! service. The polling engine only ever calls [`Transport::fetch`] and
//! [`Transport::publish`]; authentication and the wire format live behind it.
//!
//! Transports do not retry. Failures come back typed so the caller can tell
//! fatal ones ([`endercom_core::EndercomError::is_fatal`]) from transient ones.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use endercom_core::{Cursor, RawMessage, Result};

pub use http::HttpTransport;
pub use mock::{MockFailure, MockTransport, PublishedMessage};

/// One page of new messages and where to continue from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchBatch {
    /// In arrival order.
    pub messages: Vec<RawMessage>,
    /// Position after the whole batch, if the service reports one.
    pub next_cursor: Option<Cursor>,
}

impl FetchBatch {
    pub fn new(messages: Vec<RawMessage>) -> Self {
        Self {
            messages,
            next_cursor: None,
        }
    }

    pub fn with_cursor(mut self, cursor: Cursor) -> Self {
        self.next_cursor = Some(cursor);
        self
    }
}

/// Remote operations the runtime needs from a frequency.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Messages on `frequency_id` newer than `cursor`.
    async fn fetch(&self, frequency_id: &str, cursor: &Cursor) -> Result<FetchBatch>;

    /// Post `content` to the frequency, to `target` or to everyone.
    /// Returns whether the service accepted it.
    async fn publish(&self, frequency_id: &str, content: &str, target: Option<&str>)
    -> Result<bool>;
}
