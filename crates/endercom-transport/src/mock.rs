//! Scripted transport for deterministic tests.
//!
//! Fetch results are served from a queue in order; once the queue is empty
//! every fetch returns an empty batch. All calls are recorded.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use endercom_core::{Cursor, EndercomError, RawMessage, Result};
use parking_lot::Mutex;

use crate::{FetchBatch, Transport};

/// Failure kinds a [`MockTransport`] can be scripted to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Unauthorized,
    InvalidFrequency,
    Timeout,
    Unavailable,
}

impl MockFailure {
    fn into_error(self) -> EndercomError {
        match self {
            MockFailure::Unauthorized => EndercomError::Unauthorized("mock: bad credential".into()),
            MockFailure::InvalidFrequency => {
                EndercomError::InvalidFrequency("mock: unknown frequency".into())
            }
            MockFailure::Timeout => EndercomError::Timeout(Duration::from_secs(30)),
            MockFailure::Unavailable => EndercomError::Unavailable("mock: 503".into()),
        }
    }
}

/// A publish call captured by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub frequency_id: String,
    pub content: String,
    pub target: Option<String>,
}

/// A transport that replays scripted fetch results.
///
/// # Example
/// ```
/// use endercom_core::RawMessage;
/// use endercom_transport::MockTransport;
/// let transport = MockTransport::new()
///     .with_batch(vec![RawMessage::new("1", "hello").from_sender("a")]);
/// ```
#[derive(Default)]
pub struct MockTransport {
    fetches: Mutex<VecDeque<std::result::Result<FetchBatch, MockFailure>>>,
    publish_failures: Mutex<VecDeque<MockFailure>>,
    fetch_delay: Mutex<Option<Duration>>,
    /// Cursor passed to every fetch call, in order.
    pub fetch_calls: Arc<Mutex<Vec<Cursor>>>,
    /// Every publish call, in order.
    pub published: Arc<Mutex<Vec<PublishedMessage>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a batch of messages.
    pub fn with_batch(self, messages: Vec<RawMessage>) -> Self {
        self.fetches.lock().push_back(Ok(FetchBatch::new(messages)));
        self
    }

    /// Queue a batch that reports its own continuation cursor.
    pub fn with_batch_cursor(self, messages: Vec<RawMessage>, cursor: Cursor) -> Self {
        self.fetches
            .lock()
            .push_back(Ok(FetchBatch::new(messages).with_cursor(cursor)));
        self
    }

    /// Queue a failed fetch.
    pub fn with_fetch_error(self, failure: MockFailure) -> Self {
        self.fetches.lock().push_back(Err(failure));
        self
    }

    /// Make the next publish calls fail, one queued failure per call.
    pub fn with_publish_error(self, failure: MockFailure) -> Self {
        self.publish_failures.lock().push_back(failure);
        self
    }

    /// Delay every fetch, to simulate a slow service.
    pub fn with_fetch_delay(self, delay: Duration) -> Self {
        *self.fetch_delay.lock() = Some(delay);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.lock().len()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().clone()
    }

    /// Wait until at least `n` fetches happened or `timeout` elapses.
    pub async fn wait_for_fetches(&self, n: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.fetch_count() >= n).await
    }

    /// Wait until at least `n` publishes happened or `timeout` elapses.
    pub async fn wait_for_publishes(&self, n: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.published.lock().len() >= n).await
    }
}

async fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, _frequency_id: &str, cursor: &Cursor) -> Result<FetchBatch> {
        self.fetch_calls.lock().push(cursor.clone());
        let delay = *self.fetch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.fetches.lock().pop_front();
        match next {
            Some(Ok(batch)) => Ok(batch),
            Some(Err(failure)) => Err(failure.into_error()),
            None => Ok(FetchBatch::default()),
        }
    }

    async fn publish(
        &self,
        frequency_id: &str,
        content: &str,
        target: Option<&str>,
    ) -> Result<bool> {
        let failure = self.publish_failures.lock().pop_front();
        if let Some(failure) = failure {
            return Err(failure.into_error());
        }
        self.published.lock().push(PublishedMessage {
            frequency_id: frequency_id.to_string(),
            content: content.to_string(),
            target: target.map(str::to_string),
        });
        Ok(true)
    }
}
