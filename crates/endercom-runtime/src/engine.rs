use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use endercom_core::{
    AgentEvent, Cursor, EndercomError, EventBus, HandlerAdapter, Message, RawMessage, Result,
    RunOptions, StopReason,
};
use endercom_transport::{FetchBatch, Transport};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::backoff_delay;

/// Coarse view of what the engine is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Stopped,
    Polling,
    Dispatching,
}

/// Counters and final position of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Position after the last dispatched message. Not persisted.
    pub cursor: Cursor,
    pub polls: u64,
    pub received: u64,
    pub handled: u64,
    pub failed: u64,
    pub published: u64,
    pub publish_failures: u64,
    pub skipped: u64,
    pub abandoned: u64,
}

/// Bounded memory of recently dispatched ids.
struct RecentIds {
    order: VecDeque<String>,
    set: HashSet<String>,
    capacity: usize,
}

impl RecentIds {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            set: HashSet::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns false if the id was already seen.
    fn insert(&mut self, id: &str) -> bool {
        if self.set.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.set.remove(&old);
            }
        }
        self.order.push_back(id.to_string());
        self.set.insert(id.to_string());
        true
    }
}

/// Fetch, dispatch in order, publish replies, wait, repeat.
///
/// Each fetched message is dispatched at most once per run: the cursor moves
/// past a message whether its handler succeeded or not, and recently seen ids
/// are rejected if the service hands them out again. The cursor lives in
/// memory only, so a restarted run may see messages again.
pub struct PollingEngine {
    transport: Arc<dyn Transport>,
    frequency_id: String,
    adapter: HandlerAdapter,
    options: RunOptions,
    events: EventBus,
    state: watch::Sender<EngineState>,
}

enum FetchOutcome {
    Batch(FetchBatch),
    /// Retries exhausted or cancelled during backoff; wait for the next interval.
    Skipped,
}

impl PollingEngine {
    pub fn new(
        transport: Arc<dyn Transport>,
        frequency_id: impl Into<String>,
        adapter: HandlerAdapter,
        options: RunOptions,
        events: EventBus,
    ) -> Self {
        let (state, _) = watch::channel(EngineState::Stopped);
        Self {
            transport,
            frequency_id: frequency_id.into(),
            adapter,
            options,
            events,
            state,
        }
    }

    pub fn state(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// Run until `cancel` fires or a fatal error occurs.
    ///
    /// Cancellation never interrupts a fetch, handler, or publish that has
    /// already started. Messages fetched but not yet dispatched are reported
    /// as abandoned and the cursor is left before them, as are those left
    /// behind by a fatal publish error.
    pub async fn run(self, cancel: CancellationToken) -> Result<RunSummary> {
        self.options.validate()?;
        let mut summary = RunSummary::default();
        let mut seen = RecentIds::new(self.options.dedup_window);

        info!(
            frequency_id = %self.frequency_id,
            poll_interval_ms = self.options.poll_interval.as_millis() as u64,
            "polling started"
        );
        self.state.send_replace(EngineState::Polling);
        self.events.publish(AgentEvent::RunStarted {
            frequency_id: self.frequency_id.clone(),
            at: Utc::now(),
        });

        let result = loop {
            if cancel.is_cancelled() {
                break Ok(());
            }
            let cycle_start = Instant::now();

            match self.fetch_with_retry(&summary.cursor, &cancel).await {
                Ok(FetchOutcome::Batch(batch)) => {
                    summary.polls += 1;
                    let dispatched = self
                        .dispatch_batch(batch, &mut summary, &mut seen, &cancel)
                        .await;
                    if let Err(e) = dispatched {
                        break Err(e);
                    }
                }
                Ok(FetchOutcome::Skipped) => {}
                Err(e) => break Err(e),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(()),
                _ = tokio::time::sleep_until(cycle_start + self.options.poll_interval) => {}
            }
        };

        self.state.send_replace(EngineState::Stopped);
        let reason = match &result {
            Ok(()) => StopReason::Cancelled,
            Err(e) => StopReason::Fatal {
                error: e.to_string(),
            },
        };
        self.events.publish(AgentEvent::RunStopped {
            reason,
            at: Utc::now(),
        });

        match result {
            Ok(()) => {
                info!(
                    frequency_id = %self.frequency_id,
                    received = summary.received,
                    published = summary.published,
                    cursor = %summary.cursor,
                    "polling stopped"
                );
                Ok(summary)
            }
            Err(e) => {
                error!(frequency_id = %self.frequency_id, error = %e, "polling stopped on fatal error");
                Err(e)
            }
        }
    }

    async fn fetch_with_retry(
        &self,
        cursor: &Cursor,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let err = match self.transport.fetch(&self.frequency_id, cursor).await {
                Ok(batch) => return Ok(FetchOutcome::Batch(batch)),
                Err(e) => e,
            };

            if err.is_fatal() {
                self.events.publish(AgentEvent::FetchFailed {
                    attempt,
                    error: err.to_string(),
                    retrying: false,
                });
                return Err(err);
            }

            let retrying = attempt <= self.options.max_retries && !cancel.is_cancelled();
            warn!(attempt, retrying, error = %err, "fetch failed");
            self.events.publish(AgentEvent::FetchFailed {
                attempt,
                error: err.to_string(),
                retrying,
            });
            if !retrying {
                return Ok(FetchOutcome::Skipped);
            }

            if !self.pause(attempt, &err, cancel).await {
                return Ok(FetchOutcome::Skipped);
            }
        }
    }

    /// Sleep before the next retry. Returns false if cancelled meanwhile.
    async fn pause(&self, attempt: u32, err: &EndercomError, cancel: &CancellationToken) -> bool {
        let delay = err
            .retry_after()
            .unwrap_or_else(|| {
                backoff_delay(
                    attempt,
                    self.options.retry_base_delay,
                    self.options.retry_max_delay,
                )
            })
            .min(self.options.retry_max_delay);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    async fn dispatch_batch(
        &self,
        batch: FetchBatch,
        summary: &mut RunSummary,
        seen: &mut RecentIds,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if batch.messages.is_empty() {
            if let Some(next) = batch.next_cursor {
                summary.cursor = next;
            }
            return Ok(());
        }
        debug!(count = batch.messages.len(), "dispatching batch");

        let mut pending = batch.messages.into_iter();
        while let Some(raw) = pending.next() {
            if cancel.is_cancelled() {
                self.abandon(std::iter::once(raw).chain(pending), summary);
                return Ok(());
            }

            let message = Message::from_raw(raw);
            summary.cursor = Cursor::after(&message.id);

            if !seen.insert(&message.id) {
                debug!(message_id = %message.id, "skipping already dispatched message");
                summary.skipped += 1;
                self.events.publish(AgentEvent::MessageSkipped {
                    message_id: message.id,
                });
                continue;
            }

            self.state.send_replace(EngineState::Dispatching);
            let outcome = self.dispatch(&message, summary, cancel).await;
            self.state.send_replace(EngineState::Polling);
            if let Err(e) = outcome {
                self.abandon(pending, summary);
                return Err(e);
            }
        }

        if let Some(next) = batch.next_cursor {
            summary.cursor = next;
        }
        Ok(())
    }

    /// Report fetched messages that will not be dispatched. The cursor stays before them.
    fn abandon(&self, rest: impl Iterator<Item = RawMessage>, summary: &mut RunSummary) {
        for raw in rest {
            summary.abandoned += 1;
            debug!(message_id = %raw.id, "abandoning message");
            self.events
                .publish(AgentEvent::MessageAbandoned { message_id: raw.id });
        }
    }

    async fn dispatch(
        &self,
        message: &Message,
        summary: &mut RunSummary,
        cancel: &CancellationToken,
    ) -> Result<()> {
        summary.received += 1;
        info!(message_id = %message.id, sender = %message.sender_id, "received message");
        self.events.publish(AgentEvent::MessageReceived {
            message_id: message.id.clone(),
            sender_id: message.sender_id.clone(),
        });

        let response = match self.adapter.invoke(message).await {
            Ok(response) => {
                summary.handled += 1;
                response
            }
            Err(e) => {
                summary.failed += 1;
                warn!(message_id = %message.id, error = %e, "handler failed");
                self.events.publish(AgentEvent::HandlerFailed {
                    message_id: message.id.clone(),
                    error: e.to_string(),
                });
                return Ok(());
            }
        };

        let target = message.reply_target();
        match self.publish_with_retry(&response, target, cancel).await {
            Ok(()) => {
                summary.published += 1;
                debug!(message_id = %message.id, to = ?target, "response published");
                self.events.publish(AgentEvent::ResponsePublished {
                    message_id: message.id.clone(),
                    target: target.map(str::to_string),
                });
                Ok(())
            }
            Err(e) => {
                summary.publish_failures += 1;
                warn!(message_id = %message.id, error = %e, "failed to publish response");
                self.events.publish(AgentEvent::PublishFailed {
                    message_id: message.id.clone(),
                    error: e.to_string(),
                });
                if e.is_fatal() { Err(e) } else { Ok(()) }
            }
        }
    }

    async fn publish_with_retry(
        &self,
        content: &str,
        target: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let err = match self
                .transport
                .publish(&self.frequency_id, content, target)
                .await
            {
                Ok(true) => return Ok(()),
                Ok(false) => {
                    return Err(EndercomError::Transport {
                        status: 200,
                        reason: "frequency rejected the message".into(),
                    });
                }
                Err(e) => e,
            };
            // A 4xx other than auth or unknown frequency will not improve on resend.
            let retryable = err.is_transient() && !matches!(err, EndercomError::Transport { .. });
            if !retryable || attempt > self.options.max_retries || cancel.is_cancelled() {
                return Err(err);
            }
            debug!(attempt, error = %err, "retrying publish");
            if !self.pause(attempt, &err, cancel).await {
                return Err(err);
            }
        }
    }
}
