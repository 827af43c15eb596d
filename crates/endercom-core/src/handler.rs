//! Handler adapter: one invocation contract over sync and async user handlers.
//!
//! User code implements [`MessageHandler`] directly, or wraps a closure with
//! [`handler_fn`] (synchronous, run on the blocking pool) or
//! [`async_handler_fn`]. Both the polling engine and the server façade call
//! handlers only through [`HandlerAdapter::invoke`], which awaits completion,
//! bounds execution time, and converts errors and panics into [`HandlerError`].

use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, warn};

use crate::error::HandlerError;
use crate::message::Message;

/// Default bound for one invocation when the caller does not choose one.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

/// Caller-supplied logic mapping an inbound message to a textual response.
///
/// Implementations may be invoked concurrently from the polling engine and
/// the server façade; any state they hold must tolerate that.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: Message) -> anyhow::Result<String>;
}

/// Wrap a synchronous closure. Each call runs on tokio's blocking pool so a
/// slow handler never stalls the poll timer or the HTTP server.
pub fn handler_fn<F>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(&Message) -> anyhow::Result<String> + Send + Sync + 'static,
{
    Arc::new(SyncHandler { f: Arc::new(f) })
}

/// Wrap an async closure.
pub fn async_handler_fn<F, Fut>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
{
    Arc::new(AsyncHandler {
        f,
        _fut: PhantomData,
    })
}

struct SyncHandler<F> {
    f: Arc<F>,
}

#[async_trait]
impl<F> MessageHandler for SyncHandler<F>
where
    F: Fn(&Message) -> anyhow::Result<String> + Send + Sync + 'static,
{
    async fn handle(&self, message: Message) -> anyhow::Result<String> {
        let f = Arc::clone(&self.f);
        match tokio::task::spawn_blocking(move || (*f)(&message)).await {
            Ok(result) => result,
            // Re-raise so the adapter reports it as a panic, not a plain failure.
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(anyhow::anyhow!("handler task cancelled: {e}")),
        }
    }
}

struct AsyncHandler<F, Fut> {
    f: F,
    _fut: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> MessageHandler for AsyncHandler<F, Fut>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
{
    async fn handle(&self, message: Message) -> anyhow::Result<String> {
        (self.f)(message).await
    }
}

/// Handler used when none is configured: replies `Echo: <content>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

#[async_trait]
impl MessageHandler for EchoHandler {
    async fn handle(&self, message: Message) -> anyhow::Result<String> {
        Ok(format!("Echo: {}", message.content))
    }
}

/// The single path through which user handlers are invoked.
#[derive(Clone)]
pub struct HandlerAdapter {
    handler: Arc<dyn MessageHandler>,
    timeout: Duration,
}

impl HandlerAdapter {
    pub fn new(handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            handler,
            timeout: DEFAULT_HANDLER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the handler to completion and return its response.
    ///
    /// On timeout the handler future is dropped; a synchronous handler
    /// already running on the blocking pool finishes in the background and
    /// its result is discarded.
    pub async fn invoke(&self, message: &Message) -> Result<String, HandlerError> {
        let call = AssertUnwindSafe(self.handler.handle(message.clone())).catch_unwind();
        match tokio::time::timeout(self.timeout, call).await {
            Err(_) => {
                warn!(message_id = %message.id, timeout = ?self.timeout, "handler timed out");
                Err(HandlerError::TimedOut(self.timeout))
            }
            Ok(Err(panic)) => {
                let reason = panic_message(panic.as_ref());
                warn!(message_id = %message.id, panic = %reason, "handler panicked");
                Err(HandlerError::Panicked(reason))
            }
            Ok(Ok(Err(e))) => {
                debug!(message_id = %message.id, error = %e, "handler returned an error");
                Err(HandlerError::Failed(format!("{e:#}")))
            }
            Ok(Ok(Ok(text))) => Ok(text),
        }
    }
}

impl Default for HandlerAdapter {
    fn default() -> Self {
        Self::new(Arc::new(EchoHandler))
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
