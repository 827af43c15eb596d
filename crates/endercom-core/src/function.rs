//! Stateless function handlers: one JSON input, one JSON output.

use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use tracing::warn;

use crate::error::HandlerError;
use crate::handler::{DEFAULT_HANDLER_TIMEOUT, panic_message};

#[async_trait]
pub trait FunctionHandler: Send + Sync {
    async fn call(&self, input: Value) -> anyhow::Result<Value>;
}

/// Wrap a synchronous closure; runs on the blocking pool.
pub fn function_fn<F>(f: F) -> Arc<dyn FunctionHandler>
where
    F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    Arc::new(SyncFunction { f: Arc::new(f) })
}

/// Wrap an async closure.
pub fn async_function_fn<F, Fut>(f: F) -> Arc<dyn FunctionHandler>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(AsyncFunction {
        f,
        _fut: PhantomData,
    })
}

struct SyncFunction<F> {
    f: Arc<F>,
}

#[async_trait]
impl<F> FunctionHandler for SyncFunction<F>
where
    F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    async fn call(&self, input: Value) -> anyhow::Result<Value> {
        let f = Arc::clone(&self.f);
        match tokio::task::spawn_blocking(move || (*f)(input)).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(anyhow::anyhow!("function task cancelled: {e}")),
        }
    }
}

struct AsyncFunction<F, Fut> {
    f: F,
    _fut: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> FunctionHandler for AsyncFunction<F, Fut>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn call(&self, input: Value) -> anyhow::Result<Value> {
        (self.f)(input).await
    }
}

/// Calls a [`FunctionHandler`] so that nothing it does escapes unconverted.
#[derive(Clone)]
pub struct FunctionInvoker {
    handler: Arc<dyn FunctionHandler>,
    timeout: Duration,
}

impl FunctionInvoker {
    pub fn new(handler: Arc<dyn FunctionHandler>) -> Self {
        Self {
            handler,
            timeout: DEFAULT_HANDLER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn execute(&self, input: Value) -> Result<Value, HandlerError> {
        let call = AssertUnwindSafe(self.handler.call(input)).catch_unwind();
        match tokio::time::timeout(self.timeout, call).await {
            Err(_) => {
                warn!(timeout = ?self.timeout, "function timed out");
                Err(HandlerError::TimedOut(self.timeout))
            }
            Ok(Err(panic)) => {
                let reason = panic_message(panic.as_ref());
                warn!(panic = %reason, "function panicked");
                Err(HandlerError::Panicked(reason))
            }
            Ok(Ok(Err(e))) => Err(HandlerError::Failed(format!("{e:#}"))),
            Ok(Ok(Ok(output))) => Ok(output),
        }
    }
}
