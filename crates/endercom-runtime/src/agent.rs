use std::sync::Arc;

use endercom_core::{
    AgentOptions, EchoHandler, EndercomError, EventBus, HandlerAdapter, MessageHandler, Result,
    RunOptions,
};
use endercom_transport::{HttpTransport, Transport};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::{PollingEngine, RunSummary};
use crate::handle::RunHandle;

/// An agent bound to one frequency.
///
/// Owns the transport, the message handler, and the event bus. Cloning is
/// cheap and clones share all three.
#[derive(Clone)]
pub struct Agent {
    options: AgentOptions,
    transport: Arc<dyn Transport>,
    handler: Arc<dyn MessageHandler>,
    events: EventBus,
}

impl Agent {
    /// Build an agent that talks to the frequency over HTTP.
    pub fn new(options: AgentOptions) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&options)?);
        Self::with_transport(options, transport)
    }

    /// Build an agent on a caller-supplied transport.
    pub fn with_transport(options: AgentOptions, transport: Arc<dyn Transport>) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            transport,
            handler: Arc::new(EchoHandler),
            events: EventBus::default(),
        })
    }

    /// Replace the message handler. Runs already started keep the old one.
    pub fn set_message_handler(&mut self, handler: Arc<dyn MessageHandler>) {
        self.handler = handler;
    }

    pub fn with_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.set_message_handler(handler);
        self
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    pub fn handler(&self) -> Arc<dyn MessageHandler> {
        self.handler.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// Publish `content` on the frequency, to `target_agent` or to everyone.
    ///
    /// Returns whether the frequency accepted the message.
    pub async fn send_message(&self, content: &str, target_agent: Option<&str>) -> Result<bool> {
        let target = target_agent.filter(|t| !t.is_empty());
        let accepted = self
            .transport
            .publish(&self.options.frequency_id, content, target)
            .await?;
        debug!(to = ?target, accepted, "sent message");
        Ok(accepted)
    }

    fn engine(&self, options: RunOptions) -> Result<PollingEngine> {
        options.validate()?;
        let adapter =
            HandlerAdapter::new(self.handler.clone()).with_timeout(options.handler_timeout);
        Ok(PollingEngine::new(
            self.transport.clone(),
            self.options.frequency_id.clone(),
            adapter,
            options,
            self.events.clone(),
        ))
    }

    /// Poll until `cancel` fires or a fatal error stops the run.
    pub async fn run_async(&self, options: RunOptions, cancel: CancellationToken) -> Result<RunSummary> {
        self.engine(options)?.run(cancel).await
    }

    /// Start polling on the current tokio runtime and return a handle to it.
    pub fn spawn(&self, options: RunOptions) -> Result<RunHandle> {
        let engine = self.engine(options)?;
        let state = engine.state();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(engine.run(cancel.clone()));
        Ok(RunHandle::new(cancel, state, self.events.clone(), task))
    }

    /// Blocking entry point. Builds a runtime, polls until Ctrl-C or a fatal error.
    pub fn run(&self, options: RunOptions) -> Result<RunSummary> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(EndercomError::Io)?;

        runtime.block_on(async {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received, stopping");
                    on_signal.cancel();
                }
            });
            self.run_async(options, cancel).await
        })
    }
}
