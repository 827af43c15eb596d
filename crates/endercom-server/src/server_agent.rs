use std::sync::Arc;

use axum::Router;
use endercom_core::{Result, RunOptions, ServerOptions};
use endercom_runtime::{Agent, RunSummary};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{AppState, bind, build_router, serve_listener};

/// An agent that polls its frequency and serves the façade at the same time.
///
/// Both paths call the same handler and may do so concurrently.
pub struct ServerAgent {
    agent: Agent,
    options: ServerOptions,
    poll: bool,
}

impl ServerAgent {
    pub fn new(agent: Agent, options: ServerOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            agent,
            options,
            poll: true,
        })
    }

    /// Serve the façade only, without polling the frequency.
    pub fn without_polling(mut self) -> Self {
        self.poll = false;
        self
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// The façade router, using `run`'s handler timeout.
    pub fn router(&self, run: &RunOptions) -> Router {
        let state = AppState::new(&self.agent, self.options.clone())
            .with_handler_timeout(run.handler_timeout);
        build_router(Arc::new(state))
    }

    /// Bind, then serve and poll until `shutdown` fires.
    ///
    /// A bind failure is returned before polling starts. A fatal polling error
    /// shuts the server down and is returned. Returns the polling summary, or
    /// `None` when polling is disabled.
    pub async fn run(&self, run: RunOptions, shutdown: CancellationToken) -> Result<Option<RunSummary>> {
        run.validate()?;
        let listener = bind(&self.options.addr()).await?;
        let router = self.router(&run);
        info!(
            agent = %self.agent.options().agent_name,
            heartbeat = self.options.enable_heartbeat,
            a2a = self.options.enable_a2a,
            poll = self.poll,
            "server agent starting"
        );

        let stop = shutdown.child_token();
        let serve = async {
            let served = serve_listener(listener, router, stop.clone()).await;
            stop.cancel();
            served
        };
        let poll = async {
            if !self.poll {
                stop.cancelled().await;
                return Ok(None);
            }
            let polled = self.agent.run_async(run, stop.clone()).await;
            stop.cancel();
            polled.map(Some)
        };

        let (served, polled) = tokio::join!(serve, poll);
        let summary = polled?;
        served?;
        Ok(summary)
    }
}
