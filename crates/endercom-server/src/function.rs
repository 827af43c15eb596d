//! Stateless function endpoint: one handler behind `POST /execute`, plus
//! info, health and metrics routes.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use endercom_core::{
    EndercomError, FunctionHandler, FunctionInvoker, FunctionOptions, Result,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error_response;
use crate::metrics::Metrics;

/// A named function served over HTTP.
///
/// # Example
/// ```no_run
/// use endercom_core::function_fn;
/// use endercom_server::AgentFunction;
///
/// let f = AgentFunction::new("Echo", "Echoes its input", ["echo"])
///     .handler(function_fn(|input| Ok(input)));
/// ```
#[derive(Clone)]
pub struct AgentFunction {
    name: String,
    description: String,
    capabilities: Vec<String>,
    invoker: Option<FunctionInvoker>,
    timeout: Option<Duration>,
}

struct FunctionState {
    function: AgentFunction,
    metrics: Metrics,
}

#[derive(Deserialize)]
struct ExecuteRequest {
    #[serde(default)]
    input: Value,
}

#[derive(Serialize)]
struct ExecuteResponse {
    output: Value,
}

impl AgentFunction {
    pub fn new<I, S>(
        name: impl Into<String>,
        description: impl Into<String>,
        capabilities: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            description: description.into(),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            invoker: None,
            timeout: None,
        }
    }

    /// Register the handler. Replaces any previous one.
    pub fn handler(mut self, handler: Arc<dyn FunctionHandler>) -> Self {
        let mut invoker = FunctionInvoker::new(handler);
        if let Some(timeout) = self.timeout {
            invoker = invoker.with_timeout(timeout);
        }
        self.invoker = Some(invoker);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self.invoker = self.invoker.map(|i| i.with_timeout(timeout));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Call the handler directly, outside HTTP.
    pub async fn execute(&self, input: Value) -> Result<Value> {
        let invoker = self
            .invoker
            .as_ref()
            .ok_or_else(|| EndercomError::Config(format!("function '{}' has no handler", self.name)))?;
        Ok(invoker.execute(input).await?)
    }

    pub fn router(&self) -> Router {
        let state = Arc::new(FunctionState {
            function: self.clone(),
            metrics: Metrics::new(),
        });
        Router::new()
            .route("/", get(info_handler))
            .route("/health", get(health_handler))
            .route("/execute", post(execute_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve until `shutdown` fires.
    pub async fn serve(&self, options: &FunctionOptions, shutdown: CancellationToken) -> Result<()> {
        if self.invoker.is_none() {
            return Err(EndercomError::Config(format!(
                "function '{}' has no handler",
                self.name
            )));
        }
        let listener = crate::bind(&options.addr()).await?;
        info!(function = %self.name, addr = %options.addr(), "function endpoint starting");
        crate::serve_listener(listener, self.router(), shutdown).await
    }

    /// Blocking entry point. Serves until Ctrl-C.
    pub fn run(&self, options: &FunctionOptions) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(EndercomError::Io)?;
        runtime.block_on(async {
            let shutdown = CancellationToken::new();
            let on_signal = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received, stopping");
                    on_signal.cancel();
                }
            });
            self.serve(options, shutdown).await
        })
    }
}

async fn info_handler(State(state): State<Arc<FunctionState>>) -> Json<Value> {
    state.metrics.inc_http_requests();
    let f = &state.function;
    Json(json!({
        "name": f.name,
        "description": f.description,
        "capabilities": f.capabilities,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["GET /", "GET /health", "GET /metrics", "POST /execute"],
    }))
}

async fn health_handler(State(state): State<Arc<FunctionState>>) -> Json<Value> {
    state.metrics.inc_http_requests();
    Json(json!({
        "status": "healthy",
        "name": state.function.name,
        "uptime_secs": state.metrics.uptime_secs(),
    }))
}

async fn metrics_handler(State(state): State<Arc<FunctionState>>) -> Response {
    state.metrics.inc_http_requests();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.metrics.render_function_prometheus(),
    )
        .into_response()
}

async fn execute_handler(
    State(state): State<Arc<FunctionState>>,
    body: std::result::Result<Json<ExecuteRequest>, JsonRejection>,
) -> Response {
    state.metrics.inc_http_requests();
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    match state.function.execute(req.input).await {
        Ok(output) => {
            state.metrics.inc_executions();
            Json(ExecuteResponse { output }).into_response()
        }
        Err(e) => {
            state.metrics.inc_execution_failures();
            warn!(function = %state.function.name, error = %e, "function execution failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
