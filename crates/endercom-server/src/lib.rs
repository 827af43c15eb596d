//! # endercom-server
//!
//! HTTP surfaces for Endercom agents:
//!
//! - the server façade (`/health`, `/heartbeat`, `/a2a`, `/`, `/metrics`),
//!   which shares the agent's handler with the polling loop
//! - [`ServerAgent`], which runs the façade and polling together
//! - [`AgentFunction`], a stateless `POST /execute` endpoint

pub mod function;
pub mod metrics;
mod server_agent;

pub use function::AgentFunction;
pub use server_agent::ServerAgent;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Request, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::Utc;
use endercom_core::{
    AgentEvent, EndercomError, EventBus, HandlerAdapter, Message, Result, ServerOptions,
};
use endercom_runtime::Agent;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared façade state.
pub struct AppState {
    pub agent_name: String,
    pub frequency_id: String,
    pub options: ServerOptions,
    pub adapter: HandlerAdapter,
    pub events: EventBus,
    pub metrics: metrics::Metrics,
}

impl AppState {
    /// State for `agent`, invoking its handler with the default timeout.
    pub fn new(agent: &Agent, options: ServerOptions) -> Self {
        Self {
            agent_name: agent.options().agent_name.clone(),
            frequency_id: agent.options().frequency_id.clone(),
            options,
            adapter: HandlerAdapter::new(agent.handler()),
            events: agent.events().clone(),
            metrics: metrics::Metrics::new(),
        }
    }

    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.adapter = self.adapter.with_timeout(timeout);
        self
    }
}

/// Direct delivery body.
#[derive(Deserialize)]
struct A2aRequest {
    content: String,
    #[serde(default, alias = "from_agent")]
    sender_id: Option<String>,
    #[serde(default)]
    target_agent: Option<String>,
}

#[derive(Serialize)]
struct A2aResponse {
    response: String,
    message_id: String,
}

#[derive(Serialize)]
struct HeartbeatResponse {
    status: &'static str,
    agent_name: String,
    frequency_id: String,
    version: &'static str,
    uptime_secs: u64,
    timestamp: String,
}

/// `{"error": ...}` with a status code.
pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Build the façade router.
///
/// Disabled capabilities are not registered at all, and authentication is a
/// route layer, so a request for a disabled route is a 404 with or without a key.
pub fn build_router(state: Arc<AppState>) -> Router<()> {
    let mut routes = Router::new()
        .route("/", get(info_handler))
        .route("/metrics", get(metrics_handler));

    if state.options.enable_heartbeat {
        routes = routes
            .route("/health", get(heartbeat_handler))
            .route("/heartbeat", get(heartbeat_handler));
    }
    if state.options.enable_a2a {
        routes = routes.route("/a2a", post(a2a_handler));
    }

    if state.options.api_key.is_some() {
        routes = routes.route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));
    }

    routes
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Extract the presented key from `Authorization: Bearer` or `X-API-Key`.
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    bearer.or_else(|| headers.get("x-api-key").and_then(|v| v.to_str().ok()))
}

/// Reject requests whose key does not match the configured one.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if let Some(ref expected_key) = state.options.api_key {
        match presented_key(&headers) {
            Some(key) if key.trim() == expected_key => {}
            _ => {
                state.metrics.inc_auth_rejections();
                warn!(path = %request.uri().path(), "unauthorized request, invalid or missing API key");
                return error_response(StatusCode::UNAUTHORIZED, "invalid or missing API key");
            }
        }
    }
    next.run(request).await
}

async fn heartbeat_handler(State(state): State<Arc<AppState>>) -> Json<HeartbeatResponse> {
    state.metrics.inc_http_requests();
    Json(HeartbeatResponse {
        status: "alive",
        agent_name: state.agent_name.clone(),
        frequency_id: state.frequency_id.clone(),
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.metrics.uptime_secs(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn info_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.metrics.inc_http_requests();
    let mut endpoints = vec!["GET /", "GET /metrics"];
    if state.options.enable_heartbeat {
        endpoints.extend(["GET /health", "GET /heartbeat"]);
    }
    if state.options.enable_a2a {
        endpoints.push("POST /a2a");
    }
    Json(json!({
        "name": state.agent_name,
        "frequency_id": state.frequency_id,
        "version": env!("CARGO_PKG_VERSION"),
        "capabilities": {
            "heartbeat": state.options.enable_heartbeat,
            "a2a": state.options.enable_a2a,
        },
        "auth_required": state.options.api_key.is_some(),
        "endpoints": endpoints,
    }))
}

async fn metrics_handler(
    State(state): State<Arc<AppState>>,
) -> (
    StatusCode,
    [(axum::http::header::HeaderName, &'static str); 1],
    String,
) {
    state.metrics.inc_http_requests();
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.metrics.render_prometheus(),
    )
}

/// Run one message through the handler and answer with its result.
/// The response is not published to the frequency.
async fn a2a_handler(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<A2aRequest>, JsonRejection>,
) -> Response {
    state.metrics.inc_http_requests();
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };
    if req.content.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "content must not be empty");
    }

    let message = Message::direct(req.content, req.sender_id, req.target_agent);
    debug!(message_id = %message.id, sender = %message.sender_id, "direct delivery");

    let outcome = state.adapter.invoke(&message).await;
    state.events.publish(AgentEvent::DirectDelivery {
        message_id: message.id.clone(),
        ok: outcome.is_ok(),
    });

    match outcome {
        Ok(response) => {
            state.metrics.inc_a2a_deliveries();
            Json(A2aResponse {
                response,
                message_id: message.id,
            })
            .into_response()
        }
        Err(e) => {
            state.metrics.inc_a2a_failures();
            warn!(message_id = %message.id, error = %e, "direct delivery handler failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Bind a listener. Failure to bind is fatal.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| EndercomError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })
}

/// Serve `router` until `shutdown` fires, then drain in-flight requests.
pub async fn serve_listener(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_default();
    info!(addr = %addr, "HTTP server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| EndercomError::Server(format!("server error: {}", e)))?;
    info!(addr = %addr, "HTTP server stopped");
    Ok(())
}

/// Bind `addr` and serve the façade for `agent` until `shutdown` fires.
pub async fn start_server(
    agent: &Agent,
    options: ServerOptions,
    shutdown: CancellationToken,
) -> Result<()> {
    options.validate()?;
    let addr = options.addr();
    let router = build_router(Arc::new(AppState::new(agent, options)));
    let listener = bind(&addr).await?;
    serve_listener(listener, router, shutdown).await
}
