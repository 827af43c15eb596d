use std::time::Duration;

use crate::error::{EndercomError, Result};

pub const DEFAULT_BASE_URL: &str = "https://endercom.io";
pub const DEFAULT_AGENT_NAME: &str = "endercom-agent";

// ── Agent ──────────────────────────────────────────────────────

/// Identity and transport settings for one agent. Validated once, read-only afterwards.
#[derive(Clone)]
pub struct AgentOptions {
    /// Frequency API key, sent as a bearer credential.
    pub api_key: String,
    pub frequency_id: String,
    /// Display name reported by the heartbeat and service info routes.
    pub agent_name: String,
    /// Root of the frequency service, e.g. "https://endercom.io".
    pub base_url: String,
}

impl AgentOptions {
    pub fn new(api_key: impl Into<String>, frequency_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            frequency_id: frequency_id.into(),
            agent_name: DEFAULT_AGENT_NAME.into(),
            base_url: DEFAULT_BASE_URL.into(),
        }
    }

    pub fn with_agent_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = name.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Fail fast on values that would only surface later as network errors.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(invalid("api_key", "must not be empty"));
        }
        if self.frequency_id.trim().is_empty() {
            return Err(invalid("frequency_id", "must not be empty"));
        }
        if self
            .frequency_id
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#'))
        {
            return Err(invalid(
                "frequency_id",
                &format!("'{}' contains characters not allowed in an id", self.frequency_id),
            ));
        }
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| invalid("base_url", &format!("'{}': {}", self.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("base_url", "scheme must be http or https"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for AgentOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentOptions")
            .field("api_key", &"<redacted>")
            .field("frequency_id", &self.frequency_id)
            .field("agent_name", &self.agent_name)
            .field("base_url", &self.base_url)
            .finish()
    }
}

// ── Run ────────────────────────────────────────────────────────

/// Timing for the polling engine. Has no effect on the server façade.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Time between the start of two consecutive polls.
    pub poll_interval: Duration,
    /// Upper bound for a single handler invocation.
    pub handler_timeout: Duration,
    /// Extra attempts after a transient fetch or publish failure.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// How many recently dispatched message ids are remembered to reject repeats.
    pub dedup_window: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            handler_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(30),
            dedup_window: 10_000,
        }
    }
}

impl RunOptions {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(invalid("poll_interval", "must be positive"));
        }
        if self.handler_timeout.is_zero() {
            return Err(invalid("handler_timeout", "must be positive"));
        }
        if self.retry_base_delay > self.retry_max_delay {
            return Err(invalid(
                "retry_base_delay",
                "must not exceed retry_max_delay",
            ));
        }
        if self.dedup_window == 0 {
            return Err(invalid("dedup_window", "must be at least 1"));
        }
        Ok(())
    }
}

// ── Server ─────────────────────────────────────────────────────

/// Surface exposed by the server façade.
#[derive(Clone)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
    /// Expose `GET /health` and `GET /heartbeat`.
    pub enable_heartbeat: bool,
    /// Expose `POST /a2a`. When false the route does not exist at all.
    pub enable_a2a: bool,
    /// When set, every route requires this key.
    pub api_key: Option<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            enable_heartbeat: true,
            enable_a2a: true,
            api_key: None,
        }
    }
}

impl ServerOptions {
    pub fn addr(&self) -> String {
        socket_addr(&self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(invalid("server.host", "must not be empty"));
        }
        if matches!(self.api_key.as_deref(), Some(k) if k.trim().is_empty()) {
            return Err(invalid(
                "server.api_key",
                "is set but empty; omit it to disable authentication",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ServerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("enable_heartbeat", &self.enable_heartbeat)
            .field("enable_a2a", &self.enable_a2a)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ── Function ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FunctionOptions {
    pub host: String,
    pub port: u16,
}

impl Default for FunctionOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3002,
        }
    }
}

impl FunctionOptions {
    pub fn addr(&self) -> String {
        socket_addr(&self.host, self.port)
    }
}

fn socket_addr(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

fn invalid(field: &str, reason: &str) -> EndercomError {
    EndercomError::ConfigValidation {
        field: field.into(),
        reason: reason.into(),
    }
}
