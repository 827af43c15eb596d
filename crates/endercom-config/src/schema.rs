use std::time::Duration;

use endercom_core::{
    AgentOptions, EndercomError, FunctionOptions, RunOptions, ServerOptions,
    options::{DEFAULT_AGENT_NAME, DEFAULT_BASE_URL},
};
use serde::{Deserialize, Serialize};

/// Root configuration, maps to `endercom.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndercomConfig {
    pub agent: AgentConfig,
    pub run: RunConfig,
    pub server: ServerConfig,
    pub function: FunctionConfig,
    pub logging: LoggingConfig,
}

// ── Agent ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Frequency API key. Usually supplied via `FREQUENCY_API_KEY`.
    pub api_key: Option<String>,
    pub frequency_id: Option<String>,
    pub name: String,
    pub base_url: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            frequency_id: None,
            name: DEFAULT_AGENT_NAME.into(),
            base_url: DEFAULT_BASE_URL.into(),
        }
    }
}

// ── Run ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub poll_interval_ms: u64,
    pub handler_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub dedup_window: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        let d = RunOptions::default();
        Self {
            poll_interval_ms: d.poll_interval.as_millis() as u64,
            handler_timeout_secs: d.handler_timeout.as_secs(),
            max_retries: d.max_retries,
            retry_base_delay_ms: d.retry_base_delay.as_millis() as u64,
            retry_max_delay_ms: d.retry_max_delay.as_millis() as u64,
            dedup_window: d.dedup_window,
        }
    }
}

// ── Server ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Start the HTTP façade alongside polling.
    pub enabled: bool,
    /// Keep polling the frequency while serving.
    pub poll: bool,
    pub host: String,
    pub port: u16,
    pub heartbeat: bool,
    pub a2a: bool,
    /// Required on every request when set.
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let d = ServerOptions::default();
        Self {
            enabled: false,
            poll: true,
            host: d.host,
            port: d.port,
            heartbeat: d.enable_heartbeat,
            a2a: d.enable_a2a,
            api_key: None,
        }
    }
}

// ── Function ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub description: String,
    pub timeout_secs: u64,
}

impl Default for FunctionConfig {
    fn default() -> Self {
        let d = FunctionOptions::default();
        Self {
            host: d.host,
            port: d.port,
            name: "data-processor".into(),
            description: "Summary statistics over a list of numbers".into(),
            timeout_secs: 30,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, or error.
    pub level: String,
    /// "pretty" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Conversions ────────────────────────────────────────────────

impl EndercomConfig {
    /// Agent identity. Fails if the key or frequency is missing or invalid.
    pub fn agent_options(&self) -> Result<AgentOptions, EndercomError> {
        let api_key = self.agent.api_key.clone().ok_or_else(|| {
            EndercomError::Config(
                "agent.api_key is not set (config file or FREQUENCY_API_KEY)".into(),
            )
        })?;
        let frequency_id = self.agent.frequency_id.clone().ok_or_else(|| {
            EndercomError::Config(
                "agent.frequency_id is not set (config file or FREQUENCY_ID)".into(),
            )
        })?;
        let options = AgentOptions::new(api_key, frequency_id)
            .with_agent_name(&self.agent.name)
            .with_base_url(&self.agent.base_url);
        options.validate()?;
        Ok(options)
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            poll_interval: Duration::from_millis(self.run.poll_interval_ms),
            handler_timeout: Duration::from_secs(self.run.handler_timeout_secs),
            max_retries: self.run.max_retries,
            retry_base_delay: Duration::from_millis(self.run.retry_base_delay_ms),
            retry_max_delay: Duration::from_millis(self.run.retry_max_delay_ms),
            dedup_window: self.run.dedup_window,
        }
    }

    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            host: self.server.host.clone(),
            port: self.server.port,
            enable_heartbeat: self.server.heartbeat,
            enable_a2a: self.server.a2a,
            api_key: self.server.api_key.clone(),
        }
    }

    pub fn function_options(&self) -> FunctionOptions {
        FunctionOptions {
            host: self.function.host.clone(),
            port: self.function.port,
        }
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "<redacted>".to_string());
        let mut out = self.clone();
        out.agent.api_key = mask(&self.agent.api_key);
        out.server.api_key = mask(&self.server.api_key);
        out
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "❌",
            WarningSeverity::Warning => "⚠️ ",
            WarningSeverity::Info => "💡",
        };
        write!(f, "{} {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl EndercomConfig {
    /// Validate the config and return every issue found.
    /// Returns `Err` with the error messages joined if any issue is an Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let warnings = self.issues();
        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| w.to_string())
            .collect();
        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(errors.join("\n"))
        }
    }

    /// Every issue, errors included.
    pub fn issues(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        // ── Agent identity ───
        // Missing credentials only matter to commands that talk to a frequency.
        if self.agent.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            warnings.push(ConfigWarning {
                field: "agent.api_key".into(),
                message: "no frequency API key configured".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set FREQUENCY_API_KEY or agent.api_key".into()),
            });
        }
        if self.agent.frequency_id.as_deref().is_none_or(|f| f.trim().is_empty()) {
            warnings.push(ConfigWarning {
                field: "agent.frequency_id".into(),
                message: "no frequency id configured".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set FREQUENCY_ID or agent.frequency_id".into()),
            });
        }
        let base = &self.agent.base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            warnings.push(ConfigWarning {
                field: "agent.base_url".into(),
                message: format!("'{}' is not an http(s) URL", base),
                severity: WarningSeverity::Error,
                hint: Some(format!("Default is '{}'", DEFAULT_BASE_URL)),
            });
        } else if base.starts_with("http://") && !is_local(base) {
            warnings.push(ConfigWarning {
                field: "agent.base_url".into(),
                message: "API key will be sent over plain http".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Use https for remote frequency services".into()),
            });
        }

        // ── Run timing ───
        if self.run.poll_interval_ms == 0 {
            warnings.push(ConfigWarning {
                field: "run.poll_interval_ms".into(),
                message: "poll interval is 0".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 2000".into()),
            });
        } else if self.run.poll_interval_ms < 250 {
            warnings.push(ConfigWarning {
                field: "run.poll_interval_ms".into(),
                message: format!("polling every {}ms is very aggressive", self.run.poll_interval_ms),
                severity: WarningSeverity::Warning,
                hint: Some("The frequency service may rate-limit you".into()),
            });
        }
        if self.run.handler_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "run.handler_timeout_secs".into(),
                message: "handler timeout is 0, every handler would time out".into(),
                severity: WarningSeverity::Error,
                hint: None,
            });
        }
        if self.run.retry_base_delay_ms > self.run.retry_max_delay_ms {
            warnings.push(ConfigWarning {
                field: "run.retry_base_delay_ms".into(),
                message: "retry base delay exceeds retry max delay".into(),
                severity: WarningSeverity::Error,
                hint: None,
            });
        }
        if self.run.dedup_window == 0 {
            warnings.push(ConfigWarning {
                field: "run.dedup_window".into(),
                message: "dedup window must hold at least one id".into(),
                severity: WarningSeverity::Error,
                hint: Some("Default is 10000".into()),
            });
        }

        // ── Server ───
        if matches!(self.server.api_key.as_deref(), Some(k) if k.trim().is_empty()) {
            warnings.push(ConfigWarning {
                field: "server.api_key".into(),
                message: "api_key is set but empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Remove it to disable authentication".into()),
            });
        }
        if self.server.enabled
            && self.server.a2a
            && self.server.api_key.is_none()
            && !is_loopback(&self.server.host)
        {
            warnings.push(ConfigWarning {
                field: "server.a2a".into(),
                message: format!("/a2a is reachable on {} without authentication", self.server.host),
                severity: WarningSeverity::Info,
                hint: Some("Set server.api_key to require a key".into()),
            });
        }
        if self.server.enabled && !self.server.poll && !self.server.a2a {
            warnings.push(ConfigWarning {
                field: "server".into(),
                message: "polling and /a2a are both off, no messages will be handled".into(),
                severity: WarningSeverity::Warning,
                hint: None,
            });
        }
        if self.function.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "function.timeout_secs".into(),
                message: "function timeout is 0, every execution would time out".into(),
                severity: WarningSeverity::Error,
                hint: None,
            });
        }
        if self.server.port == self.function.port && self.server.port != 0 {
            warnings.push(ConfigWarning {
                field: "function.port".into(),
                message: format!("same port as server.port ({})", self.server.port),
                severity: WarningSeverity::Info,
                hint: Some("Only matters if both run on one host".into()),
            });
        }

        // ── Logging ───
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", LOG_LEVELS.join(", "))),
            });
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "compact" | "json") {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some("Use 'pretty', 'compact' or 'json'".into()),
            });
        }

        warnings
    }
}

fn is_loopback(host: &str) -> bool {
    matches!(host, "127.0.0.1" | "::1" | "localhost")
}

fn is_local(url: &str) -> bool {
    let rest = url.trim_start_matches("http://");
    ["localhost", "127.0.0.1", "[::1]"]
        .iter()
        .any(|h| rest.starts_with(h))
}
