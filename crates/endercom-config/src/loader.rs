use std::path::{Path, PathBuf};

use endercom_core::{EndercomError, Result};
use tracing::{debug, info, warn};

use crate::schema::EndercomConfig;

/// Loads the Endercom configuration.
pub struct ConfigLoader {
    config: EndercomConfig,
    config_path: PathBuf,
    from_file: bool,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > ENDERCOM_CONFIG env > ~/.endercom/endercom.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("ENDERCOM_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".endercom")
            .join("endercom.toml")
    }

    /// Load the config from disk, falling back to defaults, then apply env
    /// overrides and reject configs with validation errors.
    ///
    /// An explicitly given path must exist; the default location may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let loader = Self::read(path)?;
        match loader.config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    debug!("{}", w);
                }
            }
            Err(e) => return Err(EndercomError::Config(e)),
        }
        Ok(loader)
    }

    /// Like [`load`](Self::load) but without validation, for reporting.
    pub fn read(path: Option<&Path>) -> Result<Self> {
        let config_path = Self::resolve_path(path);
        let from_file = config_path.exists();
        let config = if from_file {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::parse(&raw, &config_path)?
        } else if path.is_some() {
            return Err(EndercomError::Config(format!(
                "config file not found: {}",
                config_path.display()
            )));
        } else {
            debug!(?config_path, "no config file, using defaults");
            EndercomConfig::default()
        };

        Ok(Self {
            config: Self::apply_env_overrides(config),
            config_path,
            from_file,
        })
    }

    pub fn parse(raw: &str, source: &Path) -> Result<EndercomConfig> {
        toml::from_str::<EndercomConfig>(raw).map_err(|e| {
            EndercomError::Config(format!("failed to parse {}: {}", source.display(), e))
        })
    }

    pub fn get(&self) -> &EndercomConfig {
        &self.config
    }

    pub fn into_config(self) -> EndercomConfig {
        self.config
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Whether a file was actually read, as opposed to pure defaults.
    pub fn from_file(&self) -> bool {
        self.from_file
    }

    /// Apply env var overrides (FREQUENCY_API_KEY, FREQUENCY_ID, etc.)
    pub fn apply_env_overrides(config: EndercomConfig) -> EndercomConfig {
        Self::apply_overrides(config, |name| std::env::var(name).ok())
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) with a custom lookup.
    pub fn apply_overrides(
        mut config: EndercomConfig,
        var: impl Fn(&str) -> Option<String>,
    ) -> EndercomConfig {
        let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("FREQUENCY_API_KEY") {
            config.agent.api_key = Some(v);
        }
        if let Some(v) = var("FREQUENCY_ID") {
            config.agent.frequency_id = Some(v);
        }
        if let Some(v) = var("AGENT_NAME") {
            config.agent.name = v;
        }
        if let Some(v) = var("BASE_URL") {
            config.agent.base_url = v;
        }
        if let Some(v) = var("ENDERCOM_LOG_LEVEL") {
            config.logging.level = v;
        }
        // Seconds, fractional allowed.
        if let Some(v) = var("ENDERCOM_POLL_INTERVAL") {
            match v.trim().parse::<f64>() {
                Ok(secs) if secs > 0.0 && secs.is_finite() => {
                    config.run.poll_interval_ms = (secs * 1000.0).round() as u64;
                }
                _ => warn!(value = %v, "ignoring invalid ENDERCOM_POLL_INTERVAL"),
            }
        }
        config
    }
}
