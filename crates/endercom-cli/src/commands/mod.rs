use clap::{Parser, Subcommand};
use std::path::PathBuf;

use endercom_config::{ConfigLoader, EndercomConfig, WarningSeverity};
use endercom_core::{EndercomError, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

mod agent;
mod function;
mod send;

use function::FunctionKind;

/// Endercom: run agents on Endercom frequencies
#[derive(Parser)]
#[command(name = "endercom", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to endercom.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the configured frequency and answer with the demo handler
    Agent {
        /// Also serve /health, /heartbeat and /a2a
        #[arg(long)]
        server: bool,
        /// Serve only, without polling (requires --server)
        #[arg(long)]
        no_poll: bool,
        /// Server port (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Publish one message on the frequency
    Send {
        /// Message content
        content: String,
        /// Target agent id (omit to broadcast)
        #[arg(long)]
        to: Option<String>,
    },
    /// Serve a built-in function endpoint
    Function {
        /// Function to serve
        #[arg(short, long, value_enum, default_value_t = FunctionKind::Data)]
        kind: FunctionKind,
        /// Port to listen on (overrides function.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check configuration and report problems
    Doctor,
    /// Show version and build info
    Version,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        // Doctor reports problems instead of refusing to start on them.
        let config_loader = match self.command {
            Commands::Doctor => ConfigLoader::read(self.config.as_deref())?,
            _ => ConfigLoader::load(self.config.as_deref())?,
        };
        let config = config_loader.get();

        // Resolve log level: --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level
                .as_deref()
                .unwrap_or(config.logging.level.as_str())
        };
        init_tracing(log_level, &config.logging.format);

        match self.command {
            Commands::Agent {
                server,
                no_poll,
                port,
            } => agent::cmd_agent(config, server, no_poll, port).await,
            Commands::Send { content, to } => send::cmd_send(config, &content, to.as_deref()).await,
            Commands::Function { kind, port } => function::cmd_function(config, kind, port).await,
            Commands::Config { json } => Self::cmd_config(config, json),
            Commands::Doctor => Self::cmd_doctor(&config_loader),
            Commands::Version => Self::cmd_version(),
        }
    }

    fn cmd_config(config: &EndercomConfig, json: bool) -> Result<()> {
        let shown = config.redacted();
        if json {
            println!("{}", serde_json::to_string_pretty(&shown)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&shown).map_err(|e| EndercomError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    fn cmd_doctor(loader: &ConfigLoader) -> Result<()> {
        println!("🩺 Endercom doctor");
        if loader.from_file() {
            println!("   Config: {}", loader.path().display());
        } else {
            println!("   Config: {} (not found, using defaults)", loader.path().display());
        }
        println!();

        let warnings = loader.get().issues();
        if warnings.is_empty() {
            println!("✅ No problems found");
            return Ok(());
        }
        for w in &warnings {
            println!("{w}");
        }
        let errors = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .count();
        println!();
        println!("{} issue(s), {} error(s)", warnings.len(), errors);

        if errors > 0 {
            Err(EndercomError::Config(format!(
                "{errors} configuration error(s) found"
            )))
        } else {
            Ok(())
        }
    }

    fn cmd_version() -> Result<()> {
        println!("endercom {}", env!("CARGO_PKG_VERSION"));
        println!("   Default service: {}", endercom_core::options::DEFAULT_BASE_URL);
        Ok(())
    }
}

fn init_tracing(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    match format {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .init(),
        "compact" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .with_target(false)
            .init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
    }
}

/// A token cancelled on Ctrl-C.
pub(crate) fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            on_signal.cancel();
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_flags() {
        let cli = Cli::try_parse_from(["endercom", "agent", "--server", "--no-poll", "-p", "9000"])
            .unwrap();
        match cli.command {
            Commands::Agent {
                server,
                no_poll,
                port,
            } => {
                assert!(server);
                assert!(no_poll);
                assert_eq!(port, Some(9000));
            }
            _ => panic!("expected agent command"),
        }
    }

    #[test]
    fn test_send_with_target() {
        let cli = Cli::try_parse_from(["endercom", "send", "hello", "--to", "agent-b"]).unwrap();
        match cli.command {
            Commands::Send { content, to } => {
                assert_eq!(content, "hello");
                assert_eq!(to.as_deref(), Some("agent-b"));
            }
            _ => panic!("expected send command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["endercom", "doctor", "-c", "/tmp/e.toml", "-v"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/e.toml")));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["endercom", "version", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_function_kind_defaults_to_data() {
        let cli = Cli::try_parse_from(["endercom", "function"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Function { kind: FunctionKind::Data, port: None }
        ));

        let cli = Cli::try_parse_from(["endercom", "function", "--kind", "echo"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Function { kind: FunctionKind::Echo, .. }
        ));
        assert!(Cli::try_parse_from(["endercom", "function", "--kind", "sql"]).is_err());
    }

    #[test]
    fn test_send_requires_content() {
        assert!(Cli::try_parse_from(["endercom", "send"]).is_err());
    }
}
