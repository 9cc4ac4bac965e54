use anyhow::{Context, Result};
use clap::Parser;
use evalgate_core::{BackendKind, EvaluationMode, GatewayConfig};
use evalgate_http::{init_tracing, server::ServerConfig, start_with_config};
use std::{path::PathBuf, time::Duration};
use tracing::info;

/// Execution gateway HTTP server
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Host address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "EVALGATE_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 3000, env = "EVALGATE_PORT")]
    port: u16,

    /// Gateway configuration file (JSON)
    #[arg(short, long, env = "EVALGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Evaluation backend: subprocess, fallback or relay
    #[arg(short, long, env = "EVALGATE_BACKEND")]
    backend: Option<BackendKind>,

    /// Mode used when a request does not name one: expression or script
    #[arg(long, env = "EVALGATE_DEFAULT_MODE")]
    default_mode: Option<EvaluationMode>,

    /// Interpreter program for the subprocess backend. Unless --interpreter-arg
    /// is given it is started with the bundled python runner arguments (`-c <runner>`)
    #[arg(long, env = "EVALGATE_INTERPRETER")]
    interpreter: Option<String>,

    /// Argument for the interpreter program, replacing the runner arguments (repeatable)
    #[arg(long = "interpreter-arg", allow_hyphen_values = true)]
    interpreter_args: Vec<String>,

    /// Evaluation deadline in milliseconds
    #[arg(long, env = "EVALGATE_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Answer with the fallback evaluator when the interpreter is missing
    #[arg(long)]
    fallback_on_unavailable: bool,

    /// Internal endpoint for the relay backend
    #[arg(long, env = "EVALGATE_RELAY_URL")]
    relay_url: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl Cli {
    /// File configuration with command line overrides applied.
    fn gateway_config(&self) -> Result<GatewayConfig> {
        let mut config = match &self.config {
            Some(path) => GatewayConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => GatewayConfig::default(),
        };
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(mode) = self.default_mode {
            config.default_mode = mode;
        }
        config
            .interpreter
            .override_command(self.interpreter.as_deref(), &self.interpreter_args);
        if let Some(timeout_ms) = self.timeout_ms {
            config.interpreter.timeout = Duration::from_millis(timeout_ms);
        }
        if self.fallback_on_unavailable {
            config.fallback_on_unavailable = true;
        }
        if let Some(url) = &self.relay_url {
            config.relay.endpoint = url.clone();
        }
        config.validate().context("invalid gateway configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = ServerConfig {
        host: cli.host.clone(),
        port: cli.port,
        gateway: cli.gateway_config()?,
    };
    info!(
        backend = %config.gateway.backend,
        "Starting evalgate HTTP server on {}:{}", config.host, config.port
    );

    start_with_config(config)
        .await
        .map_err(|err| anyhow::anyhow!("{}", err))
}
