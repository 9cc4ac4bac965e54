use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use evalgate_cli::{
    api_client::{ApiClient, ApiReply},
    config::{load_gateway_config, read_source},
};
use evalgate_core::{
    BackendKind, EvaluationMode, EvaluationRequest, Gateway, wire::EvaluateBody,
};
use std::{path::PathBuf, time::Duration};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Gateway server URL
    #[arg(
        long,
        short = 'u',
        default_value = "http://localhost:3000",
        env = "EVALGATE_API_URL",
        global = true
    )]
    api_url: String,

    /// Gateway configuration file for local runs
    #[arg(short, long, env = "EVALGATE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Print compact instead of pretty JSON
    #[arg(long, global = true)]
    compact: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate source on a running gateway
    Eval(SourceArgs),

    /// Describe a running gateway
    Info,

    /// Evaluate source locally, without a server
    Run(RunArgs),
}

#[derive(Parser)]
struct SourceArgs {
    /// Source text; `-` reads stdin
    source: Option<String>,

    /// Read the source from a file
    #[arg(short, long, conflicts_with = "source")]
    file: Option<PathBuf>,

    /// expression or script; the gateway default applies when omitted
    #[arg(short, long)]
    mode: Option<EvaluationMode>,
}

#[derive(Parser)]
struct RunArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Override the configured backend
    #[arg(short, long)]
    backend: Option<BackendKind>,

    /// Override the interpreter program. Unless --interpreter-arg is given it
    /// is started with the bundled python runner arguments (`-c <runner>`)
    #[arg(long)]
    interpreter: Option<String>,

    /// Argument for the interpreter program, replacing the runner arguments (repeatable)
    #[arg(long = "interpreter-arg", allow_hyphen_values = true)]
    interpreter_args: Vec<String>,

    /// Evaluation deadline in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Answer with the fallback evaluator when the interpreter is missing
    #[arg(long)]
    fallback_on_unavailable: bool,
}

const DEFAULT_CONFIG: &str = "evalgate.json";

fn output_json(body: &serde_json::Value, compact: bool) -> Result<()> {
    let output = if compact {
        serde_json::to_string(body)
    } else {
        serde_json::to_string_pretty(body)
    }
    .context("JSON serialization error")?;
    println!("{}", output);
    Ok(())
}

/// Prints the reply; returns whether it was a success.
fn report(reply: &ApiReply, compact: bool) -> Result<bool> {
    output_json(&reply.body, compact)?;
    Ok(reply.is_success())
}

async fn eval_remote(cli: &Cli, args: &SourceArgs) -> Result<bool> {
    let source = read_source(args.source.as_deref(), args.file.as_ref())?;
    let client = ApiClient::new(&cli.api_url);
    let reply = client
        .evaluate(&EvaluateBody {
            source: Some(source),
            mode: args.mode,
        })
        .await?;
    debug!(status = reply.status, "gateway answered");
    report(&reply, cli.compact)
}

async fn run_local(cli: &Cli, args: &RunArgs) -> Result<bool> {
    let (path, explicit) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };
    let mut config = load_gateway_config(&path, explicit)?;
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    config
        .interpreter
        .override_command(args.interpreter.as_deref(), &args.interpreter_args);
    if let Some(timeout_ms) = args.timeout_ms {
        config.interpreter.timeout = Duration::from_millis(timeout_ms);
    }
    if args.fallback_on_unavailable {
        config.fallback_on_unavailable = true;
    }
    info!(backend = %config.backend, "Config loaded.");

    let gateway = Gateway::from_config(&config)?;
    let source = read_source(args.source.source.as_deref(), args.source.file.as_ref())?;
    let mode = args.source.mode.unwrap_or(gateway.default_mode());
    let request = EvaluationRequest::new(source, mode)?;

    let (status, body) = gateway.evaluate(&request).await.into_wire();
    report(&ApiReply { status, body }, cli.compact)
}

async fn run(cli: &Cli) -> Result<bool> {
    match &cli.command {
        Commands::Eval(args) => eval_remote(cli, args).await,
        Commands::Info => {
            let discovery = ApiClient::new(&cli.api_url).describe().await?;
            output_json(&serde_json::to_value(discovery)?, cli.compact)?;
            Ok(true)
        }
        Commands::Run(args) => run_local(cli, args).await,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}
