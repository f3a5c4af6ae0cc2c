#![forbid(unsafe_code)]

//! `device-relay-agent`: agent companion for `device-relay`.
//!
//! Connects to the coordinator, announces itself, and answers commands
//! with simulated reports until the connection ends.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use device_relay::agent::{AgentClient, LogNotifier};
use device_relay::{AppError, RelayConfig, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "device-relay-agent",
    about = "Agent for the device relay coordinator",
    version,
    long_about = None
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the coordinator address (`host:port`).
    #[arg(long)]
    server: Option<String>,

    /// Override the label announced to the coordinator.
    #[arg(long)]
    label: Option<String>,

    /// Start a fresh connection attempt after each disconnect.
    #[arg(long)]
    reconnect: bool,

    /// Delay before a reconnect attempt.
    #[arg(long, default_value_t = 5)]
    reconnect_delay_secs: u64,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => RelayConfig::load_from_path(path)?,
        None => RelayConfig::default(),
    };
    if let Some(server) = args.server {
        config.agent.server_addr = server;
    }
    if let Some(label) = args.label {
        config.agent.label = label;
    }
    config.validate()?;

    let client = AgentClient::new(config.agent, LogNotifier);
    let ct = CancellationToken::new();

    let signal_ct = ct.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "ctrl-c signal handler failed");
        }
        signal_ct.cancel();
    });

    loop {
        let result = client.run_session(ct.clone()).await;

        if ct.is_cancelled() {
            info!("agent shut down");
            return Ok(());
        }
        if !args.reconnect {
            return result;
        }
        if let Err(err) = result {
            warn!(%err, "session attempt failed");
        }

        info!(delay_secs = args.reconnect_delay_secs, "reconnecting after delay");
        tokio::select! {
            () = ct.cancelled() => return Ok(()),
            () = tokio::time::sleep(Duration::from_secs(args.reconnect_delay_secs)) => {}
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
