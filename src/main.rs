#![forbid(unsafe_code)]

//! `device-relay` coordinator binary.
//!
//! Loads configuration, starts the acceptor and the event consumer, and
//! runs the operator console on stdin until `exit`, end of input, a
//! shutdown signal, or an acceptor failure.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use device_relay::coordinator::acceptor::Acceptor;
use device_relay::coordinator::console::{Console, HELP_TEXT};
use device_relay::coordinator::interpreter::run_event_consumer;
use device_relay::coordinator::SessionRegistry;
use device_relay::{AppError, RelayConfig, Result};

/// Relay event queue depth between receive loops and the console printer.
const EVENT_QUEUE: usize = 256;

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "device-relay", about = "Device relay coordinator", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listen address (`host:port`).
    #[arg(long)]
    bind: Option<String>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("device-relay coordinator bootstrap");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?;
    let result = runtime.block_on(run(args));

    // Do not wait for the blocking stdin reader.
    runtime.shutdown_background();
    result
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match &args.config {
        Some(path) => RelayConfig::load_from_path(path)?,
        None => RelayConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.coordinator.bind_addr = bind;
    }
    config.validate()?;
    info!(bind_addr = %config.coordinator.bind_addr, "configuration loaded");

    // ── Start acceptor ──────────────────────────────────
    let registry = SessionRegistry::new();
    let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE);
    let acceptor = Acceptor::bind(
        &config.coordinator.bind_addr,
        registry.clone(),
        event_tx,
        config.coordinator.queue_capacity,
    )
    .await?;
    println!("📱 Device relay listening on {}", acceptor.local_addr()?);

    let ct = CancellationToken::new();
    let mut acceptor_handle = tokio::spawn(acceptor.run(ct.clone()));
    let printer_handle = tokio::spawn(run_event_consumer(event_rx, tokio::io::stdout()));

    // ── Operator console ────────────────────────────────
    println!("{HELP_TEXT}");
    let console = Console::new(registry.clone());
    let console_ct = ct.clone();
    let mut console_handle = tokio::spawn(async move {
        console
            .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), console_ct)
            .await
    });

    let mut outcome = Ok(());
    tokio::select! {
        joined = &mut acceptor_handle => {
            outcome = flatten(joined);
            if let Err(err) = &outcome {
                error!(%err, "acceptor stopped");
            }
        }
        joined = &mut console_handle => {
            if let Err(err) = flatten(joined) {
                error!(%err, "console stopped");
            }
        }
        () = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    // ── Shutdown ────────────────────────────────────────
    ct.cancel();
    let closed = registry.disconnect_all().await;
    info!(closed, "sessions disconnected");

    // The console task may be parked on a blocking stdin read.
    console_handle.abort();
    if !acceptor_handle.is_finished() {
        if let Err(err) = flatten(acceptor_handle.await) {
            warn!(%err, "acceptor ended with error during shutdown");
        }
    }
    printer_handle.abort();

    info!("device-relay shut down");
    outcome
}

fn flatten(joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    joined.map_err(|err| AppError::Io(format!("task failed: {err}")))?
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
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
