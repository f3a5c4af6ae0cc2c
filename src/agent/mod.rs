//! Agent side of the relay.
//!
//! An agent holds exactly one connection to the coordinator. It announces
//! itself with `DEVICE_CONNECTED`, optionally sends heartbeats, and answers
//! each command through its [`CommandExecutor`].
//!
//! # State machine
//!
//! ```text
//! Disconnected ──run_session──▶ Connecting ──connect ok──▶ Connected
//!      ▲                            │                          │
//!      └──────── connect failed ────┘◀──── transport closed ───┘
//! ```
//!
//! A reconnect is a fresh [`AgentClient::run_session`] call; nothing from
//! the previous connection is resumed.

pub mod executor;
pub mod notifier;
pub mod simulated;

use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::AgentConfig;
use crate::protocol::codec::FrameCodec;
use crate::protocol::writer::run_writer;
use crate::protocol::{Command, Decoded, Report, ReportKind};
use crate::{AppError, Result};

pub use executor::CommandExecutor;
pub use notifier::{LogNotifier, Notifier};
pub use simulated::SimulatedDevice;

/// Outbound report queue depth.
const OUTBOUND_QUEUE: usize = 32;

/// Connection state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// No connection.
    Disconnected,
    /// Connection attempt in progress.
    Connecting,
    /// Connected and serving commands.
    Connected,
}

/// Agent that connects to a coordinator and serves its commands.
#[derive(Debug)]
pub struct AgentClient<N> {
    config: AgentConfig,
    executor: CommandExecutor<N>,
    state_tx: watch::Sender<AgentState>,
}

impl<N: Notifier> AgentClient<N> {
    /// Create an agent in the `Disconnected` state.
    pub fn new(config: AgentConfig, notifier: N) -> Self {
        let device = SimulatedDevice::from_config(&config);
        let (state_tx, _) = watch::channel(AgentState::Disconnected);
        Self {
            config,
            executor: CommandExecutor::new(device, notifier),
            state_tx,
        }
    }

    /// Current state.
    pub fn state(&self) -> AgentState {
        *self.state_tx.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<AgentState> {
        self.state_tx.subscribe()
    }

    /// Connect, announce, and serve commands until the connection ends.
    ///
    /// Returns `Ok(())` once a connected session has ended (coordinator
    /// closed the stream, a transport error occurred, or `cancel` fired).
    /// The state is `Disconnected` again on every return path.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] if the connection cannot be
    /// established or the announcement cannot be queued.
    pub async fn run_session(&self, cancel: CancellationToken) -> Result<()> {
        let server = self.config.server_addr.clone();
        let span = info_span!("agent_session", %server);

        async move {
            self.set_state(AgentState::Connecting);

            let stream = match TcpStream::connect(&server).await {
                Ok(stream) => stream,
                Err(err) => {
                    self.set_state(AgentState::Disconnected);
                    self.executor
                        .notifier()
                        .notify(&format!("Failed to connect to server: {err}"));
                    return Err(AppError::Transport(format!(
                        "failed to connect to {server}: {err}"
                    )));
                }
            };
            if let Err(err) = stream.set_nodelay(true) {
                debug!(%err, "could not disable nagle");
            }

            let (read_half, write_half) = stream.into_split();
            let session_cancel = cancel.child_token();
            let (frame_tx, frame_rx) = mpsc::channel::<Report>(OUTBOUND_QUEUE);

            let writer_cancel = session_cancel.clone();
            let writer_conn = server.clone();
            let writer = tokio::spawn(async move {
                let result = run_writer(writer_conn, write_half, frame_rx, writer_cancel.clone()).await;
                writer_cancel.cancel();
                result
            });

            let hello = Report::with_payload(ReportKind::DeviceConnected, self.config.label.clone());
            if frame_tx.send(hello).await.is_err() {
                session_cancel.cancel();
                self.set_state(AgentState::Disconnected);
                return Err(AppError::Transport("writer stopped before announcement".into()));
            }

            self.set_state(AgentState::Connected);
            info!(label = %self.config.label, "connected to coordinator");
            self.executor.notifier().notify("Connected to server!");

            let heartbeat = (self.config.heartbeat_seconds > 0).then(|| {
                tokio::spawn(run_heartbeat(
                    self.config.label.clone(),
                    Duration::from_secs(self.config.heartbeat_seconds),
                    frame_tx.clone(),
                    session_cancel.clone(),
                ))
            });

            let reason =
                run_command_loop(read_half, &self.executor, &frame_tx, &session_cancel).await;

            session_cancel.cancel();
            if let Some(heartbeat) = heartbeat {
                if let Err(err) = heartbeat.await {
                    warn!(%err, "heartbeat task panicked");
                }
            }
            drop(frame_tx);
            match writer.await {
                Ok(Err(err)) => debug!(%err, "writer ended with error"),
                Err(err) => warn!(%err, "writer task panicked"),
                Ok(Ok(())) => {}
            }

            self.set_state(AgentState::Disconnected);
            info!(reason, "disconnected from coordinator");
            self.executor.notifier().notify("Disconnected from server");
            Ok(())
        }
        .instrument(span)
        .await
    }

    fn set_state(&self, state: AgentState) {
        self.state_tx.send_replace(state);
        debug!(?state, "agent state changed");
    }
}

/// Agent receive loop: decode commands, execute them, queue the replies.
///
/// Returns the reason the loop ended. Unknown command tags are ignored.
pub async fn run_command_loop<R, N>(
    reader: R,
    executor: &CommandExecutor<N>,
    frame_tx: &mpsc::Sender<Report>,
    cancel: &CancellationToken,
) -> String
where
    R: AsyncRead + Unpin + Send,
    N: Notifier,
{
    let mut framed = FramedRead::new(reader, FrameCodec::new());

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                break "session cancelled".to_owned();
            }

            item = framed.next() => {
                let line = match item {
                    None => break "stream closed".to_owned(),
                    Some(Err(e)) => {
                        warn!(error = %e, "command loop: read failed, stopping");
                        break format!("stream error: {e}");
                    }
                    Some(Ok(line)) => line,
                };

                let command = match Command::decode(&line) {
                    Decoded::Frame(command) => command,
                    Decoded::Unknown { tag } => {
                        debug!(tag, "command loop: skipping unknown command tag");
                        continue;
                    }
                };

                if let Some(report) = executor.execute(&command) {
                    if frame_tx.send(report).await.is_err() {
                        break "writer stopped".to_owned();
                    }
                }
            }
        }
    }
}

async fn run_heartbeat(
    label: String,
    every: Duration,
    frame_tx: mpsc::Sender<Report>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately; DEVICE_CONNECTED already covers it.
    ticker.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let beat = Report::with_payload(ReportKind::Heartbeat, label.clone());
                if frame_tx.send(beat).await.is_err() {
                    break;
                }
            }
        }
    }
}
