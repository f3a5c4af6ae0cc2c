//! Shared helpers for socket-level integration tests.
//!
//! Starts a coordinator on an ephemeral loopback port and provides a raw
//! line-oriented agent so tests can drive the wire protocol directly.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use device_relay::agent::Notifier;
use device_relay::config::AgentConfig;
use device_relay::coordinator::acceptor::Acceptor;
use device_relay::coordinator::{RelayEvent, SessionRegistry};
use device_relay::Result;

/// Upper bound for any single wait in these tests.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// A coordinator running on `127.0.0.1:0`.
pub struct TestCoordinator {
    pub addr: SocketAddr,
    pub registry: SessionRegistry,
    pub events: mpsc::Receiver<RelayEvent>,
    pub cancel: CancellationToken,
    pub handle: JoinHandle<Result<()>>,
}

impl TestCoordinator {
    /// Wait for the next event, failing the test after [`STEP_TIMEOUT`].
    pub async fn next_event(&mut self) -> RelayEvent {
        within(self.events.recv())
            .await
            .expect("event channel closed unexpectedly")
    }

    /// Skip events until `pick` accepts one.
    pub async fn event_matching<T>(&mut self, mut pick: impl FnMut(RelayEvent) -> Option<T>) -> T {
        loop {
            if let Some(found) = pick(self.next_event().await) {
                return found;
            }
        }
    }

    /// Wait until the registry holds exactly `count` sessions.
    pub async fn wait_for_len(&self, count: usize) {
        within(async {
            while self.registry.len().await != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
    }
}

/// Bind and start a coordinator with the given per-session queue capacity.
pub async fn start_coordinator(queue_capacity: usize) -> TestCoordinator {
    let registry = SessionRegistry::new();
    let (event_tx, events) = mpsc::channel(256);
    let acceptor = Acceptor::bind("127.0.0.1:0", registry.clone(), event_tx, queue_capacity)
        .await
        .expect("bind ephemeral port");
    let addr = acceptor.local_addr().expect("local addr");
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(acceptor.run(cancel.clone()));

    TestCoordinator {
        addr,
        registry,
        events,
        cancel,
        handle,
    }
}

/// A bare TCP peer speaking the line protocol by hand.
pub struct RawAgent {
    pub lines: Lines<BufReader<OwnedReadHalf>>,
    pub writer: OwnedWriteHalf,
}

impl RawAgent {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read_half, writer) = stream.into_split();
        Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        }
    }

    /// Write one raw line (a `\n` is appended).
    pub async fn send_line(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("write line");
    }

    /// Next line from the coordinator, or `None` at EOF.
    pub async fn next_line(&mut self) -> Option<String> {
        within(self.lines.next_line()).await.expect("read line")
    }
}

/// Agent configuration pointing at `addr` with heartbeats disabled.
pub fn agent_config(addr: SocketAddr, label: &str) -> AgentConfig {
    AgentConfig {
        server_addr: addr.to_string(),
        label: label.to_owned(),
        heartbeat_seconds: 0,
        ..AgentConfig::default()
    }
}

/// Notifier that records every message.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("lock").clone()
    }

    /// Poll until some recorded message satisfies `pred`.
    pub async fn wait_for(&self, pred: impl Fn(&str) -> bool) {
        within(async {
            while !self.messages().iter().any(|m| pred(m)) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages.lock().expect("lock").push(message.to_owned());
    }
}

/// Await `fut`, failing the test after [`STEP_TIMEOUT`].
pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(STEP_TIMEOUT, fut)
        .await
        .expect("step timed out")
}

/// An address on which nothing is listening.
pub async fn unused_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    addr
}
