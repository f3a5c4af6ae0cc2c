//! Agent connection lifecycle against a hand-driven coordinator socket.
//!
//! The test side plays the coordinator with a bare `TcpListener` so the
//! agent's exact wire behaviour is visible.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use device_relay::agent::simulated::SIMULATED_LOCATION;
use device_relay::agent::{run_command_loop, AgentClient, AgentState, CommandExecutor, SimulatedDevice};
use device_relay::protocol::{Report, ReportKind};
use device_relay::AppError;

use super::test_helpers::{agent_config, unused_addr, within, RecordingNotifier};

#[tokio::test]
async fn failed_connect_returns_to_disconnected() {
    let addr = unused_addr().await;
    let notifier = RecordingNotifier::new();
    let client = AgentClient::new(agent_config(addr, "Android Device"), Arc::clone(&notifier));

    let err = client
        .run_session(CancellationToken::new())
        .await
        .expect_err("nothing is listening");

    assert!(matches!(err, AppError::Transport(_)));
    assert_eq!(client.state(), AgentState::Disconnected);
    assert!(notifier
        .messages()
        .iter()
        .any(|m| m.starts_with("Failed to connect to server: ")));
}

#[tokio::test]
async fn session_announces_serves_and_ends_on_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let notifier = RecordingNotifier::new();
    let client = Arc::new(AgentClient::new(
        agent_config(addr, "Test Agent"),
        Arc::clone(&notifier),
    ));
    let mut states = client.subscribe();
    assert_eq!(client.state(), AgentState::Disconnected);

    let session = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.run_session(CancellationToken::new()).await })
    };

    let (stream, _) = within(listener.accept()).await.expect("accept");
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    assert_eq!(
        within(lines.next_line()).await.expect("read").as_deref(),
        Some("DEVICE_CONNECTED:Test Agent"),
        "the announcement must be the first frame"
    );
    within(states.wait_for(|state| *state == AgentState::Connected))
        .await
        .expect("state channel open");
    notifier.wait_for(|m| m == "Connected to server!").await;

    // Unknown tags are skipped; the next command is still served.
    write_half
        .write_all(b"SELF_DESTRUCT\nGET_LOCATION:extra\nGET_LOCATION\n")
        .await
        .expect("write");
    assert_eq!(
        within(lines.next_line()).await.expect("read"),
        Some(format!("LOCATION:{SIMULATED_LOCATION}"))
    );

    write_half
        .write_all(b"SHOW_MESSAGE:hello from the console\n")
        .await
        .expect("write");
    notifier
        .wait_for(|m| m == "💬 Server: hello from the console")
        .await;

    drop(write_half);
    drop(lines);

    within(session)
        .await
        .expect("join")
        .expect("a session that ends by remote close is Ok");
    assert_eq!(client.state(), AgentState::Disconnected);
    assert_eq!(
        notifier.messages().last().map(String::as_str),
        Some("Disconnected from server")
    );
}

#[tokio::test]
async fn reconnect_is_a_fresh_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let client = Arc::new(AgentClient::new(
        agent_config(addr, "Phone"),
        RecordingNotifier::new(),
    ));

    for _ in 0..2 {
        let session = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.run_session(CancellationToken::new()).await })
        };
        let (stream, _) = within(listener.accept()).await.expect("accept");
        let mut lines = BufReader::new(stream).lines();
        assert_eq!(
            within(lines.next_line()).await.expect("read").as_deref(),
            Some("DEVICE_CONNECTED:Phone"),
            "every connection re-announces"
        );
        drop(lines);
        within(session).await.expect("join").expect("clean end");
        assert_eq!(client.state(), AgentState::Disconnected);
    }
}

#[tokio::test]
async fn heartbeat_is_sent_on_the_configured_interval() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let mut config = agent_config(addr, "Beating");
    config.heartbeat_seconds = 1;
    let client = Arc::new(AgentClient::new(config, RecordingNotifier::new()));
    let cancel = CancellationToken::new();

    let session = {
        let client = Arc::clone(&client);
        let cancel = cancel.clone();
        tokio::spawn(async move { client.run_session(cancel).await })
    };

    let (stream, _) = within(listener.accept()).await.expect("accept");
    let mut lines = BufReader::new(stream).lines();
    assert_eq!(
        within(lines.next_line()).await.expect("read").as_deref(),
        Some("DEVICE_CONNECTED:Beating")
    );
    assert_eq!(
        within(lines.next_line()).await.expect("read").as_deref(),
        Some("HEARTBEAT:Beating")
    );

    cancel.cancel();
    within(session).await.expect("join").expect("cancel ends cleanly");
    assert_eq!(client.state(), AgentState::Disconnected);
}

#[tokio::test]
async fn command_loop_answers_over_any_stream() {
    let (agent_side, mut coordinator_side) = tokio::io::duplex(1024);
    let executor = CommandExecutor::new(SimulatedDevice::new("Pixel 7", "14"), RecordingNotifier::new());
    let (tx, mut rx) = mpsc::channel::<Report>(4);
    let cancel = CancellationToken::new();

    coordinator_side
        .write_all(b"GET_DEVICE_INFO\nNOT_A_COMMAND\n")
        .await
        .expect("write");
    drop(coordinator_side);

    let reason = run_command_loop(agent_side, &executor, &tx, &cancel).await;

    assert_eq!(reason, "stream closed");
    let report = rx.try_recv().expect("one report queued");
    assert_eq!(report.kind(), ReportKind::DeviceInfo);
    assert!(rx.try_recv().is_err(), "unknown command must not produce a reply");
}
