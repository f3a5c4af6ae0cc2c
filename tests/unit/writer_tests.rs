//! Unit tests for the outbound frame writer task.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use device_relay::protocol::writer::run_writer;
use device_relay::protocol::{Command, CommandKind};

#[tokio::test]
async fn frames_are_written_in_queue_order() {
    let (client, server) = tokio::io::duplex(1024);
    let (tx, rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();

    let writer = tokio::spawn(run_writer("test".into(), client, rx, cancel));

    tx.send(Command::with_payload(CommandKind::ShowMessage, "one"))
        .await
        .expect("send");
    tx.send(Command::bare(CommandKind::GetLocation))
        .await
        .expect("send");
    drop(tx);

    let mut lines = BufReader::new(server).lines();
    assert_eq!(
        lines.next_line().await.expect("read").as_deref(),
        Some("SHOW_MESSAGE:one")
    );
    assert_eq!(
        lines.next_line().await.expect("read").as_deref(),
        Some("GET_LOCATION")
    );

    writer
        .await
        .expect("join")
        .expect("writer must exit cleanly when the queue closes");
    assert_eq!(
        lines.next_line().await.expect("read"),
        None,
        "dropping the writer must close the stream"
    );
}

#[tokio::test]
async fn cancellation_stops_the_writer() {
    let (client, _server) = tokio::io::duplex(64);
    let (_tx, rx) = mpsc::channel::<Command>(8);
    let cancel = CancellationToken::new();

    let writer = tokio::spawn(run_writer("test".into(), client, rx, cancel.clone()));
    cancel.cancel();

    writer
        .await
        .expect("join")
        .expect("cancellation is a clean exit");
}

#[tokio::test]
async fn write_to_closed_peer_is_a_transport_error() {
    let (client, server) = tokio::io::duplex(64);
    drop(server);
    let (tx, rx) = mpsc::channel(8);

    let writer = tokio::spawn(run_writer(
        "test".into(),
        client,
        rx,
        CancellationToken::new(),
    ));
    tx.send(Command::bare(CommandKind::GetDeviceInfo))
        .await
        .expect("send");

    let err = writer
        .await
        .expect("join")
        .expect_err("the write must fail");
    assert!(err.to_string().starts_with("transport: write failed"));
}
