//! Inbound connection acceptor.
//!
//! Owns the coordinator's listening socket. Every accepted connection
//! becomes a registered [`Session`] with its own writer task and receive
//! loop. An accept failure ends the acceptor with an error: the listener is
//! the coordinator's only way in, and retrying a broken socket would spin.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::coordinator::receiver::run_receive_loop;
use crate::coordinator::registry::SessionRegistry;
use crate::coordinator::session::Session;
use crate::coordinator::RelayEvent;
use crate::protocol::writer::run_writer;
use crate::protocol::Command;
use crate::{AppError, Result};

/// Listening half of the coordinator.
#[derive(Debug)]
pub struct Acceptor {
    listener: TcpListener,
    registry: SessionRegistry,
    events: mpsc::Sender<RelayEvent>,
    queue_capacity: usize,
}

impl Acceptor {
    /// Bind the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] if the address cannot be bound, or
    /// [`AppError::Config`] if `queue_capacity` is zero.
    pub async fn bind(
        addr: &str,
        registry: SessionRegistry,
        events: mpsc::Sender<RelayEvent>,
        queue_capacity: usize,
    ) -> Result<Self> {
        if queue_capacity == 0 {
            return Err(AppError::Config(
                "queue_capacity must be greater than zero".into(),
            ));
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|err| AppError::Transport(format!("failed to bind {addr}: {err}")))?;

        Ok(Self {
            listener,
            registry,
            events,
            queue_capacity,
        })
    }

    /// Address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] if the socket address is unavailable.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|err| AppError::Transport(format!("listener address unavailable: {err}")))
    }

    /// Accept connections until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] on the first accept failure.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let local = self.local_addr()?;
        let span = info_span!("acceptor", %local);

        async move {
            info!("relay listening");
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!("acceptor shutting down");
                        return Ok(());
                    }
                    accept_result = self.listener.accept() => {
                        match accept_result {
                            Ok((stream, peer)) => {
                                attach_session(
                                    stream,
                                    peer,
                                    &self.registry,
                                    &self.events,
                                    self.queue_capacity,
                                )
                                .await;
                            }
                            Err(err) => {
                                error!(%err, "accept failed, acceptor stopping");
                                return Err(AppError::Transport(format!("accept failed: {err}")));
                            }
                        }
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// Register an accepted connection and start its writer task and receive
/// loop.
pub async fn attach_session(
    stream: TcpStream,
    peer: SocketAddr,
    registry: &SessionRegistry,
    events: &mpsc::Sender<RelayEvent>,
    queue_capacity: usize,
) -> Arc<Session> {
    if let Err(err) = stream.set_nodelay(true) {
        debug!(%peer, %err, "could not disable nagle");
    }

    let (read_half, write_half) = stream.into_split();
    let (frame_tx, frame_rx) = mpsc::channel::<Command>(queue_capacity);
    let session = registry.register(peer, frame_tx).await;
    let device_id = session.id().clone();

    info!(%device_id, %peer, "new device connected");

    let writer_session = Arc::clone(&session);
    tokio::spawn(async move {
        let conn = writer_session.id().to_string();
        let result = run_writer(conn, write_half, frame_rx, writer_session.cancel_token()).await;
        if let Err(err) = result {
            warn!(device_id = %writer_session.id(), %err, "writer failed, closing session");
            writer_session.disconnect();
        }
    });

    let connected = RelayEvent::Connected {
        device_id: device_id.clone(),
        peer,
    };
    if events.send(connected).await.is_err() {
        debug!(%device_id, "acceptor: event channel closed");
    }

    tokio::spawn(run_receive_loop(
        Arc::clone(&session),
        read_half,
        registry.clone(),
        events.clone(),
    ));

    session
}
