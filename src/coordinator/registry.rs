//! Live registry of agent sessions.
//!
//! The registry is the only state shared between the acceptor, every
//! receive loop, the dispatcher and the console. All access goes through
//! a single [`RwLock`]; identities come from an atomic counter and are
//! never reused while the process runs.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::coordinator::session::{DeviceId, Session};
use crate::protocol::Command;

#[derive(Debug, Default)]
struct RegistryInner {
    last_seq: AtomicU64,
    sessions: RwLock<HashMap<DeviceId, Arc<Session>>>,
}

/// Concurrent map of [`DeviceId`] → [`Session`].
///
/// Cheap to clone; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh identity, build the session and insert it.
    pub async fn register(&self, peer: SocketAddr, outbound: mpsc::Sender<Command>) -> Arc<Session> {
        let seq = self.inner.last_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let session = Arc::new(Session::new(seq, peer, outbound));

        self.inner
            .sessions
            .write()
            .await
            .insert(session.id().clone(), Arc::clone(&session));
        debug!(device_id = %session.id(), %peer, "registry: session registered");

        session
    }

    /// Look up a session by identity.
    pub async fn lookup(&self, device_id: &DeviceId) -> Option<Arc<Session>> {
        self.inner.sessions.read().await.get(device_id).cloned()
    }

    /// Remove a session. Idempotent: removing an unknown identity is a no-op.
    pub async fn remove(&self, device_id: &DeviceId) -> Option<Arc<Session>> {
        let removed = self.inner.sessions.write().await.remove(device_id);
        if removed.is_some() {
            debug!(%device_id, "registry: session removed");
        }
        removed
    }

    /// Point-in-time copy of every registered session, ordered by
    /// registration.
    pub async fn snapshot(&self) -> Vec<(DeviceId, Arc<Session>)> {
        let mut entries: Vec<_> = self
            .inner
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, session)| (id.clone(), Arc::clone(session)))
            .collect();
        entries.sort_by_key(|(_, session)| session.seq());
        entries
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    /// Whether no session is registered.
    pub async fn is_empty(&self) -> bool {
        self.inner.sessions.read().await.is_empty()
    }

    /// Disconnect every registered session. Used on shutdown.
    ///
    /// Sessions deregister themselves as their receive loops exit.
    pub async fn disconnect_all(&self) -> usize {
        let sessions = self.snapshot().await;
        for (_, session) in &sessions {
            session.disconnect();
        }
        sessions.len()
    }
}
