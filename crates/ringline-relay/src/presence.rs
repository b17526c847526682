//! Presence registry: maps each identity to its one live connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ringline_common::{Identity, ServerControl, ServerFrame};
use tokio::sync::{mpsc, RwLock};

/// Process-unique id of one accepted connection.
pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Why a frame could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The connection's outbound buffer is full.
    Full,
    /// The connection task has gone away.
    Closed,
}

/// Handle to one live client connection.
///
/// Cloning shares the same outbound queue; equality is by connection id.
#[derive(Debug, Clone)]
pub struct ConnectionRef {
    id: ConnectionId,
    tx: mpsc::Sender<String>,
}

impl ConnectionRef {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            tx,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a text frame without waiting.
    pub fn try_deliver(&self, text: String) -> Result<(), DeliveryError> {
        self.tx.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

impl PartialEq for ConnectionRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionRef {}

/// One registered identity.
#[derive(Debug, Clone)]
pub struct PresenceEntry {
    pub identity: Identity,
    pub connection: ConnectionRef,
    pub registered_at: Instant,
}

/// Both indexes live under a single lock so they never disagree.
#[derive(Default)]
struct PresenceState {
    by_identity: HashMap<Identity, PresenceEntry>,
    by_connection: HashMap<ConnectionId, Identity>,
}

impl PresenceState {
    /// Queue `frame` on every connection except `skip`.
    fn broadcast(&self, frame: &ServerFrame, skip: ConnectionId) {
        let json = frame.to_json();
        for entry in self.by_identity.values() {
            if entry.connection.id() == skip {
                continue;
            }
            if let Err(e) = entry.connection.try_deliver(json.clone()) {
                tracing::debug!(
                    identity = %entry.identity,
                    error = ?e,
                    "Presence broadcast not delivered"
                );
            }
        }
    }
}

/// Thread-safe presence registry shared by all connection handlers.
#[derive(Clone, Default)]
pub struct PresenceRegistry {
    state: Arc<RwLock<PresenceState>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `connection` as the live connection for `identity`.
    ///
    /// Any prior entry is replaced (last write wins) and returned so the
    /// caller can tell the stale connection it was superseded. Every other
    /// connection is told the identity is online.
    pub async fn register(
        &self,
        identity: &Identity,
        connection: ConnectionRef,
    ) -> Option<ConnectionRef> {
        let mut state = self.state.write().await;

        let replaced = state.by_identity.remove(identity).map(|old| {
            state.by_connection.remove(&old.connection.id());
            old.connection
        });

        let id = connection.id();
        state.by_connection.insert(id, identity.clone());
        state.by_identity.insert(
            identity.clone(),
            PresenceEntry {
                identity: identity.clone(),
                connection,
                registered_at: Instant::now(),
            },
        );

        state.broadcast(
            &ServerFrame::Control(ServerControl::PresenceOnline {
                identity: identity.clone(),
            }),
            id,
        );

        tracing::info!(
            identity = %identity,
            connection = id,
            replaced = replaced.is_some(),
            "Identity registered"
        );
        replaced
    }

    /// Live connection for `identity`, if any.
    pub async fn lookup(&self, identity: &Identity) -> Option<ConnectionRef> {
        self.state
            .read()
            .await
            .by_identity
            .get(identity)
            .map(|e| e.connection.clone())
    }

    /// Identity currently bound to `connection`, if it has not been replaced.
    pub async fn identity_of(&self, connection: ConnectionId) -> Option<Identity> {
        self.state.read().await.by_connection.get(&connection).cloned()
    }

    /// Remove the entry owned by `connection`.
    ///
    /// A no-op when a newer registration has already replaced it, so a slow
    /// disconnect can never evict a fresh reconnect. Returns the identity
    /// that went offline.
    pub async fn unregister(&self, connection: &ConnectionRef) -> Option<Identity> {
        let mut state = self.state.write().await;
        let identity = state.by_connection.remove(&connection.id())?;
        state.by_identity.remove(&identity);

        state.broadcast(
            &ServerFrame::Control(ServerControl::PresenceOffline {
                identity: identity.clone(),
            }),
            connection.id(),
        );

        tracing::info!(identity = %identity, connection = connection.id(), "Identity unregistered");
        Some(identity)
    }

    /// Identities currently online.
    pub async fn online(&self) -> Vec<Identity> {
        self.state.read().await.by_identity.keys().cloned().collect()
    }

    /// Number of registered identities.
    pub async fn count(&self) -> usize {
        self.state.read().await.by_identity.len()
    }
}
