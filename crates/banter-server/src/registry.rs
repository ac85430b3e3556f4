//! In-memory connection bookkeeping.
//!
//! [`ConnectionRegistry`] maps each authenticated principal to the set of
//! its open connection handles, with the invariant that an entry exists
//! iff at least one handle is open: the entry is deleted, not left empty,
//! when its last handle closes. [`ConnectionLinks`] maps every open
//! handle (authenticated or not) to its outbound frame queue.
//!
//! Both structures use a single async `RwLock` apiece; no I/O ever
//! happens under a lock.

use std::collections::{HashMap, HashSet};

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use banter_shared::protocol::ServerFrame;
use banter_shared::types::UserId;

/// Opaque id of one open bidirectional connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
struct RegistryInner {
    /// Principal -> non-empty set of open handles.
    by_user: HashMap<UserId, HashSet<ConnectionId>>,
    /// Reverse index so deregistration needs only the handle.
    owners: HashMap<ConnectionId, UserId>,
}

/// Registry of which principals are currently connected, and through
/// which handles.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handle to the principal's entry, creating the entry if
    /// absent. Idempotent for a repeated handle.
    ///
    /// Returns `true` when the entry was created, i.e. the principal just
    /// came online.
    pub async fn register(&self, user: UserId, conn: ConnectionId) -> bool {
        let mut inner = self.inner.write().await;
        inner.owners.insert(conn, user);
        let handles = inner.by_user.entry(user).or_default();
        let came_online = handles.is_empty();
        handles.insert(conn);
        came_online
    }

    /// Remove a handle from whatever entry contains it, deleting the
    /// entry if it becomes empty. Unknown handles are a no-op (benign
    /// double-close race).
    ///
    /// Returns the owning principal when the removed handle was the
    /// entry's last, i.e. the principal just went offline.
    pub async fn deregister(&self, conn: ConnectionId) -> Option<UserId> {
        let mut inner = self.inner.write().await;
        let user = inner.owners.remove(&conn)?;

        if let Some(handles) = inner.by_user.get_mut(&user) {
            handles.remove(&conn);
            if handles.is_empty() {
                inner.by_user.remove(&user);
                return Some(user);
            }
        }
        None
    }

    /// Snapshot of the principal's open handles; empty when absent.
    pub async fn active_handles(&self, user: UserId) -> HashSet<ConnectionId> {
        self.inner
            .read()
            .await
            .by_user
            .get(&user)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of every principal with at least one open handle, in
    /// ascending id order.
    pub async fn online_user_ids(&self) -> Vec<UserId> {
        let inner = self.inner.read().await;
        let mut ids: Vec<UserId> = inner.by_user.keys().copied().collect();
        ids.sort();
        ids
    }
}

/// Outbound frame queues of every open connection, keyed by handle.
///
/// Unlike the registry, this table also holds unauthenticated
/// connections: presence broadcasts go to every open handle.
#[derive(Default)]
pub struct ConnectionLinks {
    senders: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<ServerFrame>>>,
}

impl ConnectionLinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn attach(&self, conn: ConnectionId, tx: mpsc::UnboundedSender<ServerFrame>) {
        self.senders.write().await.insert(conn, tx);
    }

    pub async fn detach(&self, conn: ConnectionId) {
        self.senders.write().await.remove(&conn);
    }

    /// Queue a frame for one connection. A closed queue means the
    /// connection is tearing down concurrently; that race is swallowed.
    pub async fn send_to(&self, conn: ConnectionId, frame: ServerFrame) {
        if let Some(tx) = self.senders.read().await.get(&conn) {
            let _ = tx.send(frame);
        }
    }

    /// Queue a frame once for each handle in the set.
    pub async fn send_to_all(&self, handles: &HashSet<ConnectionId>, frame: &ServerFrame) {
        let senders = self.senders.read().await;
        for conn in handles {
            if let Some(tx) = senders.get(conn) {
                let _ = tx.send(frame.clone());
            }
        }
    }

    /// Queue a frame for every open connection.
    pub async fn broadcast(&self, frame: &ServerFrame) {
        let senders = self.senders.read().await;
        for tx in senders.values() {
            let _ = tx.send(frame.clone());
        }
    }
}
