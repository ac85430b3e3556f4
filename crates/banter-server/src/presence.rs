//! Presence fan-out.
//!
//! Every change of the online set (an entry created or deleted in the
//! registry) is announced as a full snapshot to every open connection,
//! authenticated or not. No deltas: the online set is small relative to
//! message volume, and full snapshots keep client reconciliation trivial.

use std::sync::Arc;

use tracing::debug;

use banter_shared::protocol::ServerFrame;

use crate::registry::{ConnectionId, ConnectionLinks, ConnectionRegistry};

#[derive(Clone)]
pub struct PresenceBroadcaster {
    registry: Arc<ConnectionRegistry>,
    links: Arc<ConnectionLinks>,
}

impl PresenceBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>, links: Arc<ConnectionLinks>) -> Self {
        Self { registry, links }
    }

    async fn snapshot(&self) -> ServerFrame {
        ServerFrame::Presence {
            online: self.registry.online_user_ids().await,
        }
    }

    /// Announce the current online set to every open connection.
    pub async fn broadcast_snapshot(&self) {
        let frame = self.snapshot().await;
        if let ServerFrame::Presence { ref online } = frame {
            debug!(online = online.len(), "broadcasting presence snapshot");
        }
        self.links.broadcast(&frame).await;
    }

    /// Reply with the current online set to a single connection. Covers
    /// clients that connect before the first change event and would
    /// otherwise sit on a stale empty set.
    pub async fn send_snapshot_to(&self, conn: ConnectionId) {
        let frame = self.snapshot().await;
        self.links.send_to(conn, frame).await;
    }
}
