//! Delivery routing for direct messages.
//!
//! One send attempt: validate, persist, push to the recipient's active
//! handles, acknowledge the originating connection. A persistence failure
//! is terminal for the attempt and never reaches the push step; an empty
//! recipient handle set is not an error, the durable row is the offline
//! delivery mechanism.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use banter_shared::constants::STORE_CALL_TIMEOUT_SECS;
use banter_shared::protocol::ServerFrame;
use banter_shared::types::{AttachmentKind, Message, UserId};
use banter_store::NewMessage;

use crate::registry::{ConnectionLinks, ConnectionRegistry};
use crate::store::MessageStore;

/// One submitted send, as taken off the wire.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub to: UserId,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub file_type: Option<AttachmentKind>,
    pub client_id: Option<String>,
}

pub struct DeliveryRouter {
    store: MessageStore,
    registry: Arc<ConnectionRegistry>,
    links: Arc<ConnectionLinks>,
}

impl DeliveryRouter {
    pub fn new(
        store: MessageStore,
        registry: Arc<ConnectionRegistry>,
        links: Arc<ConnectionLinks>,
    ) -> Self {
        Self {
            store,
            registry,
            links,
        }
    }

    /// Route one send attempt. Returns the ack for the originating
    /// connection; pushes to the recipient happen as a side effect.
    pub async fn dispatch(&self, sender: UserId, request: SendRequest) -> ServerFrame {
        let SendRequest {
            to,
            content,
            file_url,
            file_type,
            client_id,
        } = request;

        // Validation happens before any store access.
        let content = content.filter(|c| !c.trim().is_empty());
        if content.is_none() && file_url.is_none() {
            return ServerFrame::ack_failure(client_id, "Message has no content or attachment");
        }

        let new = NewMessage {
            sender_id: sender,
            receiver_id: to,
            content,
            file_url,
            file_type: file_type.unwrap_or_default(),
        };

        // The store call carries a caller-imposed deadline so a wedged
        // backend fails the attempt instead of parking the connection.
        let append = self.store.append(new);
        let stored = match tokio::time::timeout(
            Duration::from_secs(STORE_CALL_TIMEOUT_SECS),
            append,
        )
        .await
        {
            Ok(Ok(message)) => message,
            Ok(Err(e)) => {
                warn!(sender = %sender, receiver = %to, error = %e, "failed to store message");
                return ServerFrame::ack_failure(client_id, format!("Failed to store message: {e}"));
            }
            Err(_) => {
                warn!(sender = %sender, receiver = %to, "store call timed out");
                return ServerFrame::ack_failure(client_id, "Timed out storing message");
            }
        };

        let handles = self.registry.active_handles(to).await;
        if handles.is_empty() {
            debug!(receiver = %to, message = stored.id, "recipient offline, stored only");
        } else {
            self.links
                .send_to_all(
                    &handles,
                    &ServerFrame::Message {
                        message: stored.clone(),
                    },
                )
                .await;
            debug!(
                receiver = %to,
                message = stored.id,
                handles = handles.len(),
                "pushed message"
            );
        }

        ServerFrame::ack_success(client_id, stored)
    }

    /// Fan a soft-delete update out to every handle of both parties, so
    /// open conversation views replace the record in place.
    pub async fn notify_deleted(&self, message: &Message) {
        let mut handles: HashSet<_> = self.registry.active_handles(message.sender_id).await;
        handles.extend(self.registry.active_handles(message.receiver_id).await);
        if handles.is_empty() {
            return;
        }
        self.links
            .send_to_all(
                &handles,
                &ServerFrame::MessageDeleted {
                    message: message.clone(),
                },
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banter_store::Database;
    use tokio::sync::mpsc;

    use crate::registry::ConnectionId;

    struct Fixture {
        router: DeliveryRouter,
        registry: Arc<ConnectionRegistry>,
        links: Arc<ConnectionLinks>,
        store: MessageStore,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        let store = MessageStore::new(db);
        let registry = Arc::new(ConnectionRegistry::new());
        let links = Arc::new(ConnectionLinks::new());
        let router = DeliveryRouter::new(store.clone(), registry.clone(), links.clone());
        Fixture {
            router,
            registry,
            links,
            store,
            _dir: dir,
        }
    }

    async fn open_handle(
        fx: &Fixture,
        user: UserId,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<ServerFrame>) {
        let conn = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        fx.links.attach(conn, tx).await;
        fx.registry.register(user, conn).await;
        (conn, rx)
    }

    fn send(to: i64, content: &str, client_id: &str) -> SendRequest {
        SendRequest {
            to: UserId(to),
            content: Some(content.to_string()),
            file_url: None,
            file_type: None,
            client_id: Some(client_id.to_string()),
        }
    }

    #[tokio::test]
    async fn push_and_ack_carry_the_stored_record() {
        let fx = fixture();
        let (_conn, mut rx) = open_handle(&fx, UserId(9)).await;

        let ack = fx.router.dispatch(UserId(7), send(9, "hi", "tmp-1")).await;

        let stored = match ack {
            ServerFrame::Ack {
                client_id,
                success: true,
                message: Some(m),
                error: None,
            } => {
                // Correlation id comes back so the client can replace its
                // optimistic placeholder.
                assert_eq!(client_id.as_deref(), Some("tmp-1"));
                m
            }
            other => panic!("unexpected ack: {other:?}"),
        };
        assert!(!stored.is_deleted);
        assert_eq!(stored.sender_id, UserId(7));

        match rx.try_recv().unwrap() {
            ServerFrame::Message { message } => assert_eq!(message, stored),
            other => panic!("unexpected frame: {other:?}"),
        }
        // Exactly one push per handle.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn every_active_handle_gets_exactly_one_push() {
        let fx = fixture();
        let (_c1, mut rx1) = open_handle(&fx, UserId(9)).await;
        let (_c2, mut rx2) = open_handle(&fx, UserId(9)).await;
        let (_c3, mut rx3) = open_handle(&fx, UserId(5)).await; // bystander

        fx.router.dispatch(UserId(7), send(9, "hi", "tmp-1")).await;

        for rx in [&mut rx1, &mut rx2] {
            assert!(matches!(
                rx.try_recv().unwrap(),
                ServerFrame::Message { .. }
            ));
            assert!(rx.try_recv().is_err());
        }
        assert!(rx3.try_recv().is_err());
    }

    #[tokio::test]
    async fn offline_recipient_still_gets_durable_storage() {
        let fx = fixture();

        let ack = fx.router.dispatch(UserId(7), send(9, "hi", "tmp-1")).await;
        assert!(matches!(ack, ServerFrame::Ack { success: true, .. }));

        // Retrievable immediately after the ack returns.
        let convo = fx
            .store
            .conversation(UserId(7), UserId(9))
            .await
            .unwrap();
        assert_eq!(convo.len(), 1);
        assert_eq!(convo[0].content.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn disconnect_then_send_is_readable_after_reconnect() {
        let fx = fixture();
        let (conn, mut rx) = open_handle(&fx, UserId(9)).await;

        fx.router.dispatch(UserId(7), send(9, "first", "tmp-1")).await;
        assert!(rx.try_recv().is_ok());

        // Principal 9 disconnects; the next send still acks success but
        // pushes nothing.
        fx.links.detach(conn).await;
        fx.registry.deregister(conn).await;
        let ack = fx.router.dispatch(UserId(7), send(9, "second", "tmp-2")).await;
        assert!(matches!(ack, ServerFrame::Ack { success: true, .. }));

        let convo = fx.store.conversation(UserId(9), UserId(7)).await.unwrap();
        let bodies: Vec<_> = convo
            .iter()
            .map(|m| m.content.as_deref().unwrap())
            .collect();
        assert_eq!(bodies, ["first", "second"]);
    }

    #[tokio::test]
    async fn empty_send_is_rejected_before_the_store() {
        let fx = fixture();

        let ack = fx
            .router
            .dispatch(
                UserId(7),
                SendRequest {
                    to: UserId(9),
                    content: Some("   ".to_string()),
                    file_url: None,
                    file_type: None,
                    client_id: Some("tmp-1".to_string()),
                },
            )
            .await;

        match ack {
            ServerFrame::Ack {
                success: false,
                error: Some(_),
                client_id,
                ..
            } => assert_eq!(client_id.as_deref(), Some("tmp-1")),
            other => panic!("unexpected ack: {other:?}"),
        }
        assert!(fx
            .store
            .conversation(UserId(7), UserId(9))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn attachment_only_send_is_accepted() {
        let fx = fixture();

        let ack = fx
            .router
            .dispatch(
                UserId(7),
                SendRequest {
                    to: UserId(9),
                    content: None,
                    file_url: Some("http://localhost:8080/uploads/cat.png".to_string()),
                    file_type: Some(AttachmentKind::Image),
                    client_id: None,
                },
            )
            .await;

        match ack {
            ServerFrame::Ack {
                success: true,
                message: Some(m),
                ..
            } => {
                assert_eq!(m.content, None);
                assert_eq!(m.file_type, AttachmentKind::Image);
            }
            other => panic!("unexpected ack: {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_notification_reaches_both_parties() {
        let fx = fixture();
        let (_s, mut rx_sender) = open_handle(&fx, UserId(7)).await;
        let (_r, mut rx_receiver) = open_handle(&fx, UserId(9)).await;

        let ack = fx.router.dispatch(UserId(7), send(9, "oops", "tmp-1")).await;
        let stored = match ack {
            ServerFrame::Ack {
                message: Some(m), ..
            } => m,
            other => panic!("unexpected ack: {other:?}"),
        };
        let _ = rx_receiver.try_recv();

        let deleted = fx.store.soft_delete(stored.id, UserId(7)).await.unwrap();
        fx.router.notify_deleted(&deleted).await;

        for rx in [&mut rx_sender, &mut rx_receiver] {
            match rx.try_recv().unwrap() {
                ServerFrame::MessageDeleted { message } => {
                    assert_eq!(message.id, stored.id);
                    assert!(message.is_deleted);
                    assert_eq!(message.content, None);
                }
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    }
}
