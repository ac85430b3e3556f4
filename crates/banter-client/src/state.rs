//! The session controller: one user's live view of the messaging core.
//!
//! A pure state machine. The embedding shell owns the socket and the
//! REST client; it feeds inbound [`ServerFrame`]s to
//! [`SessionController::handle_frame`] and forwards the [`ClientFrame`]s
//! returned by [`SessionController::begin_send`]. All reconciliation
//! rules live here, so they are testable without any I/O.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use banter_shared::protocol::{ClientFrame, ServerFrame};
use banter_shared::types::{AttachmentKind, Message, UserId};

use crate::conversation::{ConversationView, LocalDraft};
use crate::events::SessionEvent;

pub struct SessionController {
    me: UserId,
    online: Vec<UserId>,
    unread: HashMap<UserId, u64>,
    active: Option<ConversationView>,
}

impl SessionController {
    pub fn new(me: UserId) -> Self {
        Self {
            me,
            online: Vec::new(),
            unread: HashMap::new(),
            active: None,
        }
    }

    pub fn me(&self) -> UserId {
        self.me
    }

    /// The conversation cursor: counterpart of the open thread, if any.
    pub fn cursor(&self) -> Option<UserId> {
        self.active.as_ref().map(|view| view.counterpart())
    }

    pub fn active_conversation(&self) -> Option<&ConversationView> {
        self.active.as_ref()
    }

    pub fn online(&self) -> &[UserId] {
        &self.online
    }

    pub fn is_online(&self, user: UserId) -> bool {
        self.online.contains(&user)
    }

    pub fn unread_counts(&self) -> &HashMap<UserId, u64> {
        &self.unread
    }

    /// Seed the unread cache from the initial REST fetch.
    pub fn set_unread_counts(&mut self, counts: HashMap<UserId, u64>) {
        self.unread = counts;
    }

    /// Open a conversation: set the cursor, install the fetched history,
    /// and zero the counterpart's cached unread count. The embedder is
    /// expected to also call mark-read on the REST API.
    pub fn open_conversation(
        &mut self,
        counterpart: UserId,
        history: Vec<Message>,
    ) -> Vec<SessionEvent> {
        self.active = Some(ConversationView::new(counterpart, history));

        let mut events = Vec::new();
        if self.unread.remove(&counterpart).is_some() {
            events.push(SessionEvent::UnreadChanged {
                sender: counterpart,
                count: 0,
            });
        }
        events
    }

    /// Close the open conversation; unread increments for its counterpart
    /// resume immediately.
    pub fn close_conversation(&mut self) {
        self.active = None;
    }

    /// Start an optimistic send into the open conversation.
    ///
    /// Appends a placeholder locally and returns the frame to transmit.
    /// Returns `None` when no conversation is open or the draft is empty.
    pub fn begin_send(
        &mut self,
        content: Option<String>,
        attachment: Option<(String, AttachmentKind)>,
    ) -> Option<ClientFrame> {
        let view = self.active.as_mut()?;

        let content = content.filter(|c| !c.trim().is_empty());
        if content.is_none() && attachment.is_none() {
            return None;
        }

        let (file_url, file_type) = match attachment {
            Some((url, kind)) => (Some(url), Some(kind)),
            None => (None, None),
        };

        let client_id = format!("tmp-{}", Uuid::new_v4());
        let to = view.counterpart();

        view.push_pending(
            client_id.clone(),
            LocalDraft {
                sender_id: self.me,
                receiver_id: to,
                content: content.clone(),
                file_url: file_url.clone(),
                file_type: file_type.unwrap_or_default(),
                created_at: Utc::now(),
            },
        );

        Some(ClientFrame::Send {
            to,
            content,
            file_url,
            file_type,
            client_id: Some(client_id),
        })
    }

    /// Reconcile one inbound server frame, returning the UI events it
    /// caused.
    pub fn handle_frame(&mut self, frame: ServerFrame) -> Vec<SessionEvent> {
        match frame {
            ServerFrame::Message { message } => self.on_push(message),
            ServerFrame::Ack {
                client_id,
                success,
                message,
                error,
            } => self.on_ack(client_id, success, message, error),
            ServerFrame::Presence { online } => {
                self.online = online.clone();
                vec![SessionEvent::PresenceChanged { online }]
            }
            ServerFrame::MessageDeleted { message } => self.on_deleted(message),
            ServerFrame::Error { message } => vec![SessionEvent::ServerError { message }],
        }
    }

    fn on_push(&mut self, message: Message) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        // Route into the visible list when it belongs to the open thread.
        if let Some(view) = self.active.as_mut() {
            if view.involves(&message) && view.push_stored(message.clone()) {
                events.push(SessionEvent::ConversationAppended {
                    message: message.clone(),
                });
            }
        }

        // Unread accounting: only inbound messages count, and the open
        // thread is suppressed while its cursor is set.
        if message.receiver_id == self.me && self.cursor() != Some(message.sender_id) {
            let count = self
                .unread
                .entry(message.sender_id)
                .and_modify(|c| *c += 1)
                .or_insert(1);
            events.push(SessionEvent::UnreadChanged {
                sender: message.sender_id,
                count: *count,
            });
        }

        events
    }

    fn on_ack(
        &mut self,
        client_id: Option<String>,
        success: bool,
        message: Option<Message>,
        error: Option<String>,
    ) -> Vec<SessionEvent> {
        let Some(client_id) = client_id else {
            return Vec::new();
        };

        let Some(view) = self.active.as_mut() else {
            // The conversation was closed while the send was in flight;
            // nothing to reconcile.
            return Vec::new();
        };

        if success {
            let Some(stored) = message else {
                return Vec::new();
            };
            if view.resolve_pending(&client_id, stored.clone()) {
                return vec![SessionEvent::ConversationUpdated { id: stored.id }];
            }
            // No placeholder (e.g. view rebuilt meanwhile): fall back to
            // appending if the record belongs here.
            if view.involves(&stored) && view.push_stored(stored.clone()) {
                return vec![SessionEvent::ConversationAppended { message: stored }];
            }
            Vec::new()
        } else {
            let error = error.unwrap_or_else(|| "send failed".to_string());
            view.fail_pending(&client_id, &error);
            vec![SessionEvent::SendFailed { client_id, error }]
        }
    }

    fn on_deleted(&mut self, message: Message) -> Vec<SessionEvent> {
        if let Some(view) = self.active.as_mut() {
            if view.apply_update(message.clone()) {
                return vec![SessionEvent::ConversationUpdated { id: message.id }];
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ViewEntry;

    fn stored(id: i64, from: i64, to: i64, body: &str) -> Message {
        Message {
            id,
            sender_id: UserId(from),
            receiver_id: UserId(to),
            content: Some(body.to_string()),
            file_url: None,
            file_type: AttachmentKind::Text,
            is_read: false,
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn push(message: Message) -> ServerFrame {
        ServerFrame::Message { message }
    }

    #[test]
    fn open_thread_suppresses_unread_increment() {
        let mut session = SessionController::new(UserId(9));
        session.open_conversation(UserId(7), vec![]);

        let events = session.handle_frame(push(stored(1, 7, 9, "hi")));

        // Appended to the view, but no unread change for the open thread.
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::ConversationAppended { .. })));
        assert!(!events
            .iter()
            .any(|e| matches!(e, SessionEvent::UnreadChanged { .. })));
        assert!(session.unread_counts().is_empty());
    }

    #[test]
    fn switching_cursor_away_reenables_increments() {
        let mut session = SessionController::new(UserId(9));
        session.open_conversation(UserId(7), vec![]);
        session.close_conversation();

        session.handle_frame(push(stored(1, 7, 9, "hi")));
        session.handle_frame(push(stored(2, 7, 9, "there")));

        assert_eq!(session.unread_counts().get(&UserId(7)), Some(&2));
    }

    #[test]
    fn messages_from_other_senders_count_while_a_thread_is_open() {
        let mut session = SessionController::new(UserId(9));
        session.open_conversation(UserId(7), vec![]);

        let events = session.handle_frame(push(stored(1, 5, 9, "psst")));

        assert_eq!(session.unread_counts().get(&UserId(5)), Some(&1));
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::UnreadChanged { sender, count: 1 } if *sender == UserId(5))));
        // Not part of the open thread, so nothing was appended.
        assert_eq!(session.active_conversation().unwrap().entries().len(), 0);
    }

    #[test]
    fn outbound_pushes_never_touch_unread() {
        let mut session = SessionController::new(UserId(9));
        // A push of our own message to another device of ours.
        session.handle_frame(push(stored(1, 9, 7, "me elsewhere")));
        assert!(session.unread_counts().is_empty());
    }

    #[test]
    fn opening_a_conversation_zeroes_its_unread_count() {
        let mut session = SessionController::new(UserId(9));
        session.set_unread_counts(HashMap::from([(UserId(7), 4), (UserId(5), 2)]));

        let events = session.open_conversation(UserId(7), vec![]);

        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::UnreadChanged { sender, count: 0 } if *sender == UserId(7))));
        assert_eq!(session.unread_counts().get(&UserId(7)), None);
        // Other senders keep their counts.
        assert_eq!(session.unread_counts().get(&UserId(5)), Some(&2));
    }

    #[test]
    fn optimistic_send_is_replaced_by_its_ack() {
        let mut session = SessionController::new(UserId(7));
        session.open_conversation(UserId(9), vec![stored(1, 9, 7, "hello")]);

        let frame = session
            .begin_send(Some("hi back".to_string()), None)
            .expect("send should start");
        let client_id = match frame {
            ClientFrame::Send { client_id, to, .. } => {
                assert_eq!(to, UserId(9));
                client_id.unwrap()
            }
            other => panic!("unexpected frame: {other:?}"),
        };

        // Placeholder is visible immediately.
        let view = session.active_conversation().unwrap();
        assert_eq!(view.entries().len(), 2);
        assert!(matches!(view.entries()[1], ViewEntry::Pending { .. }));

        let events = session.handle_frame(ServerFrame::Ack {
            client_id: Some(client_id),
            success: true,
            message: Some(stored(2, 7, 9, "hi back")),
            error: None,
        });

        assert_eq!(events, vec![SessionEvent::ConversationUpdated { id: 2 }]);
        let view = session.active_conversation().unwrap();
        assert_eq!(view.entries().len(), 2);
        assert!(matches!(&view.entries()[1], ViewEntry::Stored(m) if m.id == 2));
    }

    #[test]
    fn failed_send_surfaces_error_and_keeps_placeholder() {
        let mut session = SessionController::new(UserId(7));
        session.open_conversation(UserId(9), vec![]);

        let frame = session.begin_send(Some("hi".to_string()), None).unwrap();
        let client_id = match frame {
            ClientFrame::Send { client_id, .. } => client_id.unwrap(),
            other => panic!("unexpected frame: {other:?}"),
        };

        let events = session.handle_frame(ServerFrame::Ack {
            client_id: Some(client_id.clone()),
            success: false,
            message: None,
            error: Some("store unreachable".to_string()),
        });

        assert_eq!(
            events,
            vec![SessionEvent::SendFailed {
                client_id,
                error: "store unreachable".to_string(),
            }]
        );
        let view = session.active_conversation().unwrap();
        assert!(matches!(view.entries()[0], ViewEntry::Failed { .. }));
    }

    #[test]
    fn empty_draft_does_not_start_a_send() {
        let mut session = SessionController::new(UserId(7));
        session.open_conversation(UserId(9), vec![]);

        assert!(session.begin_send(Some("   ".to_string()), None).is_none());
        assert!(session.begin_send(None, None).is_none());
        assert_eq!(session.active_conversation().unwrap().entries().len(), 0);

        // Attachment-only drafts are fine.
        let frame = session.begin_send(
            None,
            Some((
                "http://localhost:8080/uploads/cat.png".to_string(),
                AttachmentKind::Image,
            )),
        );
        assert!(frame.is_some());
    }

    #[test]
    fn delete_update_replaces_in_open_view() {
        let mut session = SessionController::new(UserId(9));
        session.open_conversation(UserId(7), vec![stored(1, 7, 9, "oops")]);

        let mut deleted = stored(1, 7, 9, "oops");
        deleted.is_deleted = true;
        deleted.content = None;

        let events = session.handle_frame(ServerFrame::MessageDeleted { message: deleted });
        assert_eq!(events, vec![SessionEvent::ConversationUpdated { id: 1 }]);

        let view = session.active_conversation().unwrap();
        assert!(matches!(&view.entries()[0], ViewEntry::Stored(m) if m.is_deleted));
    }

    #[test]
    fn presence_snapshot_replaces_the_cached_set() {
        let mut session = SessionController::new(UserId(9));

        session.handle_frame(ServerFrame::Presence {
            online: vec![UserId(1), UserId(7)],
        });
        assert!(session.is_online(UserId(7)));

        // Full snapshots replace, never merge.
        session.handle_frame(ServerFrame::Presence {
            online: vec![UserId(1)],
        });
        assert!(!session.is_online(UserId(7)));
    }
}
