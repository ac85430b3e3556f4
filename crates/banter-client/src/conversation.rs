//! Local view of one open conversation.
//!
//! The view is append-only and reconciled against three inputs: the
//! initial bulk fetch, live pushed messages, and live soft-delete
//! updates. Updates replace entries in place, keyed by message id, so
//! positions never shift under the user.

use chrono::{DateTime, Utc};

use banter_shared::types::{AttachmentKind, Message, UserId};

/// A locally synthesised message awaiting (or denied) its server record.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDraft {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub file_type: AttachmentKind,
    pub created_at: DateTime<Utc>,
}

/// One row of the rendered conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEntry {
    /// Optimistic placeholder, keyed by the client correlation id.
    Pending { client_id: String, local: LocalDraft },

    /// Server-acknowledged record.
    Stored(Message),

    /// A send whose ack reported failure. Kept visible with the error
    /// inline; retrying is a user decision, never automatic.
    Failed {
        client_id: String,
        local: LocalDraft,
        error: String,
    },
}

/// The open conversation with one counterpart.
#[derive(Debug)]
pub struct ConversationView {
    counterpart: UserId,
    entries: Vec<ViewEntry>,
}

impl ConversationView {
    /// Build the view from the initial bulk fetch (already ascending).
    pub fn new(counterpart: UserId, history: Vec<Message>) -> Self {
        Self {
            counterpart,
            entries: history.into_iter().map(ViewEntry::Stored).collect(),
        }
    }

    pub fn counterpart(&self) -> UserId {
        self.counterpart
    }

    pub fn entries(&self) -> &[ViewEntry] {
        &self.entries
    }

    /// Whether a pushed message belongs in this view.
    pub fn involves(&self, message: &Message) -> bool {
        message.sender_id == self.counterpart || message.receiver_id == self.counterpart
    }

    /// Append an optimistic placeholder.
    pub fn push_pending(&mut self, client_id: String, local: LocalDraft) {
        self.entries.push(ViewEntry::Pending { client_id, local });
    }

    /// Append a live-pushed record. Skips ids already present, so a push
    /// racing an ack cannot duplicate a row.
    pub fn push_stored(&mut self, message: Message) -> bool {
        if self.contains_id(message.id) {
            return false;
        }
        self.entries.push(ViewEntry::Stored(message));
        true
    }

    /// Swap a placeholder for its acknowledged record, in place.
    pub fn resolve_pending(&mut self, client_id: &str, stored: Message) -> bool {
        for entry in &mut self.entries {
            if matches!(entry, ViewEntry::Pending { client_id: id, .. } if id == client_id) {
                *entry = ViewEntry::Stored(stored);
                return true;
            }
        }
        false
    }

    /// Mark a placeholder failed, in place.
    pub fn fail_pending(&mut self, client_id: &str, error: &str) -> bool {
        for entry in &mut self.entries {
            if let ViewEntry::Pending {
                client_id: id,
                local,
            } = entry
            {
                if id == client_id {
                    *entry = ViewEntry::Failed {
                        client_id: client_id.to_string(),
                        local: local.clone(),
                        error: error.to_string(),
                    };
                    return true;
                }
            }
        }
        false
    }

    /// Replace a stored entry by id, preserving its position. Used for
    /// soft-delete updates.
    pub fn apply_update(&mut self, updated: Message) -> bool {
        for entry in &mut self.entries {
            if matches!(entry, ViewEntry::Stored(m) if m.id == updated.id) {
                *entry = ViewEntry::Stored(updated);
                return true;
            }
        }
        false
    }

    fn contains_id(&self, id: i64) -> bool {
        self.entries
            .iter()
            .any(|entry| matches!(entry, ViewEntry::Stored(m) if m.id == id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn draft(from: i64, to: i64, body: &str) -> LocalDraft {
        LocalDraft {
            sender_id: UserId(from),
            receiver_id: UserId(to),
            content: Some(body.to_string()),
            file_url: None,
            file_type: AttachmentKind::Text,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn resolve_replaces_placeholder_in_place() {
        let mut view = ConversationView::new(UserId(9), vec![stored(1, 9, 7, "old")]);
        view.push_pending("tmp-1".to_string(), draft(7, 9, "hi"));
        assert_eq!(view.entries().len(), 2);

        let ack_message = stored(2, 7, 9, "hi");
        assert!(view.resolve_pending("tmp-1", ack_message.clone()));

        // Same position, now a stored record with the real id.
        assert_eq!(view.entries()[1], ViewEntry::Stored(ack_message));
        // A second resolve finds nothing.
        assert!(!view.resolve_pending("tmp-1", stored(3, 7, 9, "hi")));
    }

    #[test]
    fn failed_send_keeps_the_placeholder_visible() {
        let mut view = ConversationView::new(UserId(9), vec![]);
        view.push_pending("tmp-1".to_string(), draft(7, 9, "hi"));

        assert!(view.fail_pending("tmp-1", "store unreachable"));
        match &view.entries()[0] {
            ViewEntry::Failed { client_id, error, local } => {
                assert_eq!(client_id, "tmp-1");
                assert_eq!(error, "store unreachable");
                assert_eq!(local.content.as_deref(), Some("hi"));
            }
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    #[test]
    fn delete_update_preserves_position() {
        let history = vec![
            stored(1, 7, 9, "one"),
            stored(2, 9, 7, "two"),
            stored(3, 7, 9, "three"),
        ];
        let mut view = ConversationView::new(UserId(9), history);

        let mut deleted = stored(2, 9, 7, "two");
        deleted.is_deleted = true;
        deleted.content = None;
        assert!(view.apply_update(deleted));

        assert_eq!(view.entries().len(), 3);
        match &view.entries()[1] {
            ViewEntry::Stored(m) => {
                assert_eq!(m.id, 2);
                assert!(m.is_deleted);
                assert_eq!(m.content, None);
            }
            other => panic!("unexpected entry: {other:?}"),
        }

        // Unknown id is a no-op.
        assert!(!view.apply_update(stored(42, 7, 9, "ghost")));
    }

    #[test]
    fn live_push_deduplicates_by_id() {
        let mut view = ConversationView::new(UserId(9), vec![]);
        let message = stored(5, 9, 7, "hello");

        assert!(view.push_stored(message.clone()));
        assert!(!view.push_stored(message));
        assert_eq!(view.entries().len(), 1);
    }
}
