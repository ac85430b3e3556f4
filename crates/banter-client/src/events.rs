use banter_shared::types::{Message, UserId};

/// Events emitted by the session controller for the embedding UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A message was appended to the open conversation view.
    ConversationAppended { message: Message },

    /// An entry of the open conversation was replaced in place
    /// (acknowledged send or soft-delete update).
    ConversationUpdated { id: i64 },

    /// The cached unread count for a sender changed.
    UnreadChanged { sender: UserId, count: u64 },

    /// The online set changed.
    PresenceChanged { online: Vec<UserId> },

    /// A send failed; its placeholder stays visible with the error.
    SendFailed { client_id: String, error: String },

    /// The server reported a terminal error for this connection.
    ServerError { message: String },
}
