//! Wire protocol for the real-time channel, plus the DTOs of the REST
//! collaborator endpoints.
//!
//! Frames are internally tagged JSON (`"type": "..."`) so a browser or
//! native client can dispatch on a single discriminator field.

use serde::{Deserialize, Serialize};

use crate::types::{AttachmentKind, Message, UserId};

/// Frames a client may send over an open connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Submit a direct message for delivery.
    Send {
        to: UserId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_type: Option<AttachmentKind>,
        /// Client-generated correlation id, echoed back in the ack so the
        /// client can replace its optimistic placeholder.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },

    /// Ask for the current presence snapshot (reply goes to this
    /// connection only).
    GetPresence,
}

/// Frames the server pushes to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// A freshly stored message, delivered to each of the recipient's
    /// active handles.
    Message { message: Message },

    /// Result of a `send`, returned to the originating connection only.
    Ack {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<Message>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Full snapshot of the online set. Sent to every open connection on
    /// any presence change, or to a single connection on request.
    Presence { online: Vec<UserId> },

    /// A message was soft-deleted; the record arrives with its payload
    /// fields cleared.
    MessageDeleted { message: Message },

    /// Terminal error, sent just before the server closes the connection.
    Error { message: String },
}

impl ServerFrame {
    pub fn ack_success(client_id: Option<String>, message: Message) -> Self {
        ServerFrame::Ack {
            client_id,
            success: true,
            message: Some(message),
            error: None,
        }
    }

    pub fn ack_failure(client_id: Option<String>, error: impl Into<String>) -> Self {
        ServerFrame::Ack {
            client_id,
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// REST DTOs
// ---------------------------------------------------------------------------

/// Body of `POST /api/chats/mark-read`.
///
/// `other_id` is optional at the serde level so the server can reject a
/// missing field with a proper validation error instead of a parse error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkReadRequest {
    #[serde(default)]
    pub other_id: Option<UserId>,
}

/// Response of `POST /api/chats/mark-read`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub updated: u64,
}

/// Response of `POST /api/chats/upload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_url: String,
    pub file_type: AttachmentKind,
    pub filename: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn send_frame_round_trip() {
        let frame = ClientFrame::Send {
            to: UserId(9),
            content: Some("hi".to_string()),
            file_url: None,
            file_type: None,
            client_id: Some("tmp-1".to_string()),
        };

        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"type\":\"send\""));

        let restored: ClientFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, frame);
    }

    #[test]
    fn ack_echoes_correlation_id() {
        let message = Message {
            id: 42,
            sender_id: UserId(7),
            receiver_id: UserId(9),
            content: Some("hi".to_string()),
            file_url: None,
            file_type: AttachmentKind::Text,
            is_read: false,
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let ack = ServerFrame::ack_success(Some("tmp-1".to_string()), message);
        let json = serde_json::to_string(&ack).unwrap();
        let restored: ServerFrame = serde_json::from_str(&json).unwrap();

        match restored {
            ServerFrame::Ack {
                client_id,
                success,
                message: Some(m),
                error: None,
            } => {
                assert_eq!(client_id.as_deref(), Some("tmp-1"));
                assert!(success);
                assert_eq!(m.id, 42);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn presence_frame_shape() {
        let frame = ServerFrame::Presence {
            online: vec![UserId(1), UserId(3)],
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"type":"presence","online":[1,3]}"#);
    }

    #[test]
    fn mark_read_request_tolerates_missing_field() {
        let req: MarkReadRequest = serde_json::from_str("{}").unwrap();
        assert!(req.other_id.is_none());
    }
}
