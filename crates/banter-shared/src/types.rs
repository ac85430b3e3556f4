use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// User identity = opaque numeric id issued by the auth collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// An authenticated user identity, decoded from a verified credential and
/// attached to a connection for its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub username: String,
    pub role: String,
}

/// Kind of payload a message carries. Attachment-only messages keep the
/// kind of the uploaded file; plain text messages (and soft-deleted ones)
/// are `Text`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    #[default]
    Text,
    Image,
    Video,
    File,
}

impl AttachmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::Text => "text",
            AttachmentKind::Image => "image",
            AttachmentKind::Video => "video",
            AttachmentKind::File => "file",
        }
    }

    /// Infer the kind from a MIME content type. Anything that is neither
    /// an image nor a video is a generic file.
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("image/") {
            AttachmentKind::Image
        } else if content_type.starts_with("video/") {
            AttachmentKind::Video
        } else {
            AttachmentKind::File
        }
    }
}

impl std::str::FromStr for AttachmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(AttachmentKind::Text),
            "image" => Ok(AttachmentKind::Image),
            "video" => Ok(AttachmentKind::Video),
            "file" => Ok(AttachmentKind::File),
            other => Err(format!("unknown attachment kind: {other}")),
        }
    }
}

impl std::fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed message between two principals.
///
/// This is the canonical record: the store persists it, the router pushes
/// it, and the session controller renders it. Soft-deleted rows keep
/// their id and timestamps but have `content` and `file_url` cleared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Store-assigned surrogate id (monotonic).
    pub id: i64,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    /// Text body; `None` for attachment-only and soft-deleted messages.
    pub content: Option<String>,
    /// Reference to an uploaded attachment, if any.
    pub file_url: Option<String>,
    pub file_type: AttachmentKind,
    pub is_read: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
