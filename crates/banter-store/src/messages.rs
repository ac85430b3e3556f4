//! Typed helpers for the `messages` table.
//!
//! All mutations are single UPDATE/INSERT statements, so each operation
//! is atomic over its affected row-set without explicit transactions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use banter_shared::constants::CONVERSATION_FETCH_LIMIT;
use banter_shared::types::{AttachmentKind, Message, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};

/// Fields required to persist a new message. Id and timestamps are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub file_type: AttachmentKind,
}

const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, content, file_url, file_type, \
     is_read, is_deleted, created_at, updated_at";

impl Database {
    /// Persist a new message and return the stored row.
    pub fn append_message(&self, new: &NewMessage) -> Result<Message> {
        let now = Utc::now();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO messages \
                 (sender_id, receiver_id, content, file_url, file_type, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                new.sender_id.0,
                new.receiver_id.0,
                new.content,
                new.file_url,
                new.file_type.as_str(),
                now.to_rfc3339(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        fetch_message(&conn, id)
    }

    /// Fetch a single message by id.
    pub fn message_by_id(&self, id: i64) -> Result<Message> {
        let conn = self.conn();
        fetch_message(&conn, id)
    }

    /// Fetch the conversation between two users, both directions, bounded
    /// to the most recent [`CONVERSATION_FETCH_LIMIT`] rows and returned
    /// in ascending creation order. Restartable by re-invoking.
    pub fn conversation(&self, user_a: UserId, user_b: UserId) -> Result<Vec<Message>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM ( \
                 SELECT {MESSAGE_COLUMNS} FROM messages \
                 WHERE (sender_id = ?1 AND receiver_id = ?2) \
                    OR (sender_id = ?2 AND receiver_id = ?1) \
                 ORDER BY created_at DESC, id DESC \
                 LIMIT ?3 \
             ) ORDER BY created_at ASC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![user_a.0, user_b.0, CONVERSATION_FETCH_LIMIT],
            row_to_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Count unread, non-deleted messages addressed to `receiver`,
    /// grouped by sender.
    pub fn unread_by_sender(&self, receiver: UserId) -> Result<HashMap<UserId, i64>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT sender_id, COUNT(*) FROM messages \
             WHERE receiver_id = ?1 AND is_read = 0 AND is_deleted = 0 \
             GROUP BY sender_id",
        )?;
        let rows = stmt.query_map(params![receiver.0], |row| {
            Ok((UserId(row.get(0)?), row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (sender, count) = row?;
            counts.insert(sender, count);
        }
        Ok(counts)
    }

    /// Bulk-flip the read flag for every unread message from `sender` to
    /// `receiver`. Returns the number of rows updated; idempotent.
    pub fn mark_conversation_read(&self, receiver: UserId, sender: UserId) -> Result<usize> {
        let now = Utc::now();
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE messages SET is_read = 1, updated_at = ?3 \
             WHERE receiver_id = ?1 AND sender_id = ?2 AND is_read = 0",
            params![receiver.0, sender.0, now.to_rfc3339()],
        )?;
        Ok(updated)
    }

    /// Soft-delete a message: clear its payload and mark it deleted,
    /// keeping the row for conversation continuity.
    ///
    /// The sender guard lives inside the UPDATE itself, so a missing row
    /// and a foreign row are indistinguishable to the caller: both come
    /// back as [`StoreError::NotFound`]. An already-deleted row is also
    /// rejected; its cleared fields are never rewritten.
    pub fn soft_delete(&self, id: i64, requester: UserId) -> Result<Message> {
        let now = Utc::now();
        let conn = self.conn();
        let affected = conn.execute(
            "UPDATE messages \
             SET is_deleted = 1, content = NULL, file_url = NULL, file_type = 'text', \
                 updated_at = ?3 \
             WHERE id = ?1 AND sender_id = ?2 AND is_deleted = 0",
            params![id, requester.0, now.to_rfc3339()],
        )?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        fetch_message(&conn, id)
    }
}

fn fetch_message(conn: &Connection, id: i64) -> Result<Message> {
    conn.query_row(
        &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
        params![id],
        row_to_message,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let kind_str: String = row.get(5)?;
    let file_type: AttachmentKind = kind_str.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(Message {
        id: row.get(0)?,
        sender_id: UserId(row.get(1)?),
        receiver_id: UserId(row.get(2)?),
        content: row.get(3)?,
        file_url: row.get(4)?,
        file_type,
        is_read: row.get::<_, i64>(6)? != 0,
        is_deleted: row.get::<_, i64>(7)? != 0,
        created_at: parse_timestamp(row, 8)?,
        updated_at: parse_timestamp(row, 9)?,
    })
}

fn parse_timestamp(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
