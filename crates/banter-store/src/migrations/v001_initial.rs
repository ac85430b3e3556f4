//! v001 -- Initial schema creation.
//!
//! Creates the `messages` table and the two lookup indexes that back
//! conversation retrieval and unread aggregation.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    sender_id   INTEGER NOT NULL,
    receiver_id INTEGER NOT NULL,
    content     TEXT,                          -- NULL for attachment-only / deleted
    file_url    TEXT,                          -- NULL when no attachment
    file_type   TEXT NOT NULL DEFAULT 'text',  -- text | image | video | file
    is_read     INTEGER NOT NULL DEFAULT 0,    -- boolean 0/1
    is_deleted  INTEGER NOT NULL DEFAULT 0,    -- boolean 0/1
    created_at  TEXT NOT NULL,                 -- ISO-8601 / RFC-3339
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_sender_receiver_created
    ON messages(sender_id, receiver_id, created_at);

CREATE INDEX IF NOT EXISTS idx_messages_receiver_created
    ON messages(receiver_id, created_at);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
