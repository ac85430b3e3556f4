//! # banter-store
//!
//! Durable persistence for direct messages, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` behind a mutex and provides typed helpers for
//! every message operation: append, bounded conversation retrieval,
//! per-sender unread aggregation, bulk read-marking, and sender-only
//! soft deletion. Async callers bridge in via `spawn_blocking`.

pub mod database;
pub mod messages;
pub mod migrations;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use messages::NewMessage;
