//! Async facade over the synchronous message store.
//!
//! `rusqlite` calls block, and a slow store round-trip for one connection
//! must never stall other connections' event loops, so every call hops
//! onto the blocking pool via `spawn_blocking`.

use std::collections::HashMap;
use std::sync::Arc;

use banter_shared::types::{Message, UserId};
use banter_store::{Database, NewMessage, StoreError};

/// Cloneable handle to the shared database.
#[derive(Clone)]
pub struct MessageStore {
    db: Arc<Database>,
}

impl MessageStore {
    pub fn new(db: Database) -> Self {
        Self { db: Arc::new(db) }
    }

    pub async fn append(&self, new: NewMessage) -> Result<Message, StoreError> {
        let db = self.db.clone();
        run_blocking(move || db.append_message(&new)).await
    }

    pub async fn conversation(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<Vec<Message>, StoreError> {
        let db = self.db.clone();
        run_blocking(move || db.conversation(user_a, user_b)).await
    }

    pub async fn unread_by_sender(
        &self,
        receiver: UserId,
    ) -> Result<HashMap<UserId, i64>, StoreError> {
        let db = self.db.clone();
        run_blocking(move || db.unread_by_sender(receiver)).await
    }

    pub async fn mark_conversation_read(
        &self,
        receiver: UserId,
        sender: UserId,
    ) -> Result<usize, StoreError> {
        let db = self.db.clone();
        run_blocking(move || db.mark_conversation_read(receiver, sender)).await
    }

    pub async fn soft_delete(&self, id: i64, requester: UserId) -> Result<Message, StoreError> {
        let db = self.db.clone();
        run_blocking(move || db.soft_delete(id, requester)).await
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => Err(StoreError::Io(std::io::Error::other(format!(
            "store task failed: {e}"
        )))),
    }
}
