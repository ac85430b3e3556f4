//! # banter-client
//!
//! Client session controller for the banter messaging gateway.
//!
//! The crate is UI-agnostic: [`state::SessionController`] is a pure state
//! machine fed with server frames and user intents, emitting
//! [`events::SessionEvent`]s for whatever shell embeds it. It maintains
//! the open conversation view (optimistic sends, replace-in-place
//! reconciliation), the per-sender unread cache with cursor suppression,
//! and the cached presence set. [`rest::ChatApi`] is the typed client for
//! the gateway's REST collaborator endpoints.

pub mod conversation;
pub mod events;
pub mod rest;
pub mod state;

pub use conversation::{ConversationView, LocalDraft, ViewEntry};
pub use events::SessionEvent;
pub use rest::{ApiError, ChatApi};
pub use state::SessionController;
