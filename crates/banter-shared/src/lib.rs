//! # banter-shared
//!
//! Wire protocol and domain types shared between the banter gateway
//! server and the client session controller.
//!
//! The crate is deliberately small: the canonical [`types::Message`]
//! record, the JSON frames exchanged over the real-time channel, the DTOs
//! of the REST collaborator endpoints, and a handful of protocol
//! constants. Everything serializes with `serde` so both sides of the
//! wire agree on one schema.

pub mod constants;
pub mod protocol;
pub mod types;

pub use types::{AttachmentKind, Message, Principal, UserId};
