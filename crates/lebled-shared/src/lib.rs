//! # lebled-shared
//!
//! Identifier types and constants shared by the LeBled store and client
//! crates.

pub mod constants;
pub mod types;

pub use types::{ConversationId, MessageId, UserId};
