//! # lebled-store
//!
//! Persistent message storage for the LeBled messaging view, backed by
//! SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection`, provides typed CRUD helpers for profiles and
//! messages, and publishes every inserted message on a realtime hub that
//! sessions subscribe to with a receiver filter.

pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod profiles;
pub mod realtime;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use realtime::{RealtimeHub, Subscription};
