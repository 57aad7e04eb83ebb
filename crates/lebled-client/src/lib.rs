//! # lebled-client
//!
//! The messaging view of the LeBled marketplace: turns the flat message
//! table into a per-conversation inbox, owns the open thread, and keeps both
//! current from local sends and realtime pushes.

pub mod aggregator;
pub mod backend;
pub mod compose;
pub mod config;
pub mod events;
pub mod notifications;
pub mod session;
pub mod state;

mod error;

use tracing_subscriber::{fmt, EnvFilter};

pub use aggregator::ConversationSummary;
pub use backend::{MessageBackend, SqliteBackend};
pub use compose::Draft;
pub use config::MessengerConfig;
pub use error::{ComposeError, MessengerError, Result};
pub use events::MessengerEvent;
pub use session::{spawn_session, MessengerHandle, SentMessage};
pub use state::MessengerSnapshot;

/// Install the global `tracing` subscriber. Respects `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lebled_client=debug,lebled_store=info,warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
