//! Print a user's conversation list as JSON.
//!
//! Usage: `lebled-inbox <user-uuid>`

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use lebled_client::{spawn_session, MessengerConfig, SqliteBackend};
use lebled_shared::constants::{APP_NAME, UNKNOWN_PEER_NAME};
use lebled_shared::UserId;
use lebled_store::StoreError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lebled_client::init_tracing();

    let user: UserId = std::env::args()
        .nth(1)
        .context("usage: lebled-inbox <user-uuid>")?
        .parse()
        .context("user id must be a UUID")?;

    info!(user = %user.short(), "Starting {APP_NAME} inbox");

    let config = MessengerConfig::from_env();
    info!(?config, "Loaded configuration");

    let backend = Arc::new(SqliteBackend::open(&config).context("failed to open database")?);

    let user_name = {
        let db = backend.database();
        let db = db
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))?;
        match db.get_profile(user) {
            Ok(profile) => profile.full_name.or(profile.email),
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(e).context("failed to read profile"),
        }
    };
    let user_name = user_name.unwrap_or_else(|| UNKNOWN_PEER_NAME.to_string());
    info!(user = %user.short(), name = %user_name, "Resolved profile");

    let handle = spawn_session(backend, Some(user), &config);

    let snapshot = handle.snapshot().await?;
    handle.shutdown().await;

    info!(
        user = %user,
        conversations = snapshot.conversations.len(),
        total_unread = snapshot.total_unread,
        "inbox loaded"
    );

    let out = serde_json::json!({
        "user": user_name,
        "conversations": snapshot.conversations,
        "total_unread": snapshot.total_unread,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);

    Ok(())
}
