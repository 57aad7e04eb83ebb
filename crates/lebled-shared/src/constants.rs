/// Application name
pub const APP_NAME: &str = "LeBled";

/// Maximum message body size in bytes (16 KiB)
pub const MAX_MESSAGE_BYTES: usize = 16 * 1024;

/// Number of characters kept in a notification preview
pub const PREVIEW_CHARS: usize = 50;

/// Display name used when a peer has neither a name nor an email
pub const UNKNOWN_PEER_NAME: &str = "Unknown";

/// Capacity of the realtime insert broadcast channel
pub const PUSH_CHANNEL_CAPACITY: usize = 1024;
