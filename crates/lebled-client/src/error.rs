use thiserror::Error;

/// Errors surfaced by the messaging session handle.
///
/// Store failures inside the session never reach callers: they are logged
/// and the session keeps its previous state. The variants here cover what a
/// caller can still get wrong or lose.
#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("Invalid message: {0}")]
    Compose(#[from] ComposeError),

    #[error("Messaging session has shut down")]
    SessionClosed,
}

/// Rejections raised while turning user input into a sendable draft.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("message is empty")]
    Blank,

    #[error("message too long: {len} bytes (max {max})")]
    TooLong { len: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, MessengerError>;
