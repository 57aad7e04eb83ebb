//! Input validation in front of the session.
//!
//! The session never checks message content itself; it only accepts a
//! [`Draft`], and a draft can only be built from text that is non-blank once
//! trimmed.

use lebled_shared::constants::MAX_MESSAGE_BYTES;

use crate::error::ComposeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft(String);

impl Draft {
    pub fn new(text: &str) -> Result<Self, ComposeError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ComposeError::Blank);
        }
        if trimmed.len() > MAX_MESSAGE_BYTES {
            return Err(ComposeError::TooLong {
                len: trimmed.len(),
                max: MAX_MESSAGE_BYTES,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}
