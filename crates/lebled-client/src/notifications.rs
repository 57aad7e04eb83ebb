//! Toast text for incoming messages.

use lebled_shared::constants::PREVIEW_CHARS;

/// The first [`PREVIEW_CHARS`] characters of `content`, with `...` appended
/// when anything was cut.
pub fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

pub fn toast_text(content: &str) -> String {
    format!("New message: {}", preview(content))
}
