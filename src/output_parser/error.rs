//! Error types for output parsers.

/// Errors returned when raw model text cannot be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The model response was empty or whitespace-only.
    #[error("empty LLM response")]
    EmptyResponse,

    /// The text was not valid JSON.
    #[error("invalid JSON ({reason}): {text}")]
    InvalidJson {
        /// The serde error message.
        reason: String,
        /// A truncated copy of the cleaned text (max 200 chars).
        text: String,
    },

    /// Valid JSON whose top level is not an object.
    #[error("expected a JSON object, got {found}")]
    NotAnObject {
        /// Kind of the top-level value (e.g. `"array"`).
        found: &'static str,
    },
}

/// Truncate a string to at most `max_len` characters, appending "..." if truncated.
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_short() {
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn truncate_long_multibyte() {
        assert_eq!(truncate("ééééé", 2), "éé...");
    }
}
