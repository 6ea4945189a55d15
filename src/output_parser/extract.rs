//! Shared cleanup applied to raw model text before structured parsing.

/// Strip reasoning blocks, trim, and unwrap a surrounding markdown fence.
///
/// Only a fence that wraps the whole response is removed; JSON embedded in
/// prose is left alone so that strict parsing reports it.
pub fn preprocess(text: &str) -> String {
    let stripped = strip_think_tags(text);
    let trimmed = stripped.trim();
    match unwrap_code_fence(trimmed) {
        Some(inner) => inner.to_string(),
        None => trimmed.to_string(),
    }
}

/// Strip all `<think>...</think>` and `<thinking>...</thinking>` blocks from text.
///
/// An unclosed block swallows the rest of the text.
///
/// # Examples
///
/// ```
/// use llm_runnables::output_parser::strip_think_tags;
///
/// assert_eq!(strip_think_tags("<think>reasoning</think>result"), "result");
/// assert_eq!(strip_think_tags("<think>no closing tag"), "");
/// ```
pub fn strip_think_tags(text: &str) -> String {
    let result = strip_tag_variant(text, "<think>", "</think>");
    strip_tag_variant(&result, "<thinking>", "</thinking>")
}

fn strip_tag_variant(text: &str, open: &str, close: &str) -> String {
    let mut result = text.to_string();
    while let Some(start) = result.find(open) {
        match result[start..].find(close) {
            Some(end_offset) => {
                let end = start + end_offset + close.len();
                result.replace_range(start..end, "");
            }
            None => {
                result.truncate(start);
                break;
            }
        }
    }
    result
}

/// Return the body of a markdown code block that spans the entire text.
///
/// ```
/// use llm_runnables::output_parser::extract::unwrap_code_fence;
///
/// assert_eq!(unwrap_code_fence("```json\n{\"a\": 1}\n```"), Some("{\"a\": 1}"));
/// assert_eq!(unwrap_code_fence("{\"a\": 1}"), None);
/// ```
pub fn unwrap_code_fence(text: &str) -> Option<&str> {
    let body = text.strip_prefix("```")?.strip_suffix("```")?;
    // The opening line may carry a language hint such as `json`.
    let newline = body.find('\n')?;
    let hint = body[..newline].trim();
    if hint.contains(char::is_whitespace) {
        return None;
    }
    Some(body[newline + 1..].trim())
}
