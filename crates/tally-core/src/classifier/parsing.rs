//! Cleanup of raw classifier replies
//!
//! Models wrap JSON in markdown fences or surround it with prose. These
//! helpers recover the object before it reaches `serde_json`.

use std::sync::OnceLock;

use regex::Regex;

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[a-zA-Z]*\s*\n?(.*?)```").expect("valid regex"))
}

/// Content of the first fenced block, or the whole reply when unfenced
pub fn strip_code_fences(reply: &str) -> &str {
    fence_re()
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or_else(|| reply.trim())
}

/// First `{` through last `}` of the reply, fences removed
pub fn extract_json_object(reply: &str) -> Option<String> {
    let body = strip_code_fences(reply);
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (start < end).then(|| body[start..=end].to_string())
}

/// Shorten text for logs and error messages on a char boundary
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
