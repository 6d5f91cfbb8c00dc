//! Logging setup and log-safe previews of raw content.
//!
//! Every fallback branch in the pipeline logs the value that triggered it so
//! the sanitization rules can be tightened later. Raw values can be huge or
//! deeply nested, so they are logged through [`preview`], never verbatim.

use crate::content::RawNode;

const PREVIEW_DEPTH: usize = 4;
const PREVIEW_MAX_CHARS: usize = 160;

/// Initialize JSON logging (call once, early in the host binary).
pub fn init_json_logging() {
    // A second init (tests, embedding hosts) is not an error worth surfacing.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .with_current_span(true)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .try_init();
}

/// Bounded single-line rendering of a raw value for log fields.
pub fn preview(node: &RawNode) -> String {
    let full = match node {
        RawNode::Function(name) => format!("<function {name}>"),
        RawNode::Symbol(desc) => format!("<symbol {desc}>"),
        RawNode::Undefined => "<undefined>".to_string(),
        _ => serde_json::to_string(&node.bounded(PREVIEW_DEPTH))
            .unwrap_or_else(|_| format!("<unserializable {}>", node.kind())),
    };
    truncate_chars(&full, PREVIEW_MAX_CHARS)
}

/// Truncates on a char boundary and marks the cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}…", &s[..idx]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_preview_small_value_verbatim() {
        let node = RawNode::from(json!({"text": "hi"}));
        assert_eq!(preview(&node), r#"{"text":"hi"}"#);
    }

    #[test]
    fn test_preview_is_bounded() {
        let node = RawNode::text("x".repeat(1_000));
        let p = preview(&node);
        assert_eq!(p.chars().count(), PREVIEW_MAX_CHARS + 1);
        assert!(p.ends_with('…'));
    }

    #[test]
    fn test_preview_never_fails() {
        let node = RawNode::map([("cb", RawNode::Function("onSubmit".into()))]);
        assert_eq!(preview(&node), "{}");

        let mut deep = RawNode::text("leaf");
        for _ in 0..=PREVIEW_DEPTH {
            deep = RawNode::map([("wrap", deep)]);
        }
        assert_eq!(preview(&deep), "<unserializable object>");
        assert_eq!(preview(&RawNode::Function("f".into())), "<function f>");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé…");
        assert_eq!(truncate_chars("abc", 3), "abc");
    }
}
