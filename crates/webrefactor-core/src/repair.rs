//! Repairs for almost-JSON.
//!
//! LLM replies get cut off mid-object and pick up trailing commas. The
//! repair pass is string-aware: brackets and commas inside string
//! literals are never touched.

/// Scanner state after walking a candidate.
struct Scan {
    /// Closers still owed, innermost last.
    stack: Vec<u8>,
    in_string: bool,
    /// Byte offset just past the last complete array element, with the
    /// closers owed at that point.
    last_safe: Option<(usize, Vec<u8>)>,
}

fn scan(text: &str) -> Scan {
    let bytes = text.as_bytes();
    let mut stack: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut last_safe = None;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => stack.push(b'}'),
            b'[' => stack.push(b']'),
            b'}' | b']' => {
                if stack.last() == Some(&b) {
                    stack.pop();
                }
                if stack.last() == Some(&b']') {
                    last_safe = Some((i + 1, stack.clone()));
                }
            }
            b',' if stack.last() == Some(&b']') => {
                last_safe = Some((i, stack.clone()));
            }
            _ => {}
        }
    }

    Scan {
        stack,
        in_string,
        last_safe,
    }
}

/// Whether the candidate ends inside a string or with unclosed brackets.
pub fn is_truncated(text: &str) -> bool {
    let s = scan(text);
    s.in_string || !s.stack.is_empty()
}

/// Best-effort repair of a JSON candidate.
///
/// A truncated tail is kept only when it already names both a `type` and
/// a `selector` and still closes into valid JSON; otherwise it is cut
/// back to the last complete array element. Missing closers are then
/// appended and trailing commas stripped.
pub fn repair(text: &str) -> String {
    let text = text.trim();
    let s = scan(text);

    if !s.in_string && s.stack.is_empty() {
        return strip_trailing_commas(text);
    }

    if !s.in_string {
        let tail_start = s.last_safe.as_ref().map(|(pos, _)| *pos).unwrap_or(0);
        let tail = &text[tail_start..];
        if tail.contains("\"type\"") && tail.contains("\"selector\"") {
            let closed = close(text, &s.stack);
            if serde_json::from_str::<serde_json::Value>(&closed).is_ok() {
                return closed;
            }
        }
    }

    match s.last_safe {
        Some((pos, stack)) => close(&text[..pos], &stack),
        None if !s.in_string => close(text, &s.stack),
        None => text.to_string(),
    }
}

fn close(prefix: &str, stack: &[u8]) -> String {
    let mut out = prefix.trim_end().trim_end_matches(',').to_string();
    out.extend(stack.iter().rev().map(|&b| b as char));
    strip_trailing_commas(&out)
}

/// Drop commas that are followed only by whitespace and a closer.
pub fn strip_trailing_commas(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut last = 0;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b',' => {
                let next = bytes[i + 1..].iter().find(|c| !c.is_ascii_whitespace());
                if matches!(next, Some(b'}') | Some(b']')) {
                    out.push_str(&text[last..i]);
                    last = i + 1;
                }
            }
            _ => {}
        }
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn parse(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn test_truncated_mid_string_drops_fragment() {
        let text = r#"{"actions":[{"type":"hide","selector":".x"},{"type":"remov"#;
        assert!(is_truncated(text));
        assert_eq!(
            parse(&repair(text)),
            json!({"actions": [{"type": "hide", "selector": ".x"}]})
        );
    }

    #[test]
    fn test_trailing_object_without_selector_dropped() {
        let text = r#"{"actions":[{"type":"hide","selector":".x"},{"type":"remove""#;
        assert_eq!(
            parse(&repair(text)),
            json!({"actions": [{"type": "hide", "selector": ".x"}]})
        );
    }

    #[test]
    fn test_complete_tail_is_kept() {
        let text = r#"{"actions":[{"type":"hide","selector":".x"},{"type":"hide","selector":".y""#;
        assert_eq!(
            parse(&repair(text)),
            json!({"actions": [
                {"type": "hide", "selector": ".x"},
                {"type": "hide", "selector": ".y"}
            ]})
        );
    }

    #[test]
    fn test_tail_that_cannot_close_is_dropped() {
        let text = r#"{"actions":[{"type":"hide","selector":".x"},{"type":"hide","selector":"#;
        assert_eq!(
            parse(&repair(text)),
            json!({"actions": [{"type": "hide", "selector": ".x"}]})
        );
    }

    #[test]
    fn test_trailing_commas_stripped() {
        let text = r#"{"actions":[{"type":"hide","selector":".x",},],}"#;
        assert_eq!(
            parse(&repair(text)),
            json!({"actions": [{"type": "hide", "selector": ".x"}]})
        );
    }

    #[test]
    fn test_commas_in_strings_untouched() {
        let text = r#"{"reason":"a,}","actions":[]}"#;
        assert_eq!(strip_trailing_commas(text), text);
    }

    #[test]
    fn test_missing_closers_appended() {
        let text = r#"{"actions":[{"type":"hide","selector":".x"}"#;
        assert_eq!(
            parse(&repair(text)),
            json!({"actions": [{"type": "hide", "selector": ".x"}]})
        );
    }
}
