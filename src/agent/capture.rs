//! Tolerant JSON capture from model output.
//!
//! Models wrap JSON in prose, fences, comments and Python-style quoting. This
//! module extracts the object and repairs the common breakages before giving
//! up.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Inputs longer than this are rejected after repair.
const MAX_JSON_CHARS: usize = 50_000;

fn fenced_json_regex() -> &'static Regex {
    static FENCED_RE: OnceLock<Regex> = OnceLock::new();
    FENCED_RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced json regex must compile")
    })
}

fn outer_object_regex() -> &'static Regex {
    static OUTER_RE: OnceLock<Regex> = OnceLock::new();
    OUTER_RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("outer object regex must compile"))
}

fn trailing_comma_regex() -> &'static Regex {
    static TRAILING_RE: OnceLock<Regex> = OnceLock::new();
    TRAILING_RE
        .get_or_init(|| Regex::new(r",\s*([}\]])").expect("trailing comma regex must compile"))
}

fn html_tag_regex() -> &'static Regex {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    TAG_RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("html tag regex must compile"))
}

/// Slice of `text` up to the brace that closes the first `{`.
fn balanced_prefix(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Remove `//` and `/* */` comments that sit outside string literals.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;
    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        let lookahead = chars.peek().copied();
        match (c, lookahead) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Convert a Python-dict style object to JSON quoting.
fn requote_single(text: &str) -> String {
    static KEY_RE: OnceLock<Regex> = OnceLock::new();
    static VALUE_RE: OnceLock<Regex> = OnceLock::new();
    let key_re =
        KEY_RE.get_or_init(|| Regex::new(r"'([^']*)'\s*:").expect("quote key regex must compile"));
    let value_re = VALUE_RE
        .get_or_init(|| Regex::new(r":\s*'([^']*)'").expect("quote value regex must compile"));
    let keyed = key_re.replace_all(text, "\"${1}\":");
    value_re.replace_all(&keyed, ": \"${1}\"").into_owned()
}

/// Parse a JSON object out of free-form model output.
///
/// Returns `None` when nothing object-shaped can be recovered.
pub fn capture_json(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let candidate = if let Some(caps) = fenced_json_regex().captures(text) {
        caps.get(1)?.as_str()
    } else if text.starts_with('{') {
        balanced_prefix(text).unwrap_or(text)
    } else {
        outer_object_regex().find(text)?.as_str()
    };

    if let Ok(value) = serde_json::from_str::<Value>(candidate)
        && value.is_object()
    {
        return Some(value);
    }

    let mut repaired = strip_comments(candidate);
    repaired = trailing_comma_regex()
        .replace_all(&repaired, "$1")
        .into_owned();

    let head: String = repaired.chars().take(100).collect();
    if repaired.contains('\'') && !head.contains('"') {
        repaired = requote_single(&repaired);
    }

    let open = repaired.matches('{').count();
    let close = repaired.matches('}').count();
    if open > close {
        repaired.push_str(&"}".repeat(open - close));
    }

    repaired = html_tag_regex().replace_all(&repaired, "").into_owned();

    if repaired.len() > MAX_JSON_CHARS {
        return None;
    }

    serde_json::from_str::<Value>(&repaired)
        .ok()
        .filter(Value::is_object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_comma() {
        let value = capture_json(r#"{"short_summary": "test", "actions": [],}"#).unwrap();
        assert_eq!(value["short_summary"], "test");
    }

    #[test]
    fn test_single_quotes() {
        let value = capture_json("{'short_summary': 'test', 'actions': []}").unwrap();
        assert_eq!(value["short_summary"], "test");
    }

    #[test]
    fn test_fenced_block() {
        let value =
            capture_json("Some text\n```json\n{\"short_summary\": \"test\"}\n```\nMore text")
                .unwrap();
        assert_eq!(value["short_summary"], "test");
    }

    #[test]
    fn test_prose_around_object() {
        let value = capture_json("Here you go: {\"a\": 1} hope it helps").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_comments_outside_strings_only() {
        let text = "{\n  \"url\": \"https://example.com\", // the site\n  /* note */ \"n\": 2\n}";
        let value = capture_json(text).unwrap();
        assert_eq!(value["url"], "https://example.com");
        assert_eq!(value["n"], 2);
    }

    #[test]
    fn test_missing_closing_brace() {
        let value = capture_json("{\"a\": {\"b\": 1}").unwrap();
        assert_eq!(value["a"]["b"], 1);
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(capture_json(""), None);
        assert_eq!(capture_json("no json here"), None);
        assert_eq!(capture_json("{not: json: at all"), None);
    }

    #[test]
    fn test_trailing_text_after_object() {
        let value = capture_json("{\"a\": \"}\"} trailing {junk}").unwrap();
        assert_eq!(value["a"], "}");
    }
}
