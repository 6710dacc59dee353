//! Minimal typed template engine.
//!
//! `{{key}}` substitutes a variable; `{{#key}}...{{/key}}` keeps its body only
//! when `key` is present. Every variable carries its own escaping rule.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::error::RenderError;

/// A template variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateValue {
    /// Plain text, HTML-escaped on insertion
    Text(String),
    /// A link target, validated and attribute-escaped
    Href(String),
    /// A pre-rendered fragment, inserted verbatim
    Html(String),
}

/// Variables for one render.
pub type Vars = BTreeMap<&'static str, TemplateValue>;

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER_RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([a-z_]+)\s*\}\}").expect("placeholder regex must compile")
    })
}

fn link_regex() -> &'static Regex {
    static LINK_RE: OnceLock<Regex> = OnceLock::new();
    LINK_RE.get_or_init(|| {
        Regex::new(r"\[([^\]]+)\]\(\s*([^)\s]+)\s*\)").expect("link regex must compile")
    })
}

fn bold_regex() -> &'static Regex {
    static BOLD_RE: OnceLock<Regex> = OnceLock::new();
    BOLD_RE.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold regex must compile"))
}

/// Escape text for HTML bodies and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Validate a link target and escape it for an `href` attribute.
///
/// Only `http`, `https` and `mailto` links are accepted.
pub fn validate_href(url: &str) -> Result<String, RenderError> {
    let trimmed = url.trim();
    let lower = trimmed.to_ascii_lowercase();
    let allowed = ["http://", "https://", "mailto:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme) && lower.len() > scheme.len());
    if !allowed || trimmed.chars().any(char::is_whitespace) {
        return Err(RenderError::InvalidUrl(trimmed.to_string()));
    }
    Ok(escape_html(trimmed))
}

/// Convert `**bold**` and `[label](url)` in a line of text to HTML.
///
/// Everything else is escaped. Links with unsupported schemes stay as text.
pub fn inline_markdown(text: &str) -> String {
    let render_plain = |segment: &str| {
        bold_regex()
            .replace_all(&escape_html(segment), "<strong>$1</strong>")
            .into_owned()
    };

    let mut out = String::new();
    let mut last = 0;
    for caps in link_regex().captures_iter(text) {
        let (Some(all), Some(label), Some(url)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        out.push_str(&render_plain(&text[last..all.start()]));
        match validate_href(url.as_str()) {
            Ok(href) => out.push_str(&format!(
                "<a href=\"{}\">{}</a>",
                href,
                render_plain(label.as_str())
            )),
            Err(_) => out.push_str(&render_plain(all.as_str())),
        }
        last = all.end();
    }
    out.push_str(&render_plain(&text[last..]));
    out
}

fn value_is_present(value: Option<&TemplateValue>) -> bool {
    match value {
        Some(TemplateValue::Text(s) | TemplateValue::Href(s) | TemplateValue::Html(s)) => {
            !s.trim().is_empty()
        }
        None => false,
    }
}

/// Resolve `{{#key}}...{{/key}}` blocks.
fn expand_blocks(template: &str, vars: &Vars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{#") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 3..];
        let Some(key_end) = after_open.find("}}") else {
            out.push_str(&rest[open..]);
            return out;
        };
        let key = after_open[..key_end].trim();
        let body_start = &after_open[key_end + 2..];
        let close_tag = format!("{{{{/{}}}}}", key);
        let Some(close) = body_start.find(&close_tag) else {
            // Unclosed block: keep the tag as literal text.
            out.push_str(&rest[open..open + 3 + key_end + 2]);
            rest = body_start;
            continue;
        };
        if value_is_present(vars.get(key)) {
            out.push_str(&expand_blocks(&body_start[..close], vars));
        }
        rest = &body_start[close + close_tag.len()..];
    }
    out.push_str(rest);
    out
}

/// Render a template against typed variables.
pub fn render_template(template: &str, vars: &Vars) -> Result<String, RenderError> {
    let expanded = expand_blocks(template, vars);

    let mut out = String::with_capacity(expanded.len());
    let mut last = 0;
    for caps in placeholder_regex().captures_iter(&expanded) {
        let (Some(all), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&expanded[last..all.start()]);
        let value = vars
            .get(key.as_str())
            .ok_or_else(|| RenderError::MissingVariable(key.as_str().to_string()))?;
        match value {
            TemplateValue::Text(text) => out.push_str(&escape_html(text)),
            TemplateValue::Href(url) => out.push_str(&validate_href(url)?),
            TemplateValue::Html(html) => out.push_str(html),
        }
        last = all.end();
    }
    out.push_str(&expanded[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&'static str, TemplateValue)]) -> Vars {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn test_text_is_escaped() {
        let out = render_template(
            "<h1>{{name}}</h1>",
            &vars(&[("name", TemplateValue::Text("Smith & <Co>".into()))]),
        )
        .unwrap();
        assert_eq!(out, "<h1>Smith &amp; &lt;Co&gt;</h1>");
    }

    #[test]
    fn test_href_is_validated() {
        let template = "<a href=\"{{site}}\">site</a>";
        let ok = render_template(
            template,
            &vars(&[("site", TemplateValue::Href("https://example.com/?a=1&b=2".into()))]),
        )
        .unwrap();
        assert_eq!(ok, "<a href=\"https://example.com/?a=1&amp;b=2\">site</a>");

        let err = render_template(
            template,
            &vars(&[("site", TemplateValue::Href("javascript:alert(1)".into()))]),
        )
        .unwrap_err();
        assert_eq!(err, RenderError::InvalidUrl("javascript:alert(1)".into()));
    }

    #[test]
    fn test_html_is_verbatim() {
        let out = render_template(
            "{{body}}",
            &vars(&[("body", TemplateValue::Html("<ul><li>x</li></ul>".into()))]),
        )
        .unwrap();
        assert_eq!(out, "<ul><li>x</li></ul>");
    }

    #[test]
    fn test_optional_block_omitted_when_absent() {
        let template = "a{{#linkedin}}<a href=\"{{linkedin}}\">in</a>{{/linkedin}}b";
        assert_eq!(render_template(template, &Vars::new()).unwrap(), "ab");

        let out = render_template(
            template,
            &vars(&[("linkedin", TemplateValue::Href("https://linkedin.com/x".into()))]),
        )
        .unwrap();
        assert_eq!(out, "a<a href=\"https://linkedin.com/x\">in</a>b");
    }

    #[test]
    fn test_blank_value_counts_as_absent() {
        let template = "{{#tagline}}<p>{{tagline}}</p>{{/tagline}}";
        let out = render_template(
            template,
            &vars(&[("tagline", TemplateValue::Text("  ".into()))]),
        )
        .unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn test_missing_variable() {
        let err = render_template("{{nope}}", &Vars::new()).unwrap_err();
        assert_eq!(err, RenderError::MissingVariable("nope".into()));
    }

    #[test]
    fn test_inline_markdown() {
        assert_eq!(
            inline_markdown("**ClearPath** charges <$1500> per [case](https://x.com/a?b=1&c=2)"),
            "<strong>ClearPath</strong> charges &lt;$1500&gt; per <a href=\"https://x.com/a?b=1&amp;c=2\">case</a>"
        );
        assert_eq!(
            inline_markdown("[bad](javascript:void)"),
            "[bad](javascript:void)"
        );
    }

    #[test]
    fn test_mailto_allowed() {
        assert_eq!(
            validate_href("mailto:hi@example.com").unwrap(),
            "mailto:hi@example.com"
        );
        assert!(validate_href("mailto:").is_err());
        assert!(validate_href("https://exa mple.com").is_err());
    }
}
