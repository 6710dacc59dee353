//! Source extractor.
//!
//! Citations are scanned from the whole document, not just the "Sources"
//! section, since writers often cite inline and leave that section sparse.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use super::sections::{bullet_text, ReportDocument};

/// A deduplicated citation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// The URL or domain as it appeared in the document.
    pub url: String,
    pub label: Option<String>,
}

impl SourceEntry {
    /// Comparison key for deduplication.
    pub fn key(&self) -> String {
        normalize_url(&self.url)
    }

    /// A clickable link target; bare domains get an `https://` scheme.
    pub fn href(&self) -> String {
        let lower = self.url.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            self.url.clone()
        } else {
            format!("https://{}", self.url)
        }
    }

    /// Host part of the URL without `www.`.
    pub fn domain(&self) -> String {
        self.key()
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

fn markdown_link_regex() -> &'static Regex {
    static LINK_RE: OnceLock<Regex> = OnceLock::new();
    LINK_RE.get_or_init(|| {
        Regex::new(r"\[([^\]]+)\]\(\s*([^)\s]+)\s*\)").expect("markdown link regex must compile")
    })
}

fn url_regex() -> &'static Regex {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    URL_RE.get_or_init(|| {
        Regex::new(r#"(?i)\bhttps?://[^\s<>"'()\[\]]+"#).expect("url regex must compile")
    })
}

fn domain_regex() -> &'static Regex {
    static DOMAIN_RE: OnceLock<Regex> = OnceLock::new();
    DOMAIN_RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:www\.)?[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)*\.(?:com|org|net|gov|edu|io|co|us|law|legal|biz|info|ai|app|dev|uk|ca)\b(?:/[^\s<>()\[\]]*)?",
        )
        .expect("domain regex must compile")
    })
}

fn label_separator_regex() -> &'static Regex {
    static SEP_RE: OnceLock<Regex> = OnceLock::new();
    SEP_RE.get_or_init(|| Regex::new(r"^\s*(?:-|—|–|:)\s+").expect("separator regex must compile"))
}

/// Normalize a URL or bare domain for comparison.
///
/// Lowercase, no scheme, no `www.`, no fragment, no trailing slash.
pub fn normalize_url(url: &str) -> String {
    let lower = url.trim().to_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    let without_www = without_scheme
        .strip_prefix("www.")
        .unwrap_or(without_scheme);
    let without_fragment = without_www.split('#').next().unwrap_or_default();
    without_fragment.trim_end_matches('/').to_string()
}

fn trim_trailing_punctuation(url: &str) -> &str {
    url.trim_end_matches(['.', ',', ';', ':', '!', '?', '*', '_'])
}

/// Label text following a citation on its line, e.g. `url - County filings`.
fn trailing_label(rest: &str) -> Option<String> {
    let m = label_separator_regex().find(rest)?;
    let label = rest[m.end()..].trim();
    if label.is_empty() {
        None
    } else {
        Some(label.to_string())
    }
}

struct Match {
    start: usize,
    end: usize,
    url: String,
    label: Option<String>,
}

fn overlaps(taken: &[(usize, usize)], start: usize, end: usize) -> bool {
    taken.iter().any(|&(s, e)| start < e && s < end)
}

/// Citations of a single line, in order of appearance.
fn line_matches(line: &str) -> Vec<Match> {
    let mut matches: Vec<Match> = Vec::new();
    let mut taken: Vec<(usize, usize)> = Vec::new();

    for caps in markdown_link_regex().captures_iter(line) {
        let (Some(all), Some(label), Some(url)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        taken.push((all.start(), all.end()));
        matches.push(Match {
            start: all.start(),
            end: all.end(),
            url: url.as_str().to_string(),
            label: Some(label.as_str().trim().to_string()),
        });
    }

    for m in url_regex().find_iter(line) {
        if overlaps(&taken, m.start(), m.end()) {
            continue;
        }
        let url = trim_trailing_punctuation(m.as_str());
        let end = m.start() + url.len();
        taken.push((m.start(), end));
        matches.push(Match {
            start: m.start(),
            end,
            url: url.to_string(),
            label: None,
        });
    }

    for m in domain_regex().find_iter(line) {
        if overlaps(&taken, m.start(), m.end()) {
            continue;
        }
        // Skip the domain half of an email address.
        if line[..m.start()].ends_with('@') {
            continue;
        }
        let url = trim_trailing_punctuation(m.as_str());
        let end = m.start() + url.len();
        taken.push((m.start(), end));
        matches.push(Match {
            start: m.start(),
            end,
            url: url.to_string(),
            label: None,
        });
    }

    matches.sort_by_key(|m| m.start);

    // A lone citation followed by " - description" takes that description as
    // its label.
    if matches.len() == 1 && matches[0].label.is_none() {
        let rest = &line[matches[0].end..];
        matches[0].label = trailing_label(rest);
    }
    matches
}

/// Extract every citation in the document, deduplicated, in first-appearance
/// order.
pub fn extract_sources(doc: &ReportDocument) -> Vec<SourceEntry> {
    let mut seen = HashSet::new();
    let mut entries: Vec<SourceEntry> = Vec::new();

    for line in doc.text().lines() {
        let line = bullet_text(line);
        for m in line_matches(&line) {
            let entry = SourceEntry {
                url: m.url,
                label: m.label,
            };
            let key = entry.key();
            if key.is_empty() {
                continue;
            }
            if seen.insert(key.clone()) {
                entries.push(entry);
            } else if let Some(existing) = entries.iter_mut().find(|e| e.key() == key)
                && existing.label.is_none()
            {
                existing.label = entry.label;
            }
        }
    }
    entries
}
