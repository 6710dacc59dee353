//! Section parser.
//!
//! Splits a report into sections by markdown heading. Parsing never fails: a
//! document without headings degrades to one implicit section.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use tracing::warn;

/// Name of a report section.
///
/// The five well-known headings are matched case-insensitively; anything else
/// is kept as an opaque [`SectionName::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SectionName {
    ExecutiveSummary,
    MainFindings,
    DogsNotBarking,
    ActionBoard,
    Sources,
    /// Body text that precedes the first heading, or the whole body when the
    /// document has no headings at all.
    Implicit,
    Other(String),
}

impl SectionName {
    /// Map a heading title onto a section name.
    pub fn from_heading(title: &str) -> Self {
        let normalized = normalize_key(title);
        match normalized.as_str() {
            "executive summary" | "exec summary" | "summary" => SectionName::ExecutiveSummary,
            "main findings" | "key findings" | "findings" => SectionName::MainFindings,
            "dogs not barking" | "dogs that are not barking" => SectionName::DogsNotBarking,
            "action board" | "top actions" | "actions" => SectionName::ActionBoard,
            "sources" | "references" | "citations" => SectionName::Sources,
            _ => SectionName::Other(title.trim().to_string()),
        }
    }

    /// Whether this is one of the well-known headings.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, SectionName::Implicit | SectionName::Other(_))
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionName::ExecutiveSummary => write!(f, "Executive Summary"),
            SectionName::MainFindings => write!(f, "Main Findings"),
            SectionName::DogsNotBarking => write!(f, "Dogs Not Barking"),
            SectionName::ActionBoard => write!(f, "Action Board"),
            SectionName::Sources => write!(f, "Sources"),
            SectionName::Implicit => write!(f, "(body)"),
            SectionName::Other(title) => write!(f, "{}", title),
        }
    }
}

/// A named section with its non-blank body lines in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: SectionName,
    pub lines: Vec<String>,
}

/// An immutable parsed report.
#[derive(Debug, Clone)]
pub struct ReportDocument {
    text: String,
    sections: Vec<Section>,
    degraded: bool,
}

fn heading_regex() -> &'static Regex {
    static HEADING_RE: OnceLock<Regex> = OnceLock::new();
    HEADING_RE.get_or_init(|| {
        Regex::new(r"^\s{0,3}#{1,6}\s+(.+?)\s*#*\s*$").expect("heading regex must compile")
    })
}

fn bold_heading_regex() -> &'static Regex {
    static BOLD_HEADING_RE: OnceLock<Regex> = OnceLock::new();
    BOLD_HEADING_RE.get_or_init(|| {
        Regex::new(r"^\s*(?:\d+[.)]\s*)?\*\*([^*]+?)\*\*\s*:?\s*$")
            .expect("bold heading regex must compile")
    })
}

fn bullet_marker_regex() -> &'static Regex {
    static BULLET_RE: OnceLock<Regex> = OnceLock::new();
    BULLET_RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[-*•+]\s+|\d+[.)]\s+)").expect("bullet marker regex must compile")
    })
}

/// Heading title of a line, if the line is a heading.
fn heading_title(line: &str) -> Option<String> {
    let caps = heading_regex()
        .captures(line)
        .or_else(|| bold_heading_regex().captures(line))?;
    let title = caps.get(1)?.as_str();
    // "## 2. Main Findings:" -> "Main Findings"
    let title = bullet_marker_regex().replace(title.trim(), "");
    let title = title
        .trim()
        .trim_end_matches(':')
        .trim_matches('*')
        .trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

impl ReportDocument {
    /// Parse a raw report.
    pub fn parse(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut sections: Vec<Section> = Vec::new();
        let mut current = Section {
            name: SectionName::Implicit,
            lines: Vec::new(),
        };
        let mut saw_heading = false;

        for line in text.lines() {
            if let Some(title) = heading_title(line) {
                saw_heading = true;
                let finished = std::mem::replace(
                    &mut current,
                    Section {
                        name: SectionName::from_heading(&title),
                        lines: Vec::new(),
                    },
                );
                // The implicit preamble is only worth keeping when it has content.
                if finished.name != SectionName::Implicit || !finished.lines.is_empty() {
                    sections.push(finished);
                }
                continue;
            }
            let trimmed = line.trim_end();
            if !trimmed.trim().is_empty() {
                current.lines.push(trimmed.to_string());
            }
        }
        if current.name != SectionName::Implicit || !current.lines.is_empty() || sections.is_empty()
        {
            sections.push(current);
        }

        let degraded = !sections.iter().any(|s| s.name.is_recognized());
        if degraded {
            warn!(
                headings = saw_heading,
                "report has no recognizable sections; using degraded parse"
            );
        }

        Self {
            text,
            sections,
            degraded,
        }
    }

    /// The original report text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// All sections in document order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// True when no well-known heading was found.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// First section with the given name.
    pub fn section(&self, name: &SectionName) -> Option<&Section> {
        self.sections.iter().find(|s| &s.name == name)
    }

    /// Body lines of every section with the given name, in document order.
    pub fn lines_of<'a>(&'a self, name: &'a SectionName) -> impl Iterator<Item = &'a str> + 'a {
        self.sections
            .iter()
            .filter(move |s| &s.name == name)
            .flat_map(|s| s.lines.iter().map(String::as_str))
    }
}

/// Strip list markers and surrounding whitespace from a body line.
pub fn bullet_text(line: &str) -> String {
    bullet_marker_regex().replace(line, "").trim().to_string()
}

/// Comparison key: bullet text, lowercased, whitespace collapsed.
pub fn normalize_key(line: &str) -> String {
    bullet_text(line)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
