//! Action board items.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use super::sections::{bullet_text, ReportDocument, SectionName};

/// Allowed action horizons in days.
pub const TARGET_DAYS: [u32; 4] = [14, 30, 60, 90];

const DEFAULT_TARGET_PERCENT: &str = "+10%";
const DEFAULT_TARGET_DAYS: u32 = 30;

/// Low / medium / high rating used for effort and impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Level {
    #[serde(rename = "L")]
    Low,
    #[default]
    #[serde(rename = "M")]
    Medium,
    #[serde(rename = "H")]
    High,
}

impl Level {
    fn from_letter(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" | "LOW" => Some(Level::Low),
            "M" | "MED" | "MEDIUM" => Some(Level::Medium),
            "H" | "HIGH" => Some(Level::High),
            _ => None,
        }
    }

    /// Single-letter code.
    pub fn letter(self) -> char {
        match self {
            Level::Low => 'L',
            Level::Medium => 'M',
            Level::High => 'H',
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// A single recommended action with KPI and target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    pub title: String,
    pub kpi: String,
    pub target_percent: String,
    pub target_days: u32,
    #[serde(default)]
    pub how_steps: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub effort: Level,
    #[serde(default)]
    pub impact: Level,
}

impl ActionItem {
    /// Render as a single action-board line.
    ///
    /// `Title — KPI: metric Target: +X% in N days (Effort:L; Impact:H) | HOW: ... | TOOLS: ...`
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{} — KPI: {} Target: {} in {} days (Effort:{}; Impact:{})",
            self.title, self.kpi, self.target_percent, self.target_days, self.effort, self.impact
        );
        if !self.how_steps.is_empty() {
            let steps: Vec<String> = self
                .how_steps
                .iter()
                .enumerate()
                .map(|(i, s)| format!("{}) {}", i + 1, s))
                .collect();
            line.push_str(&format!(" | HOW: {}", steps.join(" | ")));
        }
        if !self.tools.is_empty() {
            let tools: Vec<String> = self
                .tools
                .iter()
                .enumerate()
                .map(|(i, t)| format!("{}) {}", i + 1, t))
                .collect();
            line.push_str(&format!(" | TOOLS: {}", tools.join(" ")));
        }
        line
    }

    /// True for low-effort, high-impact actions.
    pub fn is_quick_win(&self) -> bool {
        self.effort == Level::Low && self.impact == Level::High
    }
}

/// Normalize a target percentage: `+N%`, `-N%` or `complete`.
pub fn validate_target_percent(value: &str) -> String {
    static PERCENT_RE: OnceLock<Regex> = OnceLock::new();
    let re = PERCENT_RE
        .get_or_init(|| Regex::new(r"^[+\-]?\d+%$").expect("percent regex must compile"));
    let value = value.trim();
    if value.eq_ignore_ascii_case("complete") {
        "complete".to_string()
    } else if re.is_match(value) {
        value.to_string()
    } else {
        DEFAULT_TARGET_PERCENT.to_string()
    }
}

/// Clamp a horizon to one of [`TARGET_DAYS`].
pub fn validate_target_days(days: u32) -> u32 {
    if TARGET_DAYS.contains(&days) {
        days
    } else {
        DEFAULT_TARGET_DAYS
    }
}

fn action_regex() -> &'static Regex {
    static ACTION_RE: OnceLock<Regex> = OnceLock::new();
    ACTION_RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?P<title>.+?)\s*(?:—|–|--?)\s*KPI:\s*(?P<kpi>.+?)\s+Target:\s*(?P<pct>[+\-]?\d+%|complete)(?:\s+in\s+(?P<days>\d+)\s*days?)?\s*(?:\(\s*Effort:\s*(?P<effort>[LMH])\w*\s*;\s*Impact:\s*(?P<impact>[LMH])\w*\s*\))?",
        )
        .expect("action regex must compile")
    })
}

fn numbered_items(segment: &str) -> Vec<String> {
    static ITEM_RE: OnceLock<Regex> = OnceLock::new();
    let re = ITEM_RE
        .get_or_init(|| Regex::new(r"\d+\)\s*").expect("numbered item regex must compile"));
    re.split(segment)
        .map(|s| s.trim().trim_end_matches('|').trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse one action-board line. Returns `None` when the line has no KPI/target.
pub fn parse_action_line(line: &str) -> Option<ActionItem> {
    let text = bullet_text(line);
    let (head, tools) = match text.split_once("| TOOLS:") {
        Some((head, tools)) => (head, numbered_items(tools)),
        None => (text.as_str(), Vec::new()),
    };
    let (head, how_steps) = match head.split_once("| HOW:") {
        Some((head, how)) => (head, numbered_items(how)),
        None => (head, Vec::new()),
    };

    let caps = action_regex().captures(head.trim())?;
    let title = caps.name("title")?.as_str().trim().trim_matches('*').trim();
    if title.is_empty() {
        return None;
    }
    let days = caps
        .name("days")
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .unwrap_or(DEFAULT_TARGET_DAYS);

    Some(ActionItem {
        title: title.to_string(),
        kpi: caps.name("kpi")?.as_str().trim().to_string(),
        target_percent: validate_target_percent(caps.name("pct")?.as_str()),
        target_days: validate_target_days(days),
        how_steps,
        tools,
        effort: caps
            .name("effort")
            .and_then(|m| Level::from_letter(m.as_str()))
            .unwrap_or_default(),
        impact: caps
            .name("impact")
            .and_then(|m| Level::from_letter(m.as_str()))
            .unwrap_or_default(),
    })
}

/// Parse every action line in the document's action board.
pub fn parse_actions(doc: &ReportDocument) -> Vec<ActionItem> {
    doc.lines_of(&SectionName::ActionBoard)
        .filter_map(parse_action_line)
        .collect()
}
