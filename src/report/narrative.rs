//! Narrative synthesizer.
//!
//! Builds the executive summary prose from the finalized bullet assignment.
//! The summary explains context, competition and rationale; it never repeats
//! the action board, which the email shows separately.

use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;
use tracing::debug;

use super::actions::ActionItem;
use super::dedup::{BulletAssignment, ClassifiedLine};
use super::sections::{bullet_text, normalize_key, ReportDocument, SectionName};
use super::sources::SourceEntry;

const ITEMS_PER_THEME: usize = 3;

/// What the brief is about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BriefContext {
    pub topic: String,
    pub location: String,
    pub business: Option<String>,
}

impl BriefContext {
    pub fn new(topic: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            location: location.into(),
            business: None,
        }
    }

    pub fn business(mut self, business: impl Into<String>) -> Self {
        self.business = Some(business.into());
        self
    }
}

/// Thresholds for detecting an authored summary that just restates the
/// action list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NarrativeConfig {
    /// Token Jaccard similarity at which a summary bullet counts as a copy of
    /// an action title.
    pub title_similarity: f64,
    /// Share of summary bullets that must match titles for the whole summary
    /// to be treated as a near-duplicate.
    pub overlap_ratio: f64,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            title_similarity: 0.7,
            overlap_ratio: 0.5,
        }
    }
}

/// Where the executive summary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarySource {
    Authored,
    Synthesized,
}

/// Executive summary paragraphs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narrative {
    pub paragraphs: Vec<String>,
    pub source: SummarySource,
}

impl Narrative {
    /// All paragraphs joined by blank lines.
    pub fn text(&self) -> String {
        self.paragraphs.join("\n\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Theme {
    Pricing,
    Services,
    Positioning,
    General,
}

impl Theme {
    fn lead(self) -> &'static str {
        match self {
            Theme::Pricing => "Pricing signals include",
            Theme::Services => "Service offerings include",
            Theme::Positioning => "Positioning cues include",
            Theme::General => "Other competitor notes include",
        }
    }
}

fn theme_regexes() -> &'static [(Theme, Regex)] {
    static THEMES: OnceLock<Vec<(Theme, Regex)>> = OnceLock::new();
    THEMES.get_or_init(|| {
        [
            (
                Theme::Pricing,
                r"(?i)\$|\b(?:price|prices|pricing|fee|fees|cost|costs|rate|rates|retainer|free|discount)\b",
            ),
            (
                Theme::Services,
                r"(?i)\b(?:offers?|services?|consult\w*|packages?|hours|booking|online|virtual|weekend|evening|spanish|same-day)\b",
            ),
            (
                Theme::Positioning,
                r"(?i)\b(?:reviews?|ratings?|stars?|brand\w*|known|position\w*|speciali\w+|awards?|years|reputation|ranks?|ranked)\b",
            ),
        ]
        .into_iter()
        .map(|(theme, pattern)| (theme, Regex::new(pattern).expect("theme regex must compile")))
        .collect()
    })
}

fn parenthetical_regex() -> &'static Regex {
    static PAREN_RE: OnceLock<Regex> = OnceLock::new();
    PAREN_RE.get_or_init(|| Regex::new(r"\s*\([^)]*\)").expect("parenthetical regex must compile"))
}

fn theme_of(text: &str) -> Theme {
    theme_regexes()
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(theme, _)| *theme)
        .unwrap_or(Theme::General)
}

/// Split a competitor fact into firm and claim.
fn split_attribution(text: &str) -> (Option<String>, String) {
    let strip = |s: &str| {
        parenthetical_regex()
            .replace_all(s, "")
            .trim()
            .trim_matches('*')
            .trim()
            .to_string()
    };
    // Parentheticals go first so a cited `(https://...)` cannot supply the colon.
    let text = strip(text);
    match text.split_once(':') {
        Some((firm, claim)) if !claim.starts_with("//") => {
            let firm = strip(firm);
            let claim = claim.trim().trim_end_matches('.').to_string();
            if firm.is_empty() {
                (None, claim)
            } else {
                (Some(firm), claim)
            }
        }
        _ => (None, text.trim_end_matches('.').to_string()),
    }
}

fn join_list(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{} {}", n, if n == 1 { one } else { many })
}

fn lower_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        // Keep acronyms ("GBP", "SEO") intact.
        Some(first) if !chars.clone().next().is_some_and(char::is_uppercase) => {
            first.to_lowercase().chain(chars).collect()
        }
        _ => text.to_string(),
    }
}

fn context_paragraph(assignment: &BulletAssignment, context: &BriefContext) -> String {
    let mut text = if context.location.trim().is_empty() {
        format!("This brief covers the {} market.", context.topic.trim())
    } else {
        format!(
            "This brief covers the {} market in {}.",
            context.topic.trim(),
            context.location.trim()
        )
    };
    if let Some(business) = context.business.as_deref().filter(|b| !b.trim().is_empty()) {
        text.push_str(&format!(" It was prepared for {}.", business.trim()));
    }
    let facts = assignment.competitor_facts().count();
    let signals = assignment.main_findings.len() - facts;
    text.push_str(&format!(
        " The research surfaced {}, {} and {}.",
        plural(facts, "competitor observation", "competitor observations"),
        plural(signals, "broader market signal", "broader market signals"),
        plural(
            assignment.dogs_not_barking.len(),
            "clear market gap",
            "clear market gaps"
        ),
    ));
    text
}

fn landscape_paragraph(assignment: &BulletAssignment) -> String {
    let facts: Vec<&ClassifiedLine> = assignment.competitor_facts().collect();
    if facts.is_empty() {
        let mut text = "No directly attributable competitor claims surfaced, so the competitive picture rests on broader market signals.".to_string();
        if let Some(signal) = assignment.main_findings.first() {
            text.push_str(&format!(
                " The strongest of these: {}.",
                lower_first(signal.text.trim_end_matches('.'))
            ));
        }
        return text;
    }

    let mut firms: BTreeSet<String> = BTreeSet::new();
    let mut themed: Vec<(Theme, String)> = Vec::new();
    for fact in &facts {
        let (firm, claim) = split_attribution(&fact.text);
        let item = match &firm {
            Some(firm) if !claim.is_empty() => format!("{} ({})", firm, claim),
            Some(firm) => firm.clone(),
            None => claim.clone(),
        };
        if let Some(firm) = firm {
            firms.insert(firm);
        }
        themed.push((theme_of(&claim), item));
    }

    let mut sentences = Vec::new();
    if !firms.is_empty() {
        let named: Vec<String> = firms.iter().cloned().collect();
        sentences.push(format!(
            "The competitive landscape features {}.",
            join_list(&named)
        ));
    }
    for theme in [
        Theme::Pricing,
        Theme::Services,
        Theme::Positioning,
        Theme::General,
    ] {
        let items: Vec<String> = themed
            .iter()
            .filter(|(t, _)| *t == theme)
            .map(|(_, item)| item.clone())
            .take(ITEMS_PER_THEME)
            .collect();
        if !items.is_empty() {
            sentences.push(format!("{} {}.", theme.lead(), join_list(&items)));
        }
    }
    sentences.join(" ")
}

fn rationale_paragraph(assignment: &BulletAssignment, actions: &[ActionItem]) -> String {
    let mut sentences = Vec::new();
    // One sentence per gap so a title echo only costs that gap.
    for (i, gap) in assignment.dogs_not_barking.iter().take(2).enumerate() {
        let lead = if i == 0 { "The clearest opening" } else { "Another" };
        sentences.push(format!(
            "{}: {}.",
            lead,
            lower_first(gap.text.trim_end_matches('.'))
        ));
    }

    if actions.is_empty() {
        sentences.push(
            "No action board was supplied, so these gaps are the starting agenda.".to_string(),
        );
        return sentences.join(" ");
    }

    let mut seen = HashSet::new();
    let kpis: Vec<String> = actions
        .iter()
        .map(|a| a.kpi.trim().to_lowercase())
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect();
    let shortest = actions.iter().map(|a| a.target_days).min().unwrap_or(30);
    let longest = actions.iter().map(|a| a.target_days).max().unwrap_or(30);
    let horizon = if shortest == longest {
        format!("{} days", shortest)
    } else {
        format!("{} to {} days", shortest, longest)
    };
    sentences.push(format!(
        "The {} below move {} within {}, aiming at the gaps before competitors close them.",
        plural(actions.len(), "recommended action", "recommended actions"),
        join_list(&kpis),
        horizon
    ));
    let quick_wins = actions.iter().filter(|a| a.is_quick_win()).count();
    if quick_wins > 0 {
        sentences.push(format!(
            "{} low effort with high expected impact, so results should show early.",
            if quick_wins == 1 {
                "One of them is".to_string()
            } else {
                format!("{} of them are", quick_wins)
            }
        ));
    }
    sentences.join(" ")
}

fn evidence_paragraph(sources: &[SourceEntry]) -> Option<String> {
    if sources.is_empty() {
        return None;
    }
    let mut seen = HashSet::new();
    let domains: Vec<String> = sources
        .iter()
        .map(SourceEntry::domain)
        .filter(|d| !d.is_empty() && seen.insert(d.clone()))
        .take(3)
        .collect();
    Some(format!(
        "The analysis draws on {}, including {}.",
        plural(sources.len(), "cited source", "cited sources"),
        join_list(&domains)
    ))
}

/// Sentences of a paragraph, split after `.`, `!` or `?` followed by space.
fn sentences(paragraph: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = paragraph.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|n| n.is_whitespace()) {
            out.push(current.trim().to_string());
            current.clear();
        }
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

fn word_run(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `title` occurs in `sentence` as a whole run of words.
fn contains_words(sentence: &[String], title: &[String]) -> bool {
    !title.is_empty() && sentence.windows(title.len()).any(|w| w == title)
}

/// Drop every sentence that contains a full action title.
fn strip_title_echoes(paragraphs: Vec<String>, actions: &[ActionItem]) -> Vec<String> {
    let titles: Vec<Vec<String>> = actions
        .iter()
        .map(|a| word_run(&a.title))
        .filter(|t| !t.is_empty())
        .collect();
    if titles.is_empty() {
        return paragraphs;
    }
    paragraphs
        .into_iter()
        .map(|p| {
            sentences(&p)
                .into_iter()
                .filter(|s| {
                    let words = word_run(s);
                    let echoed = titles.iter().any(|t| contains_words(&words, t));
                    if echoed {
                        debug!(sentence = %s, "dropping sentence that repeats an action title");
                    }
                    !echoed
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|p| !p.is_empty())
        .collect()
}

/// Synthesize a 2-4 paragraph executive summary.
pub fn synthesize(
    assignment: &BulletAssignment,
    context: &BriefContext,
    actions: &[ActionItem],
    sources: &[SourceEntry],
) -> Narrative {
    let mut paragraphs = vec![
        context_paragraph(assignment, context),
        landscape_paragraph(assignment),
        rationale_paragraph(assignment, actions),
    ];
    paragraphs.extend(evidence_paragraph(sources));
    Narrative {
        paragraphs: strip_title_echoes(paragraphs, actions),
        source: SummarySource::Synthesized,
    }
}

fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count() as f64;
    shared / a.union(b).count() as f64
}

/// Whether an authored summary mostly restates the action titles.
pub fn is_near_duplicate(summary: &[String], actions: &[ActionItem], config: &NarrativeConfig) -> bool {
    if summary.is_empty() || actions.is_empty() {
        return false;
    }
    let titles: Vec<(String, HashSet<String>)> = actions
        .iter()
        .map(|a| (normalize_key(&a.title), tokens(&a.title)))
        .collect();
    let matched = summary
        .iter()
        .filter(|line| {
            let key = normalize_key(line);
            let line_tokens = tokens(line);
            titles.iter().any(|(title, title_tokens)| {
                (!title.is_empty() && (key.contains(title.as_str()) || title.contains(key.as_str())))
                    || jaccard(&line_tokens, title_tokens) >= config.title_similarity
            })
        })
        .count();
    matched as f64 / summary.len() as f64 >= config.overlap_ratio
}

/// Pick the authored executive summary when it is usable, otherwise
/// synthesize one.
pub fn choose_summary(
    doc: &ReportDocument,
    assignment: &BulletAssignment,
    context: &BriefContext,
    actions: &[ActionItem],
    sources: &[SourceEntry],
    config: &NarrativeConfig,
) -> Narrative {
    let authored: Vec<String> = doc
        .lines_of(&SectionName::ExecutiveSummary)
        .map(bullet_text)
        .filter(|l| !l.is_empty())
        .collect();

    if authored.is_empty() {
        debug!("no authored executive summary; synthesizing");
    } else if is_near_duplicate(&authored, actions, config) {
        debug!("authored executive summary restates the action list; synthesizing");
    } else {
        return Narrative {
            paragraphs: authored,
            source: SummarySource::Authored,
        };
    }
    synthesize(assignment, context, actions, sources)
}
