//! Gap classifier.
//!
//! The single source of truth for "is this a market-gap line". Both the
//! deduplicator and the narrative synthesizer call [`classify`]; nothing else
//! carries its own copy of these patterns.

use regex::Regex;
use std::sync::OnceLock;

use super::sections::bullet_text;

/// Classification of a single report line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    /// Generic absence or scarcity in the market, with no attribution.
    GapStatement,
    /// A claim attributed to a named firm or a cited URL.
    CompetitorFact,
    /// Anything else, including lines that match no pattern confidently.
    Other,
}

/// Labels that look like a capitalized token before a colon but never name a
/// firm.
const GENERIC_LABELS: &[&str] = &[
    "action", "analysis", "why", "note", "notes", "gap", "gaps", "opportunity", "opportunities",
    "insight", "insights", "finding", "findings", "trend", "trends", "pricing", "price", "market",
    "observation", "summary", "key", "risk", "risks", "example", "source", "sources", "tip",
    "result", "impact", "effort", "kpi", "target", "how", "tools", "important", "takeaway",
    "context", "overview", "recommendation", "bottom line", "warning", "update", "missing",
    "limited", "lacking", "none",
];

fn gap_regex() -> &'static Regex {
    static GAP_RE: OnceLock<Regex> = OnceLock::new();
    GAP_RE.get_or_init(|| {
        Regex::new(
            r"(?ix)
            \b(?:
                few(?:er)?
              | none
              | limited
              | lack(?:s|ing|ed)?
              | absen(?:t|ce)
              | scarc(?:e|ity)
              | rare(?:ly)?
              | seldom
              | missing
              | underserved
              | under-served
              | unmet
              | untapped
              | shortage
              | nobody
              | no\s+one
              | hardly\s+any
              | not\s+(?:offered|available|provided)
              | no\s+(?:\w+\s+)?(?:firms?|competitors?|providers?|companies|businesses|shops|practices|offices|one|local|option|options|clear|dedicated|major)
              | (?:market|service)\s+gaps?
            )\b",
        )
        .expect("gap regex must compile")
    })
}

fn parenthetical_url_regex() -> &'static Regex {
    static PAREN_URL_RE: OnceLock<Regex> = OnceLock::new();
    PAREN_URL_RE.get_or_init(|| {
        Regex::new(
            r"(?i)\(\s*(?:https?://)?(?:www\.)?[a-z0-9][a-z0-9-]*(?:\.[a-z0-9-]+)*\.[a-z]{2,}(?:[/?#][^)\s]*)?\s*\)",
        )
        .expect("parenthetical url regex must compile")
    })
}

fn firm_colon_regex() -> &'static Regex {
    static FIRM_COLON_RE: OnceLock<Regex> = OnceLock::new();
    FIRM_COLON_RE.get_or_init(|| {
        // A run of capitalized tokens, optionally bold and optionally followed by
        // a parenthetical, directly before a colon.
        Regex::new(
            r"(?:^|[\s(\[])\**([A-Z][A-Za-z0-9&'.\-]*(?:\s+(?:&|[A-Z][A-Za-z0-9&'.\-]*))*)\**\s*(?:\([^)]*\)\s*)?:(?:\s|$)",
        )
        .expect("firm colon regex must compile")
    })
}

fn adjacent_regex() -> &'static Regex {
    static ADJACENT_RE: OnceLock<Regex> = OnceLock::new();
    ADJACENT_RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:opportunit(?:y|ies)|demand|niche|white\s?space|unclear|uncommon|inconsistent|outdated|only|not|no|without|gaps?)\b",
        )
        .expect("adjacent regex must compile")
    })
}

/// True when the line cites a parenthetical URL or a firm name before a colon.
fn has_attribution(text: &str) -> bool {
    if parenthetical_url_regex().is_match(text) {
        return true;
    }
    firm_colon_regex().captures_iter(text).any(|caps| {
        caps.get(1).is_some_and(|m| {
            let token = m.as_str().trim();
            // "Lacking:" is a gap marker, and in "Few firms offer SEO:" the
            // capitalized run is the object of a gap clause, not a firm.
            !GENERIC_LABELS.contains(&token.to_lowercase().as_str())
                && !gap_regex().is_match(token)
                && !gap_regex().is_match(&text[..m.start()])
        })
    })
}

/// Classify a single report line.
///
/// Attribution wins over gap vocabulary: `"Acme Legal (acme.com): no flat-fee
/// option"` is a [`LineKind::CompetitorFact`].
pub fn classify(line: &str) -> LineKind {
    let text = bullet_text(line);
    if has_attribution(&text) {
        LineKind::CompetitorFact
    } else if gap_regex().is_match(&text) {
        LineKind::GapStatement
    } else {
        LineKind::Other
    }
}

/// How strongly a non-gap line leans toward gap territory.
///
/// Zero for attributed lines and for lines with no gap-adjacent wording.
/// Used only to pick padding for the gaps section.
pub fn gap_affinity(line: &str) -> usize {
    let text = bullet_text(line);
    if has_attribution(&text) {
        return 0;
    }
    adjacent_regex().find_iter(&text).count() + gap_regex().find_iter(&text).count() * 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gap_statements() {
        for line in [
            "Few firms offer flat-fee pricing",
            "- No firms in Springfield advertise evening hours",
            "Limited availability of Spanish-speaking attorneys",
            "Online booking is lacking across the market",
            "None of the local practices publish prices",
            "Weekend consultations are rarely offered",
        ] {
            assert_eq!(classify(line), LineKind::GapStatement, "{}", line);
        }
    }

    #[test]
    fn test_parenthetical_url_is_competitor_fact() {
        assert_eq!(
            classify("Acme Legal (acme.com): no flat-fee option"),
            LineKind::CompetitorFact
        );
        assert_eq!(
            classify("Few reviews mention pricing (https://reviews.example.org/x)"),
            LineKind::CompetitorFact
        );
    }

    #[test]
    fn test_firm_colon_is_competitor_fact() {
        assert_eq!(
            classify("Smith & Jones: limited weekend hours"),
            LineKind::CompetitorFact
        );
        assert_eq!(
            classify("**ClearPath Law**: flat fee $1500"),
            LineKind::CompetitorFact
        );
    }

    #[test]
    fn test_generic_label_is_not_a_firm() {
        assert_eq!(
            classify("Gap: few firms offer payment plans"),
            LineKind::GapStatement
        );
        assert_eq!(classify("Note: prices vary widely"), LineKind::Other);
    }

    #[test]
    fn test_gap_worded_label_is_not_a_firm() {
        assert_eq!(
            classify("Lacking: evening availability"),
            LineKind::GapStatement
        );
        assert_eq!(
            classify("Few firms offer SEO: none rank locally"),
            LineKind::GapStatement
        );
        assert_eq!(
            classify("Competitors include Acme Legal: no flat-fee option"),
            LineKind::CompetitorFact
        );
    }

    #[test]
    fn test_other_lines() {
        assert_eq!(classify("Average fees range from $1200 to $2000"), LineKind::Other);
        assert_eq!(classify(""), LineKind::Other);
    }

    #[test]
    fn test_classification_ignores_bullet_markers() {
        assert_eq!(
            classify("1. Few firms offer flat-fee pricing"),
            classify("Few firms offer flat-fee pricing")
        );
    }

    #[test]
    fn test_gap_affinity() {
        assert_eq!(gap_affinity("Acme Legal (acme.com): no flat-fee option"), 0);
        assert_eq!(gap_affinity("Average fees range from $1200 to $2000"), 0);
        assert!(gap_affinity("Demand for evening hours is an opportunity") >= 2);
    }
}
