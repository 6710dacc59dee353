//! Brief templates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// The kinds of brief the pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BriefTemplate {
    #[default]
    #[serde(rename = "Competitor Snapshot")]
    CompetitorSnapshot,
    #[serde(rename = "Local SEO Audit")]
    LocalSeoAudit,
    #[serde(rename = "Grant Opportunities")]
    GrantOpportunities,
}

impl BriefTemplate {
    pub const ALL: [BriefTemplate; 3] = [
        BriefTemplate::CompetitorSnapshot,
        BriefTemplate::LocalSeoAudit,
        BriefTemplate::GrantOpportunities,
    ];

    pub fn title(self) -> &'static str {
        match self {
            BriefTemplate::CompetitorSnapshot => "Competitor Snapshot",
            BriefTemplate::LocalSeoAudit => "Local SEO Audit",
            BriefTemplate::GrantOpportunities => "Grant Opportunities",
        }
    }

    /// Research context for this template.
    pub fn context(self, business: &str, location: &str) -> String {
        match self {
            BriefTemplate::CompetitorSnapshot => format!(
                "Top 5 local competitors near {}. Pricing, offers, and site SEO notes. \
End with 5 actions for the next 14 days.",
                location
            ),
            BriefTemplate::LocalSeoAudit => format!(
                "Audit {} in {}: NAP consistency, priority keywords, Google Business Profile, \
citations, and site speed. Prioritize fixes by effort and impact.",
                business, location
            ),
            BriefTemplate::GrantOpportunities => format!(
                "Active grants for {} in {}: eligibility, deadlines, award sizes, and a prep checklist.",
                business, location
            ),
        }
    }

    /// Writer instructions naming the brief context and required sections.
    pub fn writer_instructions(self, business: &str, location: &str) -> String {
        format!(
            "You produce an SMB Decision Brief.\nContext: {}\n\
Sections: Executive Summary (3-5 bullets); Action Board (5 actions with effort/impact); \
Main Findings (markdown bullets); Dogs Not Barking (3 market gaps); Sources (links).",
            self.context(business, location)
        )
    }

    /// Email subject line: `"{template} Brief: {business} – {location}"`.
    pub fn subject(self, business: &str, location: &str) -> String {
        format!("{} Brief: {} – {}", self.title(), business, location)
    }
}

impl fmt::Display for BriefTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for BriefTemplate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| {
                let title: String = t.title().chars().filter(|c| c.is_alphanumeric()).collect();
                title.to_lowercase() == wanted
            })
            .ok_or_else(|| Error::Config(format!("unknown brief template `{}`", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_instructions_include_context() {
        let text = BriefTemplate::LocalSeoAudit.writer_instructions("Smith Law", "Springfield");
        assert!(text.starts_with("You produce an SMB Decision Brief."));
        assert!(text.contains("Audit Smith Law in Springfield"));
        assert!(text.contains("Dogs Not Barking"));
    }

    #[test]
    fn test_competitor_snapshot_uses_location_only() {
        let ctx = BriefTemplate::CompetitorSnapshot.context("Smith Law", "Springfield");
        assert!(ctx.contains("near Springfield"));
        assert!(!ctx.contains("Smith Law"));
    }

    #[test]
    fn test_subject() {
        assert_eq!(
            BriefTemplate::GrantOpportunities.subject("Acme Bakery", "Austin, TX"),
            "Grant Opportunities Brief: Acme Bakery – Austin, TX"
        );
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            "local-seo-audit".parse::<BriefTemplate>().unwrap(),
            BriefTemplate::LocalSeoAudit
        );
        assert_eq!(
            "Competitor Snapshot".parse::<BriefTemplate>().unwrap(),
            BriefTemplate::CompetitorSnapshot
        );
        assert!("weather".parse::<BriefTemplate>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&BriefTemplate::LocalSeoAudit).unwrap();
        assert_eq!(json, "\"Local SEO Audit\"");
    }
}
