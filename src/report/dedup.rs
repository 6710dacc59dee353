//! Content deduplicator.
//!
//! Assigns every candidate line to at most one destination section. Gap
//! statements go to "Dogs Not Barking"; competitor facts and generic lines go
//! to "Main Findings". Per-section slot counts and floors come from
//! [`DedupPolicy`].

use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

use super::classify::{classify, gap_affinity, LineKind};
use super::sections::{bullet_text, normalize_key, ReportDocument, SectionName};

/// Destination sections of a [`BulletAssignment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    MainFindings,
    DogsNotBarking,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::MainFindings => write!(f, "Main Findings"),
            Destination::DogsNotBarking => write!(f, "Dogs Not Barking"),
        }
    }
}

/// A report line with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLine {
    /// Bullet text with list markers removed.
    pub text: String,
    pub kind: LineKind,
    pub source_section: SectionName,
    /// Position of the line among all candidates, in document order.
    pub position: usize,
}

impl ClassifiedLine {
    /// Classify a raw line found in `section` at `position`.
    pub fn new(line: &str, source_section: SectionName, position: usize) -> Self {
        Self {
            text: bullet_text(line),
            kind: classify(line),
            source_section,
            position,
        }
    }

    /// Comparison key used for the dedup invariant.
    pub fn key(&self) -> String {
        normalize_key(&self.text)
    }
}

/// Slot counts for the two destination sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupPolicy {
    /// Exact number of gap bullets wanted.
    pub gap_slots: usize,
    /// Minimum findings bullets kept when candidates allow.
    pub findings_floor: usize,
    /// Maximum findings bullets.
    pub findings_cap: usize,
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self {
            gap_slots: 3,
            findings_floor: 3,
            findings_cap: 10,
        }
    }
}

/// A destination that ended below its floor after candidates ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloorShortfall {
    pub section: Destination,
    pub required: usize,
    pub actual: usize,
}

/// Non-overlapping bullets for the two destination sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulletAssignment {
    pub main_findings: Vec<ClassifiedLine>,
    pub dogs_not_barking: Vec<ClassifiedLine>,
    pub shortfalls: Vec<FloorShortfall>,
}

impl BulletAssignment {
    /// Bullets assigned to `destination`.
    pub fn get(&self, destination: Destination) -> &[ClassifiedLine] {
        match destination {
            Destination::MainFindings => &self.main_findings,
            Destination::DogsNotBarking => &self.dogs_not_barking,
        }
    }

    /// Competitor facts in the findings section.
    pub fn competitor_facts(&self) -> impl Iterator<Item = &ClassifiedLine> {
        self.main_findings
            .iter()
            .filter(|l| l.kind == LineKind::CompetitorFact)
    }

    /// True when both sections are empty.
    pub fn is_empty(&self) -> bool {
        self.main_findings.is_empty() && self.dogs_not_barking.is_empty()
    }
}

/// Classify the candidate lines of a document.
///
/// Candidates are the bodies of "Main Findings" and "Dogs Not Barking". A
/// degraded document offers its implicit section instead.
pub fn classify_document(doc: &ReportDocument) -> Vec<ClassifiedLine> {
    let mut names = vec![SectionName::MainFindings, SectionName::DogsNotBarking];
    if doc.is_degraded() {
        names.push(SectionName::Implicit);
    }
    let mut lines = Vec::new();
    for section in doc.sections() {
        if !names.contains(&section.name) {
            continue;
        }
        for line in &section.lines {
            let position = lines.len();
            let classified = ClassifiedLine::new(line, section.name.clone(), position);
            if !classified.text.is_empty() {
                lines.push(classified);
            }
        }
    }
    lines
}

fn belongs_in_findings(line: &ClassifiedLine) -> bool {
    match line.kind {
        LineKind::CompetitorFact => true,
        LineKind::Other => line.source_section != SectionName::DogsNotBarking,
        LineKind::GapStatement => false,
    }
}

/// Build the bullet assignment for a set of classified lines.
pub fn assign_bullets(lines: &[ClassifiedLine], policy: &DedupPolicy) -> BulletAssignment {
    // Collapse repeats to their first occurrence.
    let mut seen = HashSet::new();
    let unique: Vec<&ClassifiedLine> = lines.iter().filter(|l| seen.insert(l.key())).collect();

    let mut taken: HashSet<usize> = HashSet::new();

    // 1-2. Gap statements fill the gap slots in document order.
    let mut dogs: Vec<ClassifiedLine> = unique
        .iter()
        .filter(|l| l.kind == LineKind::GapStatement)
        .take(policy.gap_slots)
        .map(|l| (*l).clone())
        .collect();
    taken.extend(dogs.iter().map(|l| l.position));

    if dogs.len() < policy.gap_slots {
        let mut padding: Vec<(usize, &ClassifiedLine)> = unique
            .iter()
            .filter(|l| l.kind == LineKind::Other && !taken.contains(&l.position))
            .map(|l| (gap_affinity(&l.text), *l))
            .filter(|(affinity, _)| *affinity > 0)
            .collect();
        padding.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.position.cmp(&b.1.position)));
        for (affinity, line) in padding.into_iter().take(policy.gap_slots - dogs.len()) {
            debug!(affinity, line = %line.text, "padding gaps with gap-adjacent line");
            taken.insert(line.position);
            dogs.push(line.clone());
        }
    }

    // 3. Findings keep facts and generic lines from the findings section, plus
    // facts that were misplaced under the gaps heading.
    let mut findings: Vec<ClassifiedLine> = unique
        .iter()
        .filter(|l| !taken.contains(&l.position) && belongs_in_findings(l))
        .take(policy.findings_cap)
        .map(|l| (*l).clone())
        .collect();

    if findings.len() < policy.findings_floor {
        let in_findings: HashSet<usize> = findings.iter().map(|l| l.position).collect();
        let readmit: Vec<ClassifiedLine> = unique
            .iter()
            .filter(|l| !taken.contains(&l.position) && !in_findings.contains(&l.position))
            .take(policy.findings_floor - findings.len())
            .map(|l| (*l).clone())
            .collect();
        for line in &readmit {
            debug!(line = %line.text, "re-admitting line to meet findings floor");
        }
        findings.extend(readmit);
        findings.sort_by_key(|l| l.position);
    }

    let mut shortfalls = Vec::new();
    if dogs.len() < policy.gap_slots {
        shortfalls.push(FloorShortfall {
            section: Destination::DogsNotBarking,
            required: policy.gap_slots,
            actual: dogs.len(),
        });
    }
    if findings.len() < policy.findings_floor {
        shortfalls.push(FloorShortfall {
            section: Destination::MainFindings,
            required: policy.findings_floor,
            actual: findings.len(),
        });
    }
    for shortfall in &shortfalls {
        warn!(
            section = %shortfall.section,
            required = shortfall.required,
            actual = shortfall.actual,
            "section below floor after exhausting candidates"
        );
    }

    BulletAssignment {
        main_findings: findings,
        dogs_not_barking: dogs,
        shortfalls,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(section: SectionName, raw: &[&str]) -> Vec<ClassifiedLine> {
        raw.iter()
            .enumerate()
            .map(|(i, l)| ClassifiedLine::new(l, section.clone(), i))
            .collect()
    }

    fn texts(lines: &[ClassifiedLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_springfield_scenario() {
        let candidates = lines(
            SectionName::MainFindings,
            &[
                "Few firms offer flat-fee bankruptcy packages",
                "No firms advertise weekend consultations",
                "ClearPath Law (clearpathlaw.com): flat fee $1500",
                "Limited Spanish-language intake in Springfield",
                "Online booking is lacking across local practices",
            ],
        );
        let assignment = assign_bullets(&candidates, &DedupPolicy::default());

        assert_eq!(
            texts(&assignment.dogs_not_barking),
            vec![
                "Few firms offer flat-fee bankruptcy packages",
                "No firms advertise weekend consultations",
                "Limited Spanish-language intake in Springfield",
            ]
        );
        assert_eq!(
            texts(&assignment.main_findings),
            vec![
                "ClearPath Law (clearpathlaw.com): flat fee $1500",
                "Online booking is lacking across local practices",
            ]
        );
        assert_eq!(
            assignment.shortfalls,
            vec![FloorShortfall {
                section: Destination::MainFindings,
                required: 3,
                actual: 2,
            }]
        );
    }

    #[test]
    fn test_dedup_invariant_holds() {
        let mut candidates = lines(
            SectionName::MainFindings,
            &[
                "Few firms offer payment plans",
                "Acme Legal (acme.com): no flat-fee option",
                "Fees average $1400",
                "Fees  AVERAGE $1400",
            ],
        );
        candidates.extend(
            lines(
                SectionName::DogsNotBarking,
                &["few firms offer payment plans", "Nobody offers evening hours"],
            )
            .into_iter()
            .map(|mut l| {
                l.position += 10;
                l
            }),
        );
        let assignment = assign_bullets(&candidates, &DedupPolicy::default());

        let mut keys = HashSet::new();
        for line in assignment
            .main_findings
            .iter()
            .chain(assignment.dogs_not_barking.iter())
        {
            assert!(keys.insert(line.key()), "duplicate: {}", line.text);
        }
    }

    #[test]
    fn test_competitor_fact_never_in_gaps() {
        let candidates = lines(
            SectionName::DogsNotBarking,
            &[
                "Acme Legal (acme.com): no flat-fee option",
                "Few firms offer payment plans",
            ],
        );
        let assignment = assign_bullets(&candidates, &DedupPolicy::default());
        assert_eq!(
            texts(&assignment.dogs_not_barking),
            vec!["Few firms offer payment plans"]
        );
        assert_eq!(
            texts(&assignment.main_findings),
            vec!["Acme Legal (acme.com): no flat-fee option"]
        );
    }

    #[test]
    fn test_two_gaps_stay_two() {
        let candidates = lines(
            SectionName::MainFindings,
            &[
                "Few firms offer flat-fee pricing",
                "Acme Legal (acme.com): $1800 retainer",
                "Limited evening availability",
                "Beta Law: free consultations",
                "Gamma Partners (gamma.law): 4.8 star rating",
            ],
        );
        let assignment = assign_bullets(&candidates, &DedupPolicy::default());
        assert_eq!(
            texts(&assignment.dogs_not_barking),
            vec!["Few firms offer flat-fee pricing", "Limited evening availability"]
        );
        assert_eq!(assignment.main_findings.len(), 3);
        assert!(assignment
            .shortfalls
            .iter()
            .any(|s| s.section == Destination::DogsNotBarking && s.actual == 2));
    }

    #[test]
    fn test_pads_gaps_with_gap_adjacent_lines() {
        let candidates = lines(
            SectionName::MainFindings,
            &[
                "Few firms offer flat-fee pricing",
                "Average fees are $1400",
                "Demand for evening hours is an untested opportunity",
                "Acme Legal: no weekend hours",
                "Courts are backlogged",
            ],
        );
        let assignment = assign_bullets(&candidates, &DedupPolicy::default());
        assert_eq!(
            texts(&assignment.dogs_not_barking),
            vec![
                "Few firms offer flat-fee pricing",
                "Demand for evening hours is an untested opportunity",
            ]
        );
        assert!(!texts(&assignment.main_findings)
            .contains(&"Demand for evening hours is an untested opportunity"));
    }

    #[test]
    fn test_extra_gap_lines_readmitted_only_below_floor() {
        let candidates = lines(
            SectionName::MainFindings,
            &[
                "Few firms offer A",
                "Few firms offer B",
                "Few firms offer C",
                "Few firms offer D",
                "Acme: fact one",
                "Beta: fact two",
                "Fees average $1400",
            ],
        );
        let assignment = assign_bullets(&candidates, &DedupPolicy::default());
        assert_eq!(assignment.dogs_not_barking.len(), 3);
        assert_eq!(
            texts(&assignment.main_findings),
            vec!["Acme: fact one", "Beta: fact two", "Fees average $1400"]
        );
        assert!(assignment.shortfalls.is_empty());
    }

    #[test]
    fn test_empty_input_reports_shortfalls() {
        let assignment = assign_bullets(&[], &DedupPolicy::default());
        assert!(assignment.is_empty());
        assert_eq!(assignment.shortfalls.len(), 2);
    }

    #[test]
    fn test_findings_cap() {
        let raw: Vec<String> = (0..15).map(|i| format!("Fee data point {}", i)).collect();
        let raw_refs: Vec<&str> = raw.iter().map(String::as_str).collect();
        let candidates = lines(SectionName::MainFindings, &raw_refs);
        let assignment = assign_bullets(&candidates, &DedupPolicy::default());
        assert_eq!(assignment.main_findings.len(), 10);
    }

    #[test]
    fn test_classify_document_uses_findings_and_gaps_sections() {
        let doc = ReportDocument::parse(
            "## Executive Summary\n- Few firms here too\n## Main Findings\n- Fees average $1400\n## Dogs Not Barking\n- Nobody offers payment plans",
        );
        let lines = classify_document(&doc);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].source_section, SectionName::MainFindings);
        assert_eq!(lines[1].kind, LineKind::GapStatement);
        assert_eq!(lines[1].position, 1);
    }

    #[test]
    fn test_classify_degraded_document_uses_body() {
        let doc = ReportDocument::parse("Few firms offer X\nFees average $1400");
        let lines = classify_document(&doc);
        assert_eq!(lines.len(), 2);
    }
}
