//! Report-to-brief transformation engine.
//!
//! A raw writer report flows through these steps, each deriving a new view of
//! the immutable [`ReportDocument`]:
//!
//! 1. [`ReportDocument::parse`] splits the text into named sections
//! 2. [`classify`] labels every candidate line
//! 3. [`assign_bullets`] places each line in exactly one destination
//! 4. [`extract_sources`] scans the whole document for citations
//! 5. [`synthesize`] builds the executive narrative
//!
//! The email renderer in [`crate::email`] consumes the results.

mod actions;
mod classify;
mod dedup;
mod narrative;
mod sections;
mod sources;
mod structured;

pub use actions::{parse_action_line, parse_actions, ActionItem, Level};
pub use classify::{classify, gap_affinity, LineKind};
pub use dedup::{
    assign_bullets, classify_document, BulletAssignment, ClassifiedLine, DedupPolicy,
    Destination, FloorShortfall,
};
pub use narrative::{
    choose_summary, is_near_duplicate, synthesize, BriefContext, Narrative, NarrativeConfig,
    SummarySource,
};
pub use sections::{bullet_text, normalize_key, ReportDocument, Section, SectionName};
pub use sources::{extract_sources, SourceEntry};
pub use structured::{
    normalize_writer_output, repair_fill, StructuredReport, StructuredSource,
};
