//! Prompt text for the research agents.

/// Number of searches the planner is asked for.
pub const HOW_MANY_SEARCHES: usize = 5;

/// Rules shared by every agent.
pub const GLOBAL_HARDENING: &str = "No chain-of-thought. Obey required structure and length exactly. \
If inputs are incomplete, produce best-effort but label unknowns. \
Do not invent facts or sources. US English. Use relative days (14, 30, 60, 90) not dates.";

/// Shape of one action-board line.
pub const ACTION_LINE_SPEC: &str = "[Owner optional] Action — KPI: <metric> Target: +X% in <14/30/60/90> days \
(Effort: L/M/H; Impact: L/M/H)";

pub const EXAMPLE_ACTION: &str =
    "Ops Add Saturday service block — KPI: jobs/day Target: +20% in 14 days (Effort: M; Impact: M)";

/// Default system description
pub const DEFAULT_SYSTEM: &str = "You are a careful research assistant for small businesses.";

/// System prompt template. `{system}` is replaced with the agent's description.
pub const SYSTEM_PROMPT_TEMPLATE: &str = r#"{system}

<rules>
{hardening}
</rules>

<format>
Return your final answer inside a <finish> block. Use JSON when a JSON shape
is requested, otherwise plain markdown:

<finish>
{"key": "value", "items": [1, 2, 3]}
</finish>
</format>
"#;

/// Planner agent description.
pub fn planner_system() -> String {
    format!(
        "You are a helpful research assistant. Given a query, come up with a set of web searches \
to perform to best answer the query. Output {} searches as JSON: \
{{\"searches\": [{{\"query\": \"...\", \"reason\": \"...\"}}]}}.",
        HOW_MANY_SEARCHES
    )
}

/// Search summarizer description.
pub const SEARCH_SYSTEM: &str = "You are a research assistant. Given a search term and raw search results, \
produce a concise summary of the results. The summary must be 2-3 paragraphs and less than 300 words. \
Capture the main points, name competitors with their website in parentheses, and keep source URLs. \
Write succinctly; this will be consumed by someone synthesizing a report. \
Do not include any commentary other than the summary itself.";

/// Writer agent description.
pub fn writer_system() -> String {
    format!(
        "You are a senior small-business analyst writing a decision brief in markdown. \
Use exactly these headings: \
'## Executive Summary' (3-5 bullets of context, never a copy of the actions), \
'## Action Board' (5 lines, each formatted as: {}; for example: {}), \
'## Main Findings' (6-10 bullets; attribute competitor facts as 'Firm Name (domain): claim'), \
'## Dogs Not Barking' (3 bullets naming things no local competitor offers), \
'## Sources' (one URL per line followed by ' - ' and a short description).",
        ACTION_LINE_SPEC, EXAMPLE_ACTION
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::parse_action_line;

    #[test]
    fn test_example_action_parses() {
        let action = parse_action_line(EXAMPLE_ACTION).unwrap();
        assert_eq!(action.target_days, 14);
    }

    #[test]
    fn test_writer_system_names_every_heading() {
        let system = writer_system();
        for heading in [
            "Executive Summary",
            "Action Board",
            "Main Findings",
            "Dogs Not Barking",
            "Sources",
        ] {
            assert!(system.contains(heading), "{}", heading);
        }
    }

    #[test]
    fn test_planner_system_asks_for_json() {
        assert!(planner_system().contains("\"searches\""));
    }
}
