//! Email renderer.

use super::template::{escape_html, inline_markdown, render_template, validate_href, TemplateValue, Vars};
use super::{BrandConfig, RenderedEmail};
use crate::error::RenderError;
use crate::report::{ActionItem, BriefContext, BulletAssignment, ClassifiedLine, Narrative, SourceEntry};

/// HTML layout of a brief email.
pub const EMAIL_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{{subject}}</title></head>
<body style="margin:0;padding:0;background:#f4f5f7;font-family:Helvetica,Arial,sans-serif;color:#222;">
<table width="100%" cellpadding="0" cellspacing="0"><tr><td align="center">
<table width="640" cellpadding="0" cellspacing="0" style="background:#ffffff;">
<tr><td style="background:{{primary_color}};padding:24px;color:#ffffff;">
{{#logo_url}}<img src="{{logo_url}}" alt="{{brand_name}}" height="40" style="display:block;margin-bottom:12px;">{{/logo_url}}
<div style="font-size:13px;letter-spacing:1px;text-transform:uppercase;">{{brand_name}}</div>
<h1 style="margin:8px 0 0;font-size:22px;">{{headline}}</h1>
{{#tagline}}<div style="font-size:14px;opacity:0.85;">{{tagline}}</div>{{/tagline}}
</td></tr>
<tr><td style="padding:24px;">
<h2 style="color:{{primary_color}};font-size:18px;">Executive Summary</h2>
{{summary_html}}
{{#actions_html}}<h2 style="color:{{primary_color}};font-size:18px;border-top:3px solid {{accent_color}};padding-top:16px;">Action Board</h2>
{{actions_html}}{{/actions_html}}
<h2 style="color:{{primary_color}};font-size:18px;">Main Findings</h2>
{{findings_html}}
{{#gaps_html}}<h2 style="color:{{primary_color}};font-size:18px;">Dogs Not Barking</h2>
<p style="font-size:13px;color:#666;">What nobody nearby is doing yet.</p>
{{gaps_html}}{{/gaps_html}}
{{#sources_html}}<h2 style="color:{{primary_color}};font-size:18px;">Sources</h2>
{{sources_html}}{{/sources_html}}
</td></tr>
<tr><td style="background:#f0f0f0;padding:16px 24px;font-size:12px;color:#555;">
{{brand_name}}
{{#website_url}} &middot; <a href="{{website_url}}" style="color:{{primary_color}};">Website</a>{{/website_url}}
{{#linkedin_url}} &middot; <a href="{{linkedin_url}}" style="color:{{primary_color}};">LinkedIn</a>{{/linkedin_url}}
{{#twitter_url}} &middot; <a href="{{twitter_url}}" style="color:{{primary_color}};">X / Twitter</a>{{/twitter_url}}
{{#contact_href}} &middot; <a href="{{contact_href}}" style="color:{{primary_color}};">{{contact_email}}</a>{{/contact_href}}
</td></tr>
</table>
</td></tr></table>
</body>
</html>
"#;

/// Everything the renderer needs from one run.
#[derive(Debug, Clone, Copy)]
pub struct EmailContent<'a> {
    pub subject: &'a str,
    pub context: &'a BriefContext,
    pub narrative: &'a Narrative,
    pub assignment: &'a BulletAssignment,
    pub actions: &'a [ActionItem],
    pub sources: &'a [SourceEntry],
}

fn headline(context: &BriefContext) -> String {
    if context.location.trim().is_empty() {
        context.topic.trim().to_string()
    } else {
        format!("{} in {}", context.topic.trim(), context.location.trim())
    }
}

fn bullet_list(lines: &[ClassifiedLine]) -> String {
    let items: String = lines
        .iter()
        .map(|l| format!("<li style=\"margin-bottom:6px;\">{}</li>", inline_markdown(&l.text)))
        .collect();
    format!("<ul style=\"padding-left:20px;\">{}</ul>", items)
}

fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}) {}", i + 1, escape_html(s)))
        .collect::<Vec<_>>()
        .join(" &nbsp; ")
}

fn action_rows(actions: &[ActionItem], accent: &str) -> String {
    let rows: String = actions
        .iter()
        .map(|a| {
            let mut cell = format!(
                "<strong>{}</strong><br><span style=\"font-size:13px;color:#444;\">KPI: {} &middot; Target: {} in {} days &middot; Effort {} / Impact {}</span>",
                escape_html(&a.title),
                escape_html(&a.kpi),
                escape_html(&a.target_percent),
                a.target_days,
                a.effort,
                a.impact
            );
            if !a.how_steps.is_empty() {
                cell.push_str(&format!(
                    "<br><span style=\"font-size:12px;\">How: {}</span>",
                    numbered(&a.how_steps)
                ));
            }
            if !a.tools.is_empty() {
                cell.push_str(&format!(
                    "<br><span style=\"font-size:12px;\">Tools: {}</span>",
                    numbered(&a.tools)
                ));
            }
            format!(
                "<tr><td style=\"padding:10px 12px;border-left:4px solid {};\">{}</td></tr>",
                escape_html(accent),
                cell
            )
        })
        .collect();
    format!(
        "<table width=\"100%\" cellpadding=\"0\" cellspacing=\"6\">{}</table>",
        rows
    )
}

fn source_list(sources: &[SourceEntry]) -> String {
    let items: String = sources
        .iter()
        .map(|s| {
            let text = escape_html(s.label.as_deref().unwrap_or(&s.url));
            match validate_href(&s.href()) {
                Ok(href) => format!("<li><a href=\"{}\">{}</a></li>", href, text),
                Err(_) => format!("<li>{}</li>", text),
            }
        })
        .collect();
    format!("<ol style=\"padding-left:20px;font-size:13px;\">{}</ol>", items)
}

fn strip_markdown(text: &str) -> String {
    text.replace("**", "")
}

fn plain_text(content: &EmailContent<'_>, brand: &BrandConfig) -> String {
    let mut out = vec![content.subject.to_string(), String::new()];

    out.push("EXECUTIVE SUMMARY".to_string());
    for paragraph in &content.narrative.paragraphs {
        out.push(strip_markdown(paragraph));
        out.push(String::new());
    }

    if !content.actions.is_empty() {
        out.push("ACTION BOARD".to_string());
        for (i, action) in content.actions.iter().enumerate() {
            out.push(format!("{}. {}", i + 1, action.to_line()));
        }
        out.push(String::new());
    }

    let mut bullets = |title: &str, lines: &[ClassifiedLine]| {
        if lines.is_empty() {
            return;
        }
        out.push(title.to_string());
        for line in lines {
            out.push(format!("- {}", strip_markdown(&line.text)));
        }
        out.push(String::new());
    };
    bullets("MAIN FINDINGS", &content.assignment.main_findings);
    bullets("DOGS NOT BARKING", &content.assignment.dogs_not_barking);

    if !content.sources.is_empty() {
        out.push("SOURCES".to_string());
        for source in content.sources {
            match &source.label {
                Some(label) => out.push(format!("- {} - {}", source.url, label)),
                None => out.push(format!("- {}", source.url)),
            }
        }
        out.push(String::new());
    }

    out.push("--".to_string());
    match &brand.website_url {
        Some(site) => out.push(format!("{} | {}", brand.name, site)),
        None => out.push(brand.name.clone()),
    }
    out.join("\n")
}

fn optional(vars: &mut Vars, key: &'static str, value: &Option<String>, make: fn(String) -> TemplateValue) {
    if let Some(v) = value.as_ref().filter(|v| !v.trim().is_empty()) {
        vars.insert(key, make(v.trim().to_string()));
    }
}

/// Render a brief into a branded HTML email plus a plain-text fallback.
pub fn render_email(
    content: &EmailContent<'_>,
    brand: &BrandConfig,
) -> Result<RenderedEmail, RenderError> {
    brand.validate()?;

    let mut vars = Vars::new();
    vars.insert("subject", TemplateValue::Text(content.subject.to_string()));
    vars.insert("brand_name", TemplateValue::Text(brand.name.trim().to_string()));
    vars.insert("primary_color", TemplateValue::Text(brand.primary_color.trim().to_string()));
    vars.insert("accent_color", TemplateValue::Text(brand.accent_color.trim().to_string()));
    vars.insert("headline", TemplateValue::Text(headline(content.context)));

    optional(&mut vars, "tagline", &brand.tagline, TemplateValue::Text);
    optional(&mut vars, "logo_url", &brand.logo_url, TemplateValue::Href);
    optional(&mut vars, "website_url", &brand.website_url, TemplateValue::Href);
    optional(&mut vars, "linkedin_url", &brand.linkedin_url, TemplateValue::Href);
    optional(&mut vars, "twitter_url", &brand.twitter_url, TemplateValue::Href);
    if let Some(email) = brand.contact_email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        vars.insert("contact_href", TemplateValue::Href(format!("mailto:{}", email)));
        vars.insert("contact_email", TemplateValue::Text(email.to_string()));
    }

    let summary: String = content
        .narrative
        .paragraphs
        .iter()
        .map(|p| format!("<p style=\"line-height:1.5;\">{}</p>", inline_markdown(p)))
        .collect();
    vars.insert("summary_html", TemplateValue::Html(summary));

    if !content.actions.is_empty() {
        vars.insert(
            "actions_html",
            TemplateValue::Html(action_rows(content.actions, brand.accent_color.trim())),
        );
    }

    let findings = if content.assignment.main_findings.is_empty() {
        "<p><em>No findings were reported.</em></p>".to_string()
    } else {
        bullet_list(&content.assignment.main_findings)
    };
    vars.insert("findings_html", TemplateValue::Html(findings));

    if !content.assignment.dogs_not_barking.is_empty() {
        vars.insert(
            "gaps_html",
            TemplateValue::Html(bullet_list(&content.assignment.dogs_not_barking)),
        );
    }
    if !content.sources.is_empty() {
        vars.insert("sources_html", TemplateValue::Html(source_list(content.sources)));
    }

    let html = render_template(EMAIL_TEMPLATE, &vars)?;
    Ok(RenderedEmail {
        subject: content.subject.to_string(),
        html,
        plain_text_fallback: Some(plain_text(content, brand)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{
        assign_bullets, classify_document, extract_sources, parse_actions, DedupPolicy,
        ReportDocument, SummarySource,
    };

    const REPORT: &str = "## Action Board
- Launch flat-fee page — KPI: consult bookings Target: +20% in 14 days (Effort: L; Impact: H) | HOW: 1) Draft | 2) Publish | 3) Promote | TOOLS: 1) WordPress 2) Wix 3) Canva
## Main Findings
- **ClearPath Law** (clearpathlaw.com): flat fee <$1500>
## Dogs Not Barking
- No firms offer weekend hours
## Sources
- https://www.uscourts.gov/stats - Court statistics
";

    struct Fixture {
        context: BriefContext,
        narrative: Narrative,
        assignment: BulletAssignment,
        actions: Vec<ActionItem>,
        sources: Vec<SourceEntry>,
    }

    fn fixture() -> Fixture {
        let doc = ReportDocument::parse(REPORT);
        Fixture {
            context: BriefContext::new("bankruptcy attorney", "Springfield"),
            narrative: Narrative {
                paragraphs: vec!["Demand is **rising**.".to_string(), "Second paragraph.".to_string()],
                source: SummarySource::Synthesized,
            },
            assignment: assign_bullets(&classify_document(&doc), &DedupPolicy::default()),
            actions: parse_actions(&doc),
            sources: extract_sources(&doc),
        }
    }

    fn content(f: &Fixture) -> EmailContent<'_> {
        EmailContent {
            subject: "Competitor Snapshot Brief: Smith Law – Springfield",
            context: &f.context,
            narrative: &f.narrative,
            assignment: &f.assignment,
            actions: &f.actions,
            sources: &f.sources,
        }
    }

    #[test]
    fn test_render_email_sections_and_escaping() {
        let f = fixture();
        let brand = BrandConfig::new("Smith & Co").website("https://smith.example.com");
        let email = render_email(&content(&f), &brand).unwrap();

        assert_eq!(email.subject, "Competitor Snapshot Brief: Smith Law – Springfield");
        assert!(email.html.contains("Smith &amp; Co"));
        assert!(email.html.contains("bankruptcy attorney in Springfield"));
        assert!(email.html.contains("Demand is <strong>rising</strong>."));
        assert!(email.html.contains("<strong>ClearPath Law</strong> (clearpathlaw.com): flat fee &lt;$1500&gt;"));
        assert!(email.html.contains("Launch flat-fee page"));
        assert!(email.html.contains("1) Draft &nbsp; 2) Publish &nbsp; 3) Promote"));
        assert!(email.html.contains("<a href=\"https://clearpathlaw.com\">clearpathlaw.com</a>"));
        assert!(email.html.contains("<a href=\"https://www.uscourts.gov/stats\">Court statistics</a>"));
        assert!(email.html.contains("<a href=\"https://smith.example.com\""));
        assert!(email.html.contains("Dogs Not Barking"));
        assert!(!email.html.contains("{{"));
    }

    #[test]
    fn test_absent_optional_links_are_omitted() {
        let f = fixture();
        let email = render_email(&content(&f), &BrandConfig::new("Smith Law")).unwrap();
        assert!(!email.html.contains("LinkedIn"));
        assert!(!email.html.contains("Website"));
        assert!(!email.html.contains("mailto:"));

        let brand = BrandConfig::new("Smith Law").linkedin("https://linkedin.com/company/smith");
        let email = render_email(&content(&f), &brand).unwrap();
        assert!(email.html.contains("<a href=\"https://linkedin.com/company/smith\""));
    }

    #[test]
    fn test_empty_sections() {
        let f = fixture();
        let empty = BulletAssignment::default();
        let email = render_email(
            &EmailContent {
                assignment: &empty,
                actions: &[],
                sources: &[],
                ..content(&f)
            },
            &BrandConfig::new("Smith Law"),
        )
        .unwrap();
        assert!(email.html.contains("No findings were reported."));
        assert!(!email.html.contains("Dogs Not Barking"));
        assert!(!email.html.contains("Action Board"));
        assert!(!email.html.contains(">Sources<"));
    }

    #[test]
    fn test_render_errors() {
        let f = fixture();
        assert_eq!(
            render_email(&content(&f), &BrandConfig::new("")).unwrap_err(),
            RenderError::MissingBrandField("name")
        );
        let bad_link = BrandConfig::new("Smith Law").twitter("x.com/smith");
        assert_eq!(
            render_email(&content(&f), &bad_link).unwrap_err(),
            RenderError::InvalidUrl("x.com/smith".to_string())
        );
    }

    #[test]
    fn test_plain_text_fallback() {
        let f = fixture();
        let email = render_email(&content(&f), &BrandConfig::new("Smith Law")).unwrap();
        let text = email.plain_text_fallback.unwrap();
        assert!(text.starts_with("Competitor Snapshot Brief: Smith Law – Springfield\n\nEXECUTIVE SUMMARY\nDemand is rising."));
        assert!(text.contains("ACTION BOARD\n1. Launch flat-fee page — KPI: consult bookings"));
        assert!(text.contains("DOGS NOT BARKING\n- No firms offer weekend hours"));
        assert!(text.contains("- https://www.uscourts.gov/stats - Court statistics"));
        assert!(text.ends_with("--\nSmith Law"));
    }
}
