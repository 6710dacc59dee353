//! `smb-brief`: research a local market and email the decision brief.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use tracing::warn;

use smb_briefs::telemetry::init_tracing;
use smb_briefs::{
    AgentResearchProvider, BrandConfig, BriefRequest, BriefTemplate, DeliveryStatus, ExaSearch,
    OpenAiClient, Orchestrator, ProgressEvent, SendGridDelivery, Settings,
};

/// Generate an SMB decision brief.
#[derive(Debug, Parser)]
#[command(name = "smb-brief", version, after_long_help = USAGE_HELP)]
struct Cli {
    /// What the business does, e.g. "bankruptcy attorney".
    topic: String,

    /// Market the brief covers, e.g. "Springfield, IL".
    #[arg(long, default_value = "")]
    location: String,

    /// Business the brief is prepared for.
    #[arg(long)]
    business: Option<String>,

    /// Brief template: competitor-snapshot, local-seo-audit or grant-opportunities.
    #[arg(long, default_value = "competitor-snapshot")]
    template: BriefTemplate,

    /// Email the brief to this address (needs SENDGRID_API_KEY and BRIEF_FROM_EMAIL).
    #[arg(long)]
    to: Option<String>,

    /// Brand JSON file for the email chrome.
    #[arg(long)]
    brand: Option<PathBuf>,

    /// Write the rendered HTML here.
    #[arg(long)]
    html_out: Option<PathBuf>,

    /// Log agent iterations and model responses.
    #[arg(long, short)]
    verbose: bool,
}

const USAGE_HELP: &str = r#"Environment:
  OPENAI_API_KEY     required
  LLM_BASE_URL       OpenAI-compatible API root
  BRIEF_MODEL        defaults to gpt-4o-mini
  EXA_API_KEY        enables web search
  SENDGRID_API_KEY   enables --to
  BRIEF_FROM_EMAIL   sender address for --to

Example:
  smb-brief "bankruptcy attorney" --location Springfield --business "Smith Law" \
    --to owner@smithlaw.com --html-out brief.html"#;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(if cli.verbose { "debug" } else { "info" });

    let settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e}");
            process::exit(2);
        }
    };

    let brand = match &cli.brand {
        Some(path) => match BrandConfig::from_json_file(path) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("Failed to load brand {}: {e}", path.display());
                process::exit(2);
            }
        },
        None => cli
            .business
            .as_deref()
            .map(BrandConfig::new)
            .unwrap_or_default(),
    };

    let model = Arc::new(OpenAiClient::new(&settings.llm_api_key).base_url(&settings.llm_base_url));
    let mut provider = AgentResearchProvider::new(model, &settings.model).verbose(cli.verbose);
    match &settings.search_api_key {
        Some(key) => provider = provider.web_search(ExaSearch::new(key)),
        None => warn!("EXA_API_KEY not set; searches will rely on model knowledge"),
    }

    let mut orchestrator = Orchestrator::new(Arc::new(provider), brand);
    match (&settings.sendgrid_api_key, &settings.from_email) {
        (Some(key), Some(from)) => {
            orchestrator = orchestrator.delivery(Arc::new(SendGridDelivery::new(key, from)));
        }
        _ if cli.to.is_some() => {
            eprintln!("--to needs SENDGRID_API_KEY and BRIEF_FROM_EMAIL");
            process::exit(2);
        }
        _ => {}
    }

    let mut request = BriefRequest::new(cli.topic, cli.location).template(cli.template);
    if let Some(business) = cli.business {
        request = request.business(business);
    }
    if let Some(to) = cli.to {
        request = request.recipient(to);
    }

    let mut events = Box::pin(orchestrator.run(request));
    while let Some(event) = events.next().await {
        println!("{}", event.message());
        match event {
            ProgressEvent::Done { outcome, .. } => {
                if let (Some(path), Some(email)) = (&cli.html_out, &outcome.email) {
                    if let Err(e) = std::fs::write(path, &email.html) {
                        eprintln!("Failed to write {}: {e}", path.display());
                        process::exit(1);
                    }
                }
                if outcome.email.is_none() {
                    println!("\n{}", outcome.report);
                }
                if matches!(outcome.delivery, DeliveryStatus::SendFailed { .. }) {
                    process::exit(1);
                }
            }
            ProgressEvent::Failed { .. } => process::exit(1),
            ProgressEvent::Entered { .. } => {}
        }
    }
}
