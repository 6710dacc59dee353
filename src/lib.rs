//! SMB Briefs - research-to-email decision briefs for small businesses
//!
//! A brief is produced in stages: an LLM planner picks web searches, a search
//! agent summarizes each one, a writer agent drafts a sectioned report, and
//! the report is turned into a branded email with an executive summary,
//! action board, findings, market gaps and sources.
//!
//! # Quick Start
//!
//! ```ignore
//! use futures::StreamExt;
//! use smb_briefs::{
//!     AgentResearchProvider, BrandConfig, BriefRequest, OpenAiClient, Orchestrator,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let model = Arc::new(OpenAiClient::new(std::env::var("OPENAI_API_KEY").unwrap()));
//!     let provider = Arc::new(AgentResearchProvider::new(model, "gpt-4o-mini"));
//!     let orchestrator = Orchestrator::new(provider, BrandConfig::new("Smith Law"));
//!
//!     let request = BriefRequest::new("bankruptcy attorney", "Springfield").business("Smith Law");
//!     let mut events = Box::pin(orchestrator.run(request));
//!     while let Some(event) = events.next().await {
//!         println!("{}", event.message());
//!     }
//! }
//! ```

pub mod agent;
pub mod config;
pub mod email;
mod error;
pub mod pipeline;
pub mod report;
pub mod telemetry;
pub mod templates;

pub use agent::{Agent, AgentConfig, ChatModel, OpenAiClient};
pub use config::Settings;
pub use email::{BrandConfig, Delivery, RenderedEmail, SendGridDelivery};
pub use error::{Error, RenderError, Result};
pub use pipeline::{
    AgentResearchProvider, BriefOutcome, BriefRequest, DeliveryStatus, ExaSearch, Orchestrator,
    OrchestratorConfig, ProgressEvent, ResearchProvider, Stage,
};
pub use templates::BriefTemplate;
