//! Staged brief pipeline.
//!
//! [`Orchestrator::run`] drives `Planning → Searching → Writing → Sending →
//! Done` and reports progress as a lazy stream. Any stage error or timeout
//! ends the stream with a single [`ProgressEvent::Failed`]. Dropping the
//! stream abandons the run; nothing is delivered unless the stream is polled
//! past the `Sending` event.

mod providers;

pub use providers::{AgentResearchProvider, ExaSearch, ResearchProvider, SearchItem, SearchPlan};

use async_stream::stream;
use futures::future::join_all;
use futures::{pin_mut, Stream, StreamExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::email::{render_email, BrandConfig, Delivery, DeliveryReceipt, EmailContent, RenderedEmail};
use crate::error::{Error, RenderError, Result};
use crate::report::{
    assign_bullets, choose_summary, classify_document, extract_sources, normalize_writer_output,
    parse_actions, ActionItem, BriefContext, BulletAssignment, DedupPolicy, FloorShortfall,
    Narrative, NarrativeConfig, ReportDocument, SourceEntry,
};
use crate::templates::BriefTemplate;

/// Pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Planning,
    Searching,
    Writing,
    Sending,
    Done,
    Failed,
}

impl Stage {
    /// `Done` and `Failed` end a run.
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    /// Whether a run may move from `self` to `next`.
    pub fn can_transition_to(self, next: Stage) -> bool {
        match (self, next) {
            (from, Stage::Failed) => !from.is_terminal(),
            (Stage::Planning, Stage::Searching)
            | (Stage::Searching, Stage::Writing)
            | (Stage::Writing, Stage::Sending)
            | (Stage::Sending, Stage::Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Planning => "Planning",
            Stage::Searching => "Searching",
            Stage::Writing => "Writing",
            Stage::Sending => "Sending",
            Stage::Done => "Done",
            Stage::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// What to research and where to send it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BriefRequest {
    pub topic: String,
    pub location: String,
    pub business: Option<String>,
    pub template: BriefTemplate,
    pub recipient: Option<String>,
}

impl BriefRequest {
    pub fn new(topic: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            location: location.into(),
            business: None,
            template: BriefTemplate::default(),
            recipient: None,
        }
    }

    pub fn business(mut self, business: impl Into<String>) -> Self {
        self.business = Some(business.into());
        self
    }

    pub fn template(mut self, template: BriefTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    /// The business the brief is for, or the topic when none was given.
    pub fn business_name(&self) -> &str {
        self.business
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or(&self.topic)
    }

    /// Research query handed to the planner.
    pub fn query(&self) -> String {
        if self.location.trim().is_empty() {
            format!("{}: {}", self.template, self.topic)
        } else {
            format!("{}: {} in {}", self.template, self.topic, self.location)
        }
    }

    pub fn context(&self) -> BriefContext {
        BriefContext {
            topic: self.topic.clone(),
            location: self.location.clone(),
            business: self.business.clone(),
        }
    }

    pub fn subject(&self) -> String {
        self.template.subject(self.business_name(), &self.location)
    }
}

/// Per-run state, owned and mutated by the orchestrator only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BriefState {
    stage: Stage,
    partial_report: String,
    last_message: String,
}

impl BriefState {
    fn new() -> Self {
        Self {
            stage: Stage::Planning,
            partial_report: String::new(),
            last_message: String::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn partial_report(&self) -> &str {
        &self.partial_report
    }

    pub fn last_message(&self) -> &str {
        &self.last_message
    }

    fn enter(&mut self, stage: Stage, message: impl Into<String>) -> ProgressEvent {
        debug_assert!(
            stage == Stage::Planning || self.stage.can_transition_to(stage),
            "invalid transition {} -> {}",
            self.stage,
            stage
        );
        self.stage = stage;
        self.last_message = message.into();
        info!(stage = %stage, "{}", self.last_message);
        ProgressEvent::Entered {
            stage,
            message: self.last_message.clone(),
        }
    }

    fn fail(&mut self, error: Error) -> ProgressEvent {
        let stage = match &error {
            Error::Stage { stage, .. } => *stage,
            _ => self.stage,
        };
        self.last_message = error.to_string();
        self.stage = Stage::Failed;
        warn!(stage = %stage, "{}", self.last_message);
        ProgressEvent::Failed {
            stage,
            message: self.last_message.clone(),
        }
    }

    fn finish(&mut self, message: impl Into<String>, outcome: BriefOutcome) -> ProgressEvent {
        self.stage = Stage::Done;
        self.last_message = message.into();
        info!("{}", self.last_message);
        ProgressEvent::Done {
            message: self.last_message.clone(),
            outcome: Box::new(outcome),
        }
    }
}

/// How the final email fared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent(DeliveryReceipt),
    /// No recipient or no delivery collaborator
    Skipped { reason: String },
    /// The delivery collaborator reported an error
    SendFailed { reason: String },
    RenderFailed(RenderError),
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct BriefOutcome {
    /// The normalized writer report
    pub report: String,
    pub degraded: bool,
    pub assignment: BulletAssignment,
    pub actions: Vec<ActionItem>,
    pub sources: Vec<SourceEntry>,
    pub narrative: Narrative,
    pub email: Option<RenderedEmail>,
    pub delivery: DeliveryStatus,
}

impl BriefOutcome {
    pub fn shortfalls(&self) -> &[FloorShortfall] {
        &self.assignment.shortfalls
    }
}

/// A progress update, in emission order.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A stage is about to start
    Entered { stage: Stage, message: String },
    /// Terminal success
    Done {
        message: String,
        outcome: Box<BriefOutcome>,
    },
    /// Terminal failure; `stage` is the stage that failed
    Failed { stage: Stage, message: String },
}

impl ProgressEvent {
    /// The state the run is in after this event.
    pub fn stage(&self) -> Stage {
        match self {
            ProgressEvent::Entered { stage, .. } => *stage,
            ProgressEvent::Done { .. } => Stage::Done,
            ProgressEvent::Failed { .. } => Stage::Failed,
        }
    }

    /// Human-readable progress text.
    pub fn message(&self) -> &str {
        match self {
            ProgressEvent::Entered { message, .. }
            | ProgressEvent::Done { message, .. }
            | ProgressEvent::Failed { message, .. } => message,
        }
    }
}

/// Orchestrator tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrchestratorConfig {
    /// Limit applied to planning, searching and writing separately.
    /// Delivery is never cut short.
    pub stage_timeout: Option<Duration>,
    pub dedup: DedupPolicy,
    pub narrative: NarrativeConfig,
}

impl OrchestratorConfig {
    pub fn stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    pub fn dedup(mut self, policy: DedupPolicy) -> Self {
        self.dedup = policy;
        self
    }

    pub fn narrative(mut self, config: NarrativeConfig) -> Self {
        self.narrative = config;
        self
    }
}

/// Run `work` as `stage`, mapping errors and timeouts to a stage failure.
async fn run_stage<T, F>(stage: Stage, timeout: Option<Duration>, work: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, work)
            .await
            .map_err(|_| Error::Stage {
                stage,
                message: format!("timed out after {:?}", limit),
            })?,
        None => work.await,
    };
    result.map_err(|e| match e {
        Error::Stage { .. } => e,
        other => Error::Stage {
            stage,
            message: other.to_string(),
        },
    })
}

/// Run every search concurrently; keep the ones that succeed.
async fn search_all(provider: &dyn ResearchProvider, plan: &SearchPlan) -> Result<Vec<String>> {
    let outcomes = join_all(plan.searches.iter().map(|item| provider.search(item))).await;
    let total = outcomes.len();
    let mut results = Vec::with_capacity(total);
    let mut first_error = None;
    for (item, outcome) in plan.searches.iter().zip(outcomes) {
        match outcome {
            Ok(text) if !text.trim().is_empty() => results.push(text),
            Ok(_) => warn!(query = %item.query, "search returned nothing; skipping"),
            Err(e) => {
                warn!(query = %item.query, error = %e, "search failed; skipping");
                first_error.get_or_insert(e);
            }
        }
    }
    info!("searching... {}/{} completed", results.len(), total);
    if results.is_empty() {
        let cause = first_error.map(|e| e.to_string()).unwrap_or_else(|| "no results".to_string());
        return Err(Error::Stage {
            stage: Stage::Searching,
            message: format!("all {} searches failed ({})", total, cause),
        });
    }
    Ok(results)
}

/// Turn a raw report into the pieces the email is built from.
fn build_brief(
    report: String,
    request: &BriefRequest,
    config: &OrchestratorConfig,
) -> (ReportDocument, BulletAssignment, Vec<ActionItem>, Vec<SourceEntry>, Narrative) {
    let doc = ReportDocument::parse(report);
    let assignment = assign_bullets(&classify_document(&doc), &config.dedup);
    let actions = parse_actions(&doc);
    let sources = extract_sources(&doc);
    let narrative = choose_summary(
        &doc,
        &assignment,
        &request.context(),
        &actions,
        &sources,
        &config.narrative,
    );
    (doc, assignment, actions, sources, narrative)
}

/// Drives a brief from plan to delivery.
pub struct Orchestrator {
    provider: Arc<dyn ResearchProvider>,
    delivery: Option<Arc<dyn Delivery>>,
    brand: BrandConfig,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn ResearchProvider>, brand: BrandConfig) -> Self {
        Self {
            provider,
            delivery: None,
            brand,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn delivery(mut self, delivery: Arc<dyn Delivery>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Start a run. Nothing happens until the stream is polled.
    pub fn run(&self, request: BriefRequest) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        let provider = self.provider.clone();
        let delivery = self.delivery.clone();
        let brand = self.brand.clone();
        let config = self.config;

        stream! {
            let mut state = BriefState::new();
            let timeout = config.stage_timeout;

            yield state.enter(Stage::Planning, format!("Planning searches for {}...", request.query()));
            let plan = match run_stage(Stage::Planning, timeout, provider.plan(&request)).await {
                Ok(plan) if !plan.searches.is_empty() => plan,
                Ok(_) => {
                    yield state.fail(Error::Stage {
                        stage: Stage::Planning,
                        message: "planner returned no searches".to_string(),
                    });
                    return;
                }
                Err(e) => {
                    yield state.fail(e);
                    return;
                }
            };

            yield state.enter(
                Stage::Searching,
                format!("Searches planned, running {} searches...", plan.searches.len()),
            );
            let results = match run_stage(Stage::Searching, timeout, search_all(provider.as_ref(), &plan)).await {
                Ok(results) => results,
                Err(e) => {
                    yield state.fail(e);
                    return;
                }
            };

            yield state.enter(
                Stage::Writing,
                format!("{} searches complete, writing report...", results.len()),
            );
            let report = match run_stage(Stage::Writing, timeout, provider.write(&request, &results)).await {
                Ok(report) => normalize_writer_output(&report),
                Err(e) => {
                    yield state.fail(e);
                    return;
                }
            };
            if report.trim().is_empty() {
                yield state.fail(Error::Stage {
                    stage: Stage::Writing,
                    message: "writer returned an empty report".to_string(),
                });
                return;
            }
            state.partial_report = report.clone();

            let (doc, assignment, actions, sources, narrative) = build_brief(report, &request, &config);

            let context = request.context();
            let subject = request.subject();
            let rendered = render_email(
                &EmailContent {
                    subject: &subject,
                    context: &context,
                    narrative: &narrative,
                    assignment: &assignment,
                    actions: &actions,
                    sources: &sources,
                },
                &brand,
            );

            let sending_message = match (&rendered, &request.recipient) {
                (Ok(_), Some(recipient)) if delivery.is_some() => {
                    format!("Report written, sending email to {}...", recipient)
                }
                _ => "Report written, finalizing email...".to_string(),
            };
            yield state.enter(Stage::Sending, sending_message);

            let (email, status) = match rendered {
                Err(e) => {
                    warn!(error = %e, "email rendering failed");
                    (None, DeliveryStatus::RenderFailed(e))
                }
                Ok(email) => {
                    let status = match (&delivery, request.recipient.as_deref()) {
                        (Some(delivery), Some(recipient)) => {
                            // No stage timeout here: an abandoned send may still go out.
                            match run_stage(Stage::Sending, None, delivery.send(&email, recipient)).await {
                                Ok(receipt) => DeliveryStatus::Sent(receipt),
                                Err(e) => DeliveryStatus::SendFailed { reason: e.to_string() },
                            }
                        }
                        (None, _) => DeliveryStatus::Skipped {
                            reason: "no delivery configured".to_string(),
                        },
                        (Some(_), None) => DeliveryStatus::Skipped {
                            reason: "no recipient".to_string(),
                        },
                    };
                    (Some(email), status)
                }
            };

            let message = match &status {
                DeliveryStatus::Sent(_) => "Email sent, research complete".to_string(),
                DeliveryStatus::Skipped { reason } => format!("Brief ready; email not sent ({})", reason),
                DeliveryStatus::SendFailed { reason } => format!("Brief ready; sending failed: {}", reason),
                DeliveryStatus::RenderFailed(e) => format!("Brief ready; email rendering failed: {}", e),
            };
            let outcome = BriefOutcome {
                report: doc.text().to_string(),
                degraded: doc.is_degraded(),
                assignment,
                actions,
                sources,
                narrative,
                email,
                delivery: status,
            };
            yield state.finish(message, outcome);
        }
    }

    /// Run to completion, passing every event to `observer`.
    ///
    /// Returns the outcome on `Done` and the stage failure on `Failed`.
    pub async fn run_with_observer<F>(&self, request: BriefRequest, mut observer: F) -> Result<BriefOutcome>
    where
        F: FnMut(&ProgressEvent),
    {
        let events = self.run(request);
        pin_mut!(events);
        while let Some(event) = events.next().await {
            observer(&event);
            match event {
                ProgressEvent::Done { outcome, .. } => return Ok(*outcome),
                ProgressEvent::Failed { stage, message } => {
                    // The message already reads "<stage> failed: <cause>".
                    let cause = message
                        .strip_prefix(&format!("{} failed: ", stage))
                        .unwrap_or(message.as_str())
                        .to_string();
                    return Err(Error::Stage { stage, message: cause });
                }
                ProgressEvent::Entered { .. } => {}
            }
        }
        Err(Error::Stage {
            stage: Stage::Failed,
            message: "progress stream ended without a result".to_string(),
        })
    }
}
