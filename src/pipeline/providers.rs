//! Research collaborators: planning, searching and writing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::BriefRequest;
use crate::agent::prompt::{planner_system, writer_system, HOW_MANY_SEARCHES, SEARCH_SYSTEM};
use crate::agent::{Agent, AgentConfig, ChatModel};
use crate::error::{Error, Result};
use crate::telemetry::{PLANNER_TOKEN_CAP, SEARCH_TOKEN_CAP, WRITER_TOKEN_CAP};

/// One planned web search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    /// Why this search matters for the brief
    #[serde(default)]
    pub reason: String,
    /// The search term
    pub query: String,
}

impl SearchItem {
    pub fn new(query: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            reason: reason.into(),
        }
    }
}

/// The planner's output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPlan {
    pub searches: Vec<SearchItem>,
}

/// The three research steps the orchestrator drives.
#[async_trait]
pub trait ResearchProvider: Send + Sync {
    /// Decide which searches to run.
    async fn plan(&self, request: &BriefRequest) -> Result<SearchPlan>;

    /// Run one search and return a text summary of its results.
    async fn search(&self, item: &SearchItem) -> Result<String>;

    /// Write the report from the collected summaries.
    async fn write(&self, request: &BriefRequest, results: &[String]) -> Result<String>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaSearchRequest<'a> {
    query: &'a str,
    num_results: u32,
    #[serde(rename = "type")]
    search_type: &'static str,
    contents: ExaContents,
}

#[derive(Serialize)]
struct ExaContents {
    text: ExaText,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaText {
    max_characters: u32,
}

#[derive(Deserialize)]
struct ExaSearchResponse {
    #[serde(default)]
    results: Vec<ExaResult>,
}

#[derive(Deserialize)]
struct ExaResult {
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default)]
    text: Option<String>,
}

/// Web search through the Exa API.
#[derive(Clone)]
pub struct ExaSearch {
    api_key: String,
    endpoint: String,
    num_results: u32,
    max_characters: u32,
}

impl ExaSearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: "https://api.exa.ai/search".to_string(),
            num_results: 5,
            max_characters: 1500,
        }
    }

    pub fn num_results(mut self, n: u32) -> Self {
        self.num_results = n.clamp(1, 10);
        self
    }

    /// Search and format the hits as plain text, one block per result.
    pub async fn search(&self, query: &str) -> Result<String> {
        let body = serde_json::to_value(ExaSearchRequest {
            query,
            num_results: self.num_results,
            search_type: "auto",
            contents: ExaContents {
                text: ExaText {
                    max_characters: self.max_characters,
                },
            },
        })?;
        let url = self.endpoint.clone();
        let api_key = self.api_key.clone();

        let response = tokio::task::spawn_blocking(move || -> Result<ExaSearchResponse> {
            let mut response = ureq::post(&url)
                .header("x-api-key", &api_key)
                .header("Content-Type", "application/json")
                .send_json(&body)?;
            Ok(response.body_mut().read_json::<ExaSearchResponse>()?)
        })
        .await
        .map_err(|e| Error::Http(format!("search task failed: {}", e)))??;

        Ok(format_results(&response.results))
    }
}

fn format_results(results: &[ExaResult]) -> String {
    results
        .iter()
        .map(|r| {
            format!(
                "Title: {}\nURL: {}\n{}",
                r.title.as_deref().unwrap_or("(untitled)"),
                r.url,
                r.text.as_deref().unwrap_or_default().trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Research provider backed by LLM agents and optional Exa search.
pub struct AgentResearchProvider {
    model: Arc<dyn ChatModel>,
    model_name: String,
    search: Option<ExaSearch>,
    verbose: bool,
}

impl AgentResearchProvider {
    pub fn new(model: Arc<dyn ChatModel>, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            search: None,
            verbose: false,
        }
    }

    /// Ground searches in Exa results instead of model knowledge alone.
    pub fn web_search(mut self, search: ExaSearch) -> Self {
        self.search = Some(search);
        self
    }

    pub fn verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    fn agent(&self, name: &str, system: String, max_tokens: u32) -> Agent {
        let config = AgentConfig::new(self.model_name.clone())
            .name(name)
            .system(system)
            .max_tokens(max_tokens);
        Agent::new(self.model.clone(), config).verbose(self.verbose)
    }
}

#[async_trait]
impl ResearchProvider for AgentResearchProvider {
    async fn plan(&self, request: &BriefRequest) -> Result<SearchPlan> {
        let mut agent = self.agent("PlannerAgent", planner_system(), PLANNER_TOKEN_CAP);
        let mut plan: SearchPlan = agent.run(&format!("Query: {}", request.query())).await?;
        plan.searches.retain(|s| !s.query.trim().is_empty());
        plan.searches.truncate(HOW_MANY_SEARCHES);
        Ok(plan)
    }

    async fn search(&self, item: &SearchItem) -> Result<String> {
        let mut task = format!(
            "Search term: {}\nReason for searching: {}",
            item.query, item.reason
        );
        match &self.search {
            Some(exa) => {
                let hits = exa.search(&item.query).await?;
                task.push_str(&format!("\n\nSearch results:\n{}", hits));
            }
            None => debug!(query = %item.query, "no search API configured; summarizing from model knowledge"),
        }
        let mut agent = self.agent("SearchAgent", SEARCH_SYSTEM.to_string(), SEARCH_TOKEN_CAP);
        agent.run::<String>(&task).await
    }

    async fn write(&self, request: &BriefRequest, results: &[String]) -> Result<String> {
        let instructions = request
            .template
            .writer_instructions(request.business_name(), &request.location);
        let task = format!(
            "{}\n\nOriginal query: {}\nSummarized search results:\n{}",
            instructions,
            request.query(),
            results.join("\n\n---\n\n")
        );
        let mut agent = self.agent("WriterAgent", writer_system(), WRITER_TOKEN_CAP);
        agent.run::<String>(&task).await
    }
}
