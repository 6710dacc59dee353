//! Runtime settings read from the environment.

use crate::agent::DEFAULT_BASE_URL;
use crate::error::{Error, Result};

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Credentials and endpoints for the default collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// `OPENAI_API_KEY` (required)
    pub llm_api_key: String,
    /// `LLM_BASE_URL`, defaults to the OpenAI API root
    pub llm_base_url: String,
    /// `BRIEF_MODEL`, defaults to `gpt-4o-mini`
    pub model: String,
    /// `EXA_API_KEY`; without it searches run on model knowledge only
    pub search_api_key: Option<String>,
    /// `SENDGRID_API_KEY`; without it delivery is unavailable
    pub sendgrid_api_key: Option<String>,
    /// `BRIEF_FROM_EMAIL`
    pub from_email: Option<String>,
}

impl Settings {
    /// Read settings from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let llm_api_key = get("OPENAI_API_KEY")
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is not set".to_string()))?;

        Ok(Self {
            llm_api_key,
            llm_base_url: get("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: get("BRIEF_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            search_api_key: get("EXA_API_KEY"),
            sendgrid_api_key: get("SENDGRID_API_KEY"),
            from_email: get("BRIEF_FROM_EMAIL"),
        })
    }
}
