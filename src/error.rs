//! Error types for the brief pipeline.

use thiserror::Error;

use crate::pipeline::Stage;

/// Errors that can occur while generating or delivering a brief.
#[derive(Error, Debug)]
pub enum Error {
    /// LLM client error
    #[error("LLM error: {0}")]
    Llm(String),

    /// HTTP transport error from one of the external APIs
    #[error("HTTP error: {0}")]
    Http(String),

    /// No structured block found in an LLM response
    #[error("No structured output found in response")]
    NoStructuredOutput,

    /// Maximum iterations reached
    #[error("Maximum iterations ({0}) reached")]
    MaxIterations(usize),

    /// Deserialization error when converting model output to typed output
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A pipeline stage failed or timed out
    #[error("{stage} failed: {message}")]
    Stage { stage: Stage, message: String },

    /// Template substitution failed
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// The delivery collaborator rejected the email
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// I/O error (brand files, output files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Error::Http(format!("status {}", code)),
            other => Error::Http(other.to_string()),
        }
    }
}

/// Errors raised by the email renderer. Fatal to rendering only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A required brand field is empty or absent
    #[error("missing required brand field `{0}`")]
    MissingBrandField(&'static str),

    /// A color token is not a `#rgb` / `#rrggbb` hex value
    #[error("invalid color `{value}` for `{field}`")]
    InvalidColor { field: &'static str, value: String },

    /// The template references a variable that was not supplied
    #[error("template variable `{0}` has no value")]
    MissingVariable(String),

    /// A URL variable is not an http(s) or mailto link
    #[error("unsupported URL `{0}`")]
    InvalidUrl(String),
}

/// Result type for brief operations.
pub type Result<T> = std::result::Result<T, Error>;
