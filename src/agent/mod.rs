//! Structured-output agent.
//!
//! The agent sends a task to a [`ChatModel`], extracts the answer from a
//! `<finish>` block, a fenced JSON block or the bare response, and
//! deserializes it into the caller's type. Parse failures are fed back to the
//! model so it can correct itself, up to `max_iterations` calls.

mod capture;
mod client;
mod config;
mod events;
pub(crate) mod prompt;

pub use capture::capture_json;
pub use client::{
    ChatModel, ChatRequest, ChatResponse, Message, OpenAiClient, Role, Usage, DEFAULT_BASE_URL,
};
pub use config::AgentConfig;
pub use events::{verbose_callbacks, AgentCallbacks, AgentEvent};

#[cfg(test)]
pub(crate) use client::ScriptedModel;

use crate::error::{Error, Result};
use crate::telemetry::check_token_usage;
use prompt::{DEFAULT_SYSTEM, GLOBAL_HARDENING, SYSTEM_PROMPT_TEMPLATE};
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::{Arc, OnceLock};

fn finish_regex() -> &'static Regex {
    static FINISH_RE: OnceLock<Regex> = OnceLock::new();
    FINISH_RE.get_or_init(|| {
        Regex::new(r"<finish>\s*([\s\S]*?)</finish>").expect("finish regex must compile")
    })
}

/// An agent that turns one task into one typed answer.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    config: AgentConfig,
    messages: Vec<Message>,
    callbacks: AgentCallbacks,
}

impl Agent {
    /// Create a new agent over the given model.
    pub fn new(model: Arc<dyn ChatModel>, config: AgentConfig) -> Self {
        Self {
            model,
            config,
            messages: Vec::new(),
            callbacks: AgentCallbacks::default(),
        }
    }

    /// Log every event through `tracing`.
    pub fn verbose(mut self, enabled: bool) -> Self {
        if enabled {
            self.callbacks = verbose_callbacks();
        }
        self
    }

    /// Replace all callbacks at once.
    pub fn callbacks(mut self, callbacks: AgentCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Set a callback for iteration start events.
    pub fn on_iteration_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&AgentEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_iteration_start = Some(Arc::new(f));
        self
    }

    /// Set a callback for LLM response events.
    pub fn on_llm_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&AgentEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_llm_response = Some(Arc::new(f));
        self
    }

    /// Set a callback for error events.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&AgentEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_error = Some(Arc::new(f));
        self
    }

    /// Set a catch-all callback for any event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&AgentEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_event = Some(Arc::new(f));
        self
    }

    /// Get the conversation history of the last run.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn emit(&self, event: AgentEvent) {
        self.callbacks.emit(&event);
    }

    fn system_prompt(&self) -> String {
        let system = self.config.system.as_deref().unwrap_or(DEFAULT_SYSTEM);
        SYSTEM_PROMPT_TEMPLATE
            .replace("{system}", system)
            .replace("{hardening}", GLOBAL_HARDENING)
    }

    /// Extract a `<finish>` block from a response.
    fn extract_finish(text: &str) -> Option<String> {
        finish_regex()
            .captures(text)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().trim().to_string())
    }

    /// Turn a model response into `T`.
    ///
    /// A `<finish>` block wins. Otherwise the whole text is tried as JSON, then
    /// the first recoverable object, then the raw text as a JSON string.
    fn parse_output<T: DeserializeOwned>(text: &str) -> Result<T> {
        if let Some(block) = Self::extract_finish(text) {
            return serde_json::from_str::<T>(&block)
                .or_else(|e| {
                    capture_json(&block)
                        .ok_or(e)
                        .and_then(serde_json::from_value::<T>)
                })
                .or_else(|e| serde_json::from_value::<T>(Value::String(block.clone())).map_err(|_| e))
                .map_err(|e| Error::Deserialization(format!("Invalid JSON in <finish> block: {}", e)));
        }

        if let Ok(result) = serde_json::from_str::<T>(text.trim()) {
            return Ok(result);
        }
        if let Some(value) = capture_json(text)
            && let Ok(result) = serde_json::from_value::<T>(value)
        {
            return Ok(result);
        }
        serde_json::from_value::<T>(Value::String(text.trim().to_string()))
            .map_err(|_| Error::NoStructuredOutput)
    }

    async fn call_llm(&self) -> Result<ChatResponse> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: self.messages.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        self.model.complete(request).await
    }

    /// Run the agent on a task and return the result as the specified type.
    pub async fn run<T>(&mut self, task: &str) -> Result<T>
    where
        T: DeserializeOwned + Serialize,
    {
        let agent = self.config.name.clone();
        self.messages.clear();
        self.messages.push(Message::system(self.system_prompt()));
        self.messages.push(Message::user(task));

        let mut iterations = 0;

        loop {
            iterations += 1;

            if iterations > self.config.max_iterations {
                self.emit(AgentEvent::Error {
                    agent: agent.clone(),
                    message: format!("Max iterations ({}) reached", self.config.max_iterations),
                });
                return Err(Error::MaxIterations(self.config.max_iterations));
            }

            self.emit(AgentEvent::IterationStart {
                agent: agent.clone(),
                iteration: iterations,
                max_iterations: self.config.max_iterations,
            });
            self.emit(AgentEvent::LLMRequest {
                agent: agent.clone(),
                message_count: self.messages.len(),
            });

            let response = self.call_llm().await?;
            let tokens_used = response.usage.map(|u| u.completion_tokens);
            if let (Some(used), Some(cap)) = (tokens_used, self.config.max_tokens) {
                check_token_usage(&agent, used, cap);
            }

            self.emit(AgentEvent::LLMResponse {
                agent: agent.clone(),
                content: response.text.clone(),
                tokens_used,
            });
            self.messages.push(Message::assistant(response.text.clone()));

            match Self::parse_output::<T>(&response.text) {
                Ok(result) => {
                    if let Ok(value) = serde_json::to_value(&result) {
                        self.emit(AgentEvent::Finish {
                            agent: agent.clone(),
                            value,
                        });
                    }
                    return Ok(result);
                }
                Err(e) => {
                    self.emit(AgentEvent::Error {
                        agent: agent.clone(),
                        message: e.to_string(),
                    });

                    if iterations >= self.config.max_iterations {
                        return Err(e);
                    }

                    self.messages.push(Message::user(format!(
                        "Error parsing your output:\n\n{}\n\nPlease fix and return the answer inside a <finish> block.",
                        e
                    )));
                }
            }
        }
    }
}
