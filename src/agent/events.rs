//! Agent events and callbacks for observability.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Events emitted during agent execution.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// Starting a new iteration
    IterationStart {
        agent: String,
        iteration: usize,
        max_iterations: usize,
    },
    /// About to call the LLM
    LLMRequest { agent: String, message_count: usize },
    /// LLM responded
    LLMResponse {
        agent: String,
        content: String,
        tokens_used: Option<u32>,
    },
    /// Typed output was produced
    Finish { agent: String, value: Value },
    /// Output could not be used, or the run gave up
    Error { agent: String, message: String },
}

/// Type alias for event callbacks
pub type EventCallback = Arc<dyn Fn(&AgentEvent) + Send + Sync>;

/// Storage for agent callbacks
#[derive(Default, Clone)]
pub struct AgentCallbacks {
    pub on_iteration_start: Option<EventCallback>,
    pub on_llm_request: Option<EventCallback>,
    pub on_llm_response: Option<EventCallback>,
    pub on_finish: Option<EventCallback>,
    pub on_error: Option<EventCallback>,
    /// Catch-all callback for any event
    pub on_event: Option<EventCallback>,
}

impl AgentCallbacks {
    /// Emit an event to the appropriate callback(s)
    pub fn emit(&self, event: &AgentEvent) {
        let specific = match event {
            AgentEvent::IterationStart { .. } => &self.on_iteration_start,
            AgentEvent::LLMRequest { .. } => &self.on_llm_request,
            AgentEvent::LLMResponse { .. } => &self.on_llm_response,
            AgentEvent::Finish { .. } => &self.on_finish,
            AgentEvent::Error { .. } => &self.on_error,
        };

        if let Some(cb) = specific {
            cb(event);
        }

        if let Some(cb) = &self.on_event {
            cb(event);
        }
    }
}

fn preview(text: &str, limit: usize) -> String {
    let head: String = text.chars().take(limit).collect();
    let suffix = if text.chars().count() > limit { "..." } else { "" };
    format!("{}{}", head.replace('\n', "\\n"), suffix)
}

/// Callbacks that log every event through `tracing`.
pub fn verbose_callbacks() -> AgentCallbacks {
    AgentCallbacks {
        on_iteration_start: Some(Arc::new(|e| {
            if let AgentEvent::IterationStart {
                agent,
                iteration,
                max_iterations,
            } = e
            {
                info!(%agent, "iteration {}/{}", iteration, max_iterations);
            }
        })),
        on_llm_response: Some(Arc::new(|e| {
            if let AgentEvent::LLMResponse {
                agent,
                content,
                tokens_used,
            } = e
            {
                debug!(%agent, tokens = ?tokens_used, "LLM: {}", preview(content, 100));
            }
        })),
        on_finish: Some(Arc::new(|e| {
            if let AgentEvent::Finish { agent, value } = e {
                info!(%agent, "finish: {}", preview(&value.to_string(), 80));
            }
        })),
        on_error: Some(Arc::new(|e| {
            if let AgentEvent::Error { agent, message } = e {
                warn!(%agent, "{}", message);
            }
        })),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_emit_calls_specific_and_catch_all() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let specific = seen.clone();
        let all = seen.clone();
        let callbacks = AgentCallbacks {
            on_error: Some(Arc::new(move |_| specific.lock().unwrap().push("error"))),
            on_event: Some(Arc::new(move |_| all.lock().unwrap().push("event"))),
            ..Default::default()
        };

        callbacks.emit(&AgentEvent::Error {
            agent: "a".to_string(),
            message: "bad".to_string(),
        });
        callbacks.emit(&AgentEvent::LLMRequest {
            agent: "a".to_string(),
            message_count: 2,
        });

        assert_eq!(*seen.lock().unwrap(), vec!["error", "event", "event"]);
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("a\nb", 10), "a\\nb");
        assert_eq!(preview("abcdef", 3), "abc...");
    }
}
