//! Agent configuration.

/// Configuration for a structured-output agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Name used in logs and token reports (e.g. "PlannerAgent")
    pub name: String,
    /// The model to use (e.g., "gpt-4o-mini")
    pub model: String,
    /// Maximum number of model calls, including self-correction retries
    pub max_iterations: usize,
    /// Temperature for LLM sampling
    pub temperature: Option<f32>,
    /// Maximum tokens for LLM response; also the cap for usage warnings
    pub max_tokens: Option<u32>,
    /// Custom system description (embedded in the full prompt template)
    pub system: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "agent".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_iterations: 3,
            temperature: Some(0.7),
            max_tokens: Some(4096),
            system: None,
        }
    }
}

impl AgentConfig {
    /// Create a new config with the specified model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set the agent name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the maximum number of iterations.
    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    /// Set the temperature.
    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Set the max tokens.
    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Remove the max tokens limit (let the model use its default).
    pub fn no_max_tokens(mut self) -> Self {
        self.max_tokens = None;
        self
    }

    /// Set a custom system description.
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = AgentConfig::new("gpt-4o")
            .name("WriterAgent")
            .max_iterations(2)
            .max_tokens(900)
            .system("write");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.name, "WriterAgent");
        assert_eq!(config.max_iterations, 2);
        assert_eq!(config.max_tokens, Some(900));
        assert_eq!(config.system.as_deref(), Some("write"));
        assert_eq!(config.no_max_tokens().max_tokens, None);
    }
}
