//! [`Oracle`] backed by the Anthropic Messages API.

use super::Oracle;
use crate::error::OracleError;
use async_trait::async_trait;
use claude::{Claude, Message, Request};

/// Model used when `CANONCHECK_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";

/// Short, low-temperature completions suited to classification prompts.
pub const DEFAULT_MAX_TOKENS: usize = 400;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

pub struct ClaudeOracle {
    client: Claude,
    model: String,
    max_tokens: usize,
    temperature: f32,
}

impl ClaudeOracle {
    pub fn new(client: Claude) -> Self {
        Self {
            client,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Create from `ANTHROPIC_API_KEY`, honouring `CANONCHECK_MODEL`.
    pub fn from_env() -> Result<Self, claude::Error> {
        let oracle = Self::new(Claude::from_env()?);
        Ok(match std::env::var("CANONCHECK_MODEL") {
            Ok(model) if !model.trim().is_empty() => oracle.with_model(model.trim()),
            _ => oracle,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn request(&self, prompt: &str) -> Request {
        Request::new(vec![Message::user(prompt)])
            .with_model(&self.model)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
    }
}

#[async_trait]
impl Oracle for ClaudeOracle {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let response = self.client.complete(self.request(prompt)).await?;
        tracing::debug!(
            model = %response.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "oracle answered"
        );
        Ok(response.text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_sampling_settings() {
        let oracle = ClaudeOracle::new(Claude::new("test-key").unwrap())
            .with_model("claude-test")
            .with_max_tokens(64)
            .with_temperature(0.0);
        let request = oracle.request("Claim: x");
        assert_eq!(request.model.as_deref(), Some("claude-test"));
        assert_eq!(request.max_tokens, 64);
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(oracle.name(), "claude-test");
    }

    #[test]
    fn test_defaults() {
        let oracle = ClaudeOracle::new(Claude::new("test-key").unwrap());
        assert_eq!(oracle.name(), DEFAULT_MODEL);
        let request = oracle.request("p");
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);
    }
}
