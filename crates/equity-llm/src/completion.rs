//! Prompt and completion types shared by every provider

use serde::{Deserialize, Serialize};

/// Completion length used when the caller sets none
pub const DEFAULT_MAX_TOKENS: usize = 4096;

/// One system/user prompt pair addressed to a single model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,

    /// Instructions sent ahead of the prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    pub prompt: String,

    pub max_tokens: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            prompt: prompt.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }

    /// Attach system instructions; blank text leaves the request without any
    pub fn with_system(mut self, system: &str) -> Self {
        self.system = (!system.trim().is_empty()).then(|| system.to_string());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Text the model produced for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// Generation stopped at `max_tokens`
    pub fn is_truncated(&self) -> bool {
        self.stop_reason == StopReason::MaxTokens
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    /// The provider withheld part of the answer
    ContentFilter,
}

/// Token counts reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = CompletionRequest::new("qwen3:14b", "Analyse WEGE3");
        assert_eq!(request.prompt, "Analyse WEGE3");
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(request.system.is_none());
        assert!(request.temperature.is_none());
    }

    #[test]
    fn test_blank_system_is_dropped() {
        let request = CompletionRequest::new("m", "p").with_system(" \n");
        assert!(request.system.is_none());

        let request = request.with_system("You are Graham");
        assert_eq!(request.system.as_deref(), Some("You are Graham"));
    }

    #[test]
    fn test_truncation() {
        let response = CompletionResponse {
            text: "Valuation: che".to_string(),
            stop_reason: StopReason::MaxTokens,
            usage: TokenUsage::default(),
        };
        assert!(response.is_truncated());
        assert_eq!(serde_json::to_value(response.stop_reason).unwrap(), "max_tokens");
    }
}
