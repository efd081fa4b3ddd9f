//! Language model exposed as the text-generation capability

use crate::{CompletionRequest, CompletionResponse, DEFAULT_MAX_TOKENS, LLMProvider};
use async_trait::async_trait;
use equity_core::{CapabilityAdapter, CapabilityError, CapabilityRequest, DataDomain};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

/// Wraps an [`LLMProvider`] and a model choice as a capability adapter
///
/// Nodes call [`TextGenerator::generate`] directly; the adapter form accepts
/// `{"prompt": ..., "system": ...}` params and returns
/// `{"text": ..., "model": ..., "usage": {...}}`.
#[derive(Clone)]
pub struct TextGenerator {
    provider: Arc<dyn LLMProvider>,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl TextGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Same provider, different model (e.g. a reasoning model for review)
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate text for a system/user prompt pair
    pub async fn generate(&self, system: &str, prompt: &str) -> Result<String, CapabilityError> {
        Ok(self.complete(system, prompt).await?.text)
    }

    async fn complete(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<CompletionResponse, CapabilityError> {
        let request = CompletionRequest::new(&self.model, prompt)
            .with_system(system)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);

        debug!(
            provider = self.provider.name(),
            model = %self.model,
            prompt_chars = prompt.len(),
            "Requesting completion"
        );
        let response = self.provider.complete(request).await?;

        if response.is_truncated() {
            warn!(model = %self.model, "Completion truncated at max_tokens");
        }
        if response.text.trim().is_empty() {
            return Err(CapabilityError::malformed(format!(
                "model '{}' returned an empty completion",
                self.model
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl CapabilityAdapter for TextGenerator {
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn domain(&self) -> DataDomain {
        DataDomain::TextGeneration
    }

    async fn call(&self, request: CapabilityRequest) -> Result<Value, CapabilityError> {
        let prompt = request
            .params
            .get("prompt")
            .and_then(Value::as_str)
            .ok_or_else(|| CapabilityError::malformed("text generation requires a 'prompt' string"))?;
        let system = request
            .params
            .get("system")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let response = self.complete(system, prompt).await?;
        Ok(json!({
            "text": response.text,
            "model": self.model,
            "usage": response.usage,
        }))
    }
}
