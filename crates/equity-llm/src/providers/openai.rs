//! OpenAI-compatible chat completions provider
//!
//! Speaks the `/chat/completions` protocol, which OpenAI, Groq and Ollama
//! (`/v1`) all serve.
//!
//! # Examples
//!
//! ```no_run
//! use equity_llm::{CompletionRequest, LLMProvider};
//! use equity_llm::providers::{OpenAIConfig, OpenAIProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Local Ollama server, no API key
//!     let provider = OpenAIProvider::with_config(OpenAIConfig::ollama("http://localhost:11434"))?;
//!
//!     let request = CompletionRequest::new("qwen3:14b", "Summarise WEGE3's last quarter")
//!         .with_max_tokens(512);
//!
//!     let response = provider.complete(request).await?;
//!     println!("{}", response.text);
//!     Ok(())
//! }
//! ```

use crate::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, Result, StopReason, TokenUsage,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF_MS: u64 = 500;

/// Configuration for an OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Name reported in logs and capability errors
    pub name: String,

    /// API key; `None` for servers that need no authentication (Ollama)
    pub api_key: Option<String>,

    /// Base URL up to and including the version segment
    pub api_base: String,

    /// Request timeout in seconds (default: 120)
    pub timeout_secs: u64,

    /// Retries on HTTP 429 and 5xx responses (default: 3)
    pub max_retries: u32,

    /// Initial backoff between retries, doubled on each attempt
    pub retry_backoff: Duration,
}

impl OpenAIConfig {
    /// OpenAI with the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "openai".to_string(),
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Groq's OpenAI-compatible endpoint
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self {
            name: "groq".to_string(),
            api_key: Some(api_key.into()),
            api_base: DEFAULT_GROQ_API_BASE.to_string(),
            ..Self::default()
        }
    }

    /// A local Ollama server, e.g. `http://localhost:11434`
    pub fn ollama(base_url: impl AsRef<str>) -> Self {
        let base = base_url.as_ref().trim_end_matches('/');
        let api_base = if base.ends_with("/v1") {
            base.to_string()
        } else {
            format!("{base}/v1")
        };

        Self {
            name: "ollama".to_string(),
            api_key: None,
            api_base,
            ..Self::default()
        }
    }

    /// Set custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the retry policy for throttled or failing responses
    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff.saturating_mul(2_u32.saturating_pow(attempt))
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            name: "openai".to_string(),
            api_key: None,
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }
}

/// Provider for any OpenAI-compatible chat completions endpoint
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    /// Create a provider with custom configuration
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        if config.api_base.trim().is_empty() {
            return Err(LLMError::ConfigurationError(
                "api_base must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Get the current configuration
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    async fn send_once(&self, body: &OpenAIRequest) -> Result<OpenAIResponse> {
        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.config.api_base))
            .json(body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_status(status, error_text, &body.model));
        }

        response
            .json()
            .await
            .map_err(|e| LLMError::UnexpectedResponse(format!("Failed to parse response: {e}")))
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    #[instrument(skip(self, request), fields(provider = %self.config.name, model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = OpenAIRequest {
            model: request.model,
            messages: openai_messages(request.system, request.prompt),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let mut attempt = 0;
        let openai_response = loop {
            match self.send_once(&body).await {
                Ok(response) => break response,
                Err(err) if attempt < self.config.max_retries && is_retryable(&err) => {
                    let delay = self.config.backoff(attempt);
                    warn!(attempt = attempt + 1, ?delay, error = %err, "Retrying completion");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        };

        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::UnexpectedResponse("No choices in response".to_string()))?;
        let usage = openai_response.usage.unwrap_or_default();

        debug!(
            finish_reason = choice.finish_reason.as_deref().unwrap_or("none"),
            input_tokens = usage.prompt_tokens,
            output_tokens = usage.completion_tokens,
            "Received completion"
        );

        Ok(CompletionResponse {
            text: choice.message.content.unwrap_or_default(),
            stop_reason: map_stop_reason(choice.finish_reason.as_deref()),
            usage: TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
        })
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct OpenAIMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

// ============================================================================
// Conversion helpers
// ============================================================================

/// System instructions first, then the user prompt
fn openai_messages(system: Option<String>, prompt: String) -> Vec<OpenAIMessage> {
    let system = system.map(|content| OpenAIMessage {
        role: "system",
        content,
    });
    let user = OpenAIMessage {
        role: "user",
        content: prompt,
    };
    system.into_iter().chain(std::iter::once(user)).collect()
}

fn map_stop_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("length") => StopReason::MaxTokens,
        Some("content_filter") => StopReason::ContentFilter,
        _ => StopReason::EndTurn,
    }
}

fn map_status(status: StatusCode, error_text: String, model: &str) -> LLMError {
    match status.as_u16() {
        401 | 403 => LLMError::AuthenticationFailed,
        429 => LLMError::RateLimitExceeded(error_text),
        400 => LLMError::InvalidRequest(error_text),
        404 => LLMError::ModelNotFound(model.to_string()),
        408 | 504 => LLMError::Timeout(format!("HTTP {status}: {error_text}")),
        _ => LLMError::RequestFailed(format!("HTTP {status}: {error_text}")),
    }
}

/// 429, 5xx and transport failures are worth another attempt
fn is_retryable(err: &LLMError) -> bool {
    match err {
        LLMError::RateLimitExceeded(_) | LLMError::Timeout(_) => true,
        LLMError::RequestFailed(message) => message.starts_with("HTTP 5"),
        LLMError::HttpError(err) => err.is_timeout() || err.is_connect(),
        _ => false,
    }
}
