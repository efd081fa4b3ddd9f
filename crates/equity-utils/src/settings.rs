//! Application settings
//!
//! [`Settings`] is loaded once at startup, either from the process
//! environment (after reading a `.env` file, if present) or from a TOML file,
//! and validated before any run starts.
//!
//! | Variable | Default |
//! |---|---|
//! | `AI_PROVIDER` | `ollama` |
//! | `AI_API_KEY` | none (required for `groq` and `openai`) |
//! | `OLLAMA_BASE_URL` | `http://localhost:11434` |
//! | `OLLAMA_DEFAULT_MODEL` | `qwen3:14b` |
//! | `OLLAMA_MODEL_REASONING` | the default model |
//! | `GROQ_DEFAULT_MODEL` | `llama-3.3-70b-versatile` |
//! | `OPENAI_DEFAULT_MODEL` | `gpt-4o-mini` |
//! | `AI_REQUEST_TIMEOUT_SECS` | `120` |
//! | `EQUITY_MAX_RETRIES` | `2` |
//! | `EQUITY_AGENTS` | all four, comma separated |
//! | `EQUITY_RUN_TIMEOUT_SECS` | none |
//! | `EQUITY_STATEMENTS_CACHE_TTL_SECS` | `86400` |
//! | `EQUITY_MARKET_CACHE_TTL_SECS` | `900` |
//! | `EQUITY_NEWS_CACHE_TTL_SECS` | `1800` |
//! | `EQUITY_REQUESTS_PER_SECOND` | `5` |
//! | `EQUITY_ADAPTER_RETRIES` | `3` |
//! | `EQUITY_ADAPTER_BACKOFF_MS` | `500` |

use equity_core::AgentId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading or validating settings
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A value is present but cannot be used
    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    /// A value required by the chosen configuration is absent
    #[error("Missing required setting: {0}")]
    Missing(String),

    /// The settings file could not be read
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file is not valid TOML for [`Settings`]
    #[error("Failed to parse settings file: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Which text-generation backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    Groq,
    OpenAI,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::Groq => "groq",
            ProviderKind::OpenAI => "openai",
        }
    }

    /// Hosted providers need an API key
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(ProviderKind::Ollama),
            "groq" => Ok(ProviderKind::Groq),
            "openai" => Ok(ProviderKind::OpenAI),
            other => Err(ConfigError::invalid(
                "AI_PROVIDER",
                format!("unsupported provider '{other}' (expected ollama, groq or openai)"),
            )),
        }
    }
}

/// Text-generation provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub ollama_base_url: String,
    pub ollama_default_model: String,
    /// Model for the reviewer and supervisor; falls back to the default model
    pub ollama_reasoning_model: Option<String>,
    pub groq_default_model: String,
    pub openai_default_model: String,
    pub request_timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            api_key: None,
            ollama_base_url: "http://localhost:11434".to_string(),
            ollama_default_model: "qwen3:14b".to_string(),
            ollama_reasoning_model: None,
            groq_default_model: "llama-3.3-70b-versatile".to_string(),
            openai_default_model: "gpt-4o-mini".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl ProviderSettings {
    /// Model used by the specialists
    pub fn default_model(&self) -> &str {
        match self.provider {
            ProviderKind::Ollama => &self.ollama_default_model,
            ProviderKind::Groq => &self.groq_default_model,
            ProviderKind::OpenAI => &self.openai_default_model,
        }
    }

    /// Model used for review and synthesis
    pub fn reasoning_model(&self) -> &str {
        match (self.provider, &self.ollama_reasoning_model) {
            (ProviderKind::Ollama, Some(model)) => model,
            _ => self.default_model(),
        }
    }
}

/// Workflow settings, turned into a `WorkflowConfig` by the facade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    pub max_retries: u32,
    pub agents: Vec<AgentId>,
    pub run_timeout_secs: Option<u64>,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            agents: AgentId::ALL.to_vec(),
            run_timeout_secs: None,
        }
    }
}

impl WorkflowSettings {
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

/// Capability adapter decorator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterSettings {
    pub statements_cache_ttl_secs: u64,
    pub market_cache_ttl_secs: u64,
    pub news_cache_ttl_secs: u64,
    pub requests_per_second: u32,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            statements_cache_ttl_secs: 86_400,
            market_cache_ttl_secs: 900,
            news_cache_ttl_secs: 1_800,
            requests_per_second: 5,
            max_retries: 3,
            retry_backoff_ms: 500,
        }
    }
}

impl AdapterSettings {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Everything the application reads at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub provider: ProviderSettings,
    pub workflow: WorkflowSettings,
    pub adapters: AdapterSettings,
}

impl Settings {
    /// Load from the process environment, reading `.env` first
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup; unset or blank keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut settings = Settings::default();

        let provider = &mut settings.provider;
        if let Some(value) = get("AI_PROVIDER") {
            provider.provider = value.parse()?;
        }
        provider.api_key = get("AI_API_KEY");
        if let Some(value) = get("OLLAMA_BASE_URL") {
            provider.ollama_base_url = value;
        }
        if let Some(value) = get("OLLAMA_DEFAULT_MODEL") {
            provider.ollama_default_model = value;
        }
        provider.ollama_reasoning_model = get("OLLAMA_MODEL_REASONING");
        if let Some(value) = get("GROQ_DEFAULT_MODEL") {
            provider.groq_default_model = value;
        }
        if let Some(value) = get("OPENAI_DEFAULT_MODEL") {
            provider.openai_default_model = value;
        }
        parse_into(&get, "AI_REQUEST_TIMEOUT_SECS", &mut provider.request_timeout_secs)?;

        let workflow = &mut settings.workflow;
        parse_into(&get, "EQUITY_MAX_RETRIES", &mut workflow.max_retries)?;
        if let Some(value) = get("EQUITY_AGENTS") {
            workflow.agents = value
                .split(',')
                .filter(|name| !name.trim().is_empty())
                .map(|name| {
                    name.parse::<AgentId>()
                        .map_err(|e| ConfigError::invalid("EQUITY_AGENTS", e.to_string()))
                })
                .collect::<Result<_, _>>()?;
        }
        if let Some(value) = get("EQUITY_RUN_TIMEOUT_SECS") {
            workflow.run_timeout_secs = Some(parse_value("EQUITY_RUN_TIMEOUT_SECS", &value)?);
        }

        let adapters = &mut settings.adapters;
        parse_into(&get, "EQUITY_STATEMENTS_CACHE_TTL_SECS", &mut adapters.statements_cache_ttl_secs)?;
        parse_into(&get, "EQUITY_MARKET_CACHE_TTL_SECS", &mut adapters.market_cache_ttl_secs)?;
        parse_into(&get, "EQUITY_NEWS_CACHE_TTL_SECS", &mut adapters.news_cache_ttl_secs)?;
        parse_into(&get, "EQUITY_REQUESTS_PER_SECOND", &mut adapters.requests_per_second)?;
        parse_into(&get, "EQUITY_ADAPTER_RETRIES", &mut adapters.max_retries)?;
        parse_into(&get, "EQUITY_ADAPTER_BACKOFF_MS", &mut adapters.retry_backoff_ms)?;

        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from TOML text; missing tables and keys keep defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        let provider = &self.provider;
        if provider.provider.requires_api_key() && provider.api_key.is_none() {
            return Err(ConfigError::Missing(format!(
                "AI_API_KEY (required by provider '{}')",
                provider.provider
            )));
        }
        if provider.default_model().trim().is_empty() {
            return Err(ConfigError::invalid("model", "model name must not be empty"));
        }
        if provider.request_timeout_secs == 0 {
            return Err(ConfigError::invalid("AI_REQUEST_TIMEOUT_SECS", "must be greater than 0"));
        }

        let workflow = &self.workflow;
        if workflow.agents.is_empty() {
            return Err(ConfigError::invalid("EQUITY_AGENTS", "at least one agent is required"));
        }
        for (index, agent) in workflow.agents.iter().enumerate() {
            if workflow.agents[..index].contains(agent) {
                return Err(ConfigError::invalid(
                    "EQUITY_AGENTS",
                    format!("agent '{agent}' listed twice"),
                ));
            }
        }
        if workflow.run_timeout_secs == Some(0) {
            return Err(ConfigError::invalid("EQUITY_RUN_TIMEOUT_SECS", "must be greater than 0"));
        }

        if self.adapters.requests_per_second == 0 {
            return Err(ConfigError::invalid("EQUITY_REQUESTS_PER_SECOND", "must be greater than 0"));
        }

        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, format!("'{value}': {e}")))
}

fn parse_into<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) -> Result<(), ConfigError>
where
    T::Err: fmt::Display,
{
    if let Some(value) = get(key) {
        *target = parse_value(key, &value)?;
    }
    Ok(())
}
