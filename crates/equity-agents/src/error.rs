//! Error types for equity-agents

use equity_llm::LLMError;
use equity_utils::ConfigError;
use equity_workflow::RunAbort;
use thiserror::Error;

/// Result type alias for equity-agents
pub type Result<T> = std::result::Result<T, AgentsError>;

/// Errors raised while assembling or running the graph
#[derive(Error, Debug)]
pub enum AgentsError {
    /// Settings failed to load or validate
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The language model provider could not be constructed
    #[error("LLM provider error: {0}")]
    Provider(#[from] LLMError),

    /// A built-in prompt template failed to compile
    #[error("Prompt template error: {0}")]
    Template(#[from] minijinja::Error),

    /// The ticker is not a valid subject
    #[error("Invalid ticker: {0}")]
    InvalidTicker(#[from] equity_core::Error),

    /// The run aborted
    #[error(transparent)]
    Run(#[from] RunAbort),
}
