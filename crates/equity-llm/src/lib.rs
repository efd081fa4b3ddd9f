//! Text-generation capability for equitygraph
//!
//! This crate provides provider-agnostic abstractions for calling a language
//! model and exposes them to the workflow as a capability adapter:
//!
//! - Completion request/response types
//! - The [`LLMProvider`] trait
//! - [`TextGenerator`], which wraps a provider as the `text_generation`
//!   [`equity_core::CapabilityAdapter`] and maps provider failures to
//!   [`equity_core::CapabilityError`]
//! - An OpenAI-compatible HTTP provider (behind the `openai` feature) that
//!   also serves Groq and Ollama endpoints

pub mod completion;
pub mod error;
pub mod generator;
pub mod provider;

// Re-export main types
pub use completion::{
    CompletionRequest, CompletionResponse, DEFAULT_MAX_TOKENS, StopReason, TokenUsage,
};
pub use error::{LLMError, Result};
pub use generator::TextGenerator;
pub use provider::LLMProvider;

// Provider implementations (feature-gated)
#[cfg(feature = "openai")]
pub mod providers;
