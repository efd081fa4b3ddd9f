//! Specialist analysts for equitygraph
//!
//! This crate supplies the concrete collaborators the orchestration core in
//! `equity-workflow` runs:
//!
//! - [`SpecialistNode`]: one analysis node per [`AgentId`](equity_core::AgentId),
//!   reading its data domains and the text-generation capability through a
//!   [`CapabilityRegistry`](equity_core::CapabilityRegistry)
//! - [`ReviewerGatekeeper`]: structural rules first, then a model review
//! - [`SupervisorSynthesizer`]: model-written final report
//! - Adapter decorators for caching, transport retries and rate limiting
//! - [`EquityGraph`]: builds all of the above from [`Settings`](equity_utils::Settings)
//!
//! # Example
//!
//! ```no_run
//! use equity_agents::EquityGraph;
//! use equity_core::CapabilityRegistry;
//! use equity_utils::Settings;
//!
//! # async fn run(registry: CapabilityRegistry) -> Result<(), Box<dyn std::error::Error>> {
//! let graph = EquityGraph::from_settings(Settings::from_env()?, registry)?;
//! let report = graph.run("wege3").await?;
//! println!("{}", report.document.body);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod error;
pub mod parsing;
pub mod pipeline;
pub mod prompts;
pub mod reviewer;
pub mod specialists;
pub mod supervisor;
mod text;

#[cfg(test)]
pub(crate) mod testing;

pub use adapters::{CachedAdapter, RetryPolicy, RetryingAdapter, ThrottledAdapter};
pub use error::{AgentsError, Result};
pub use parsing::{AnalysisOutput, ReviewerOutput};
pub use pipeline::{EquityGraph, EquityGraphBuilder, build_provider};
pub use prompts::PromptLibrary;
pub use reviewer::ReviewerGatekeeper;
pub use specialists::SpecialistNode;
pub use supervisor::SupervisorSynthesizer;
