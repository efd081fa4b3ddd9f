//! Orchestration core for equitygraph
//!
//! A run fans out one branch per configured specialist, routes every produced
//! artifact through a [`Gatekeeper`], loops rejected artifacts back to their
//! producer under a bounded revision budget, and only once every branch is
//! terminal hands the approved artifacts to a [`Synthesizer`].
//!
//! Control flow is an explicit per-branch state machine ([`BranchState`])
//! driven by a single-writer scheduling loop ([`GraphEngine`]). Nodes never
//! touch [`RunState`]; they return values that the engine applies.
//!
//! # Example
//!
//! ```no_run
//! use equity_workflow::{DigestSynthesizer, GraphEngine, RuleGatekeeper, WorkflowConfig};
//! use std::sync::Arc;
//!
//! # async fn example(nodes: Vec<Arc<dyn equity_workflow::AnalysisNode>>) -> Result<(), equity_workflow::RunAbort> {
//! let engine = GraphEngine::builder(WorkflowConfig::default())
//!     .nodes(nodes)
//!     .gatekeeper(Arc::new(RuleGatekeeper::new()))
//!     .synthesizer(Arc::new(DigestSynthesizer::new()))
//!     .build()?;
//!
//! let subject = equity_core::Subject::new("WEGE3").expect("valid ticker");
//! let report = engine.run(subject).await?;
//! println!("{}", report.document.body);
//! # Ok(())
//! # }
//! ```

pub mod barrier;
pub mod branch;
pub mod config;
pub mod engine;
pub mod error;
pub mod gatekeeper;
pub mod node;
pub mod report;
pub mod retry;
pub mod run_state;
pub mod synthesis;

pub use barrier::{BarrierStatus, JoinBarrier};
pub use branch::{Branch, BranchState, Trigger};
pub use config::{WorkflowConfig, WorkflowConfigBuilder};
pub use engine::{GraphEngine, GraphEngineBuilder};
pub use error::{Result, RunAbort, TransitionError};
pub use gatekeeper::{Gatekeeper, RuleGatekeeper};
pub use node::{AnalysisNode, AnalysisRequest};
pub use report::{BranchAudit, BranchOutcome, MemorySink, ReportSink, RunReport};
pub use retry::RetryController;
pub use run_state::RunState;
pub use synthesis::{
    DecisionDocument, DigestSynthesizer, ExcludedInput, IncludedInput, SynthesisInput, Synthesizer,
};
