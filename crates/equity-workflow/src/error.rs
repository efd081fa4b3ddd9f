//! Error types for equity-workflow
//!
//! Capability failures and gatekeeper rejections are absorbed inside a branch
//! and never appear here. [`RunAbort`] is the only failure a run reports to
//! its caller.

use crate::branch::{BranchState, Trigger};
use crate::report::BranchAudit;
use equity_core::{AgentId, CapabilityError};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for equity-workflow
pub type Result<T> = std::result::Result<T, RunAbort>;

/// Fatal outcome of a run; no document is produced
#[derive(Error, Debug)]
pub enum RunAbort {
    /// Invalid configuration detected before any branch started
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Every branch ended `FailedExhausted`
    #[error("All {} branches exhausted their revision budget", .audit.len())]
    AllBranchesExhausted { audit: Vec<BranchAudit> },

    /// The synthesis step failed after the join barrier released
    #[error("Synthesis failed: {0}")]
    SynthesisFailed(CapabilityError),

    /// The run-level deadline elapsed
    #[error("Run timed out after {0:?}")]
    TimedOut(Duration),

    /// The caller cancelled the run
    #[error("Run cancelled")]
    Cancelled,

    /// Engine invariant violated
    #[error("Internal error: {0}")]
    Internal(String),
}

/// An attempted branch transition that is not an edge of the state machine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Illegal transition for {agent}: {from} on {trigger}")]
pub struct TransitionError {
    pub agent: AgentId,
    pub from: BranchState,
    pub trigger: Trigger,
}

impl From<TransitionError> for RunAbort {
    fn from(err: TransitionError) -> Self {
        tracing::error!(agent = %err.agent, from = %err.from, trigger = %err.trigger, "Illegal branch transition");
        RunAbort::Internal(err.to_string())
    }
}

impl From<equity_core::Error> for RunAbort {
    fn from(err: equity_core::Error) -> Self {
        RunAbort::Configuration(err.to_string())
    }
}
