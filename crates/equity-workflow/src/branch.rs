//! Per-branch state machine
//!
//! ```text
//! Pending ──dispatch──▶ Running ──produced / producer failed──▶ AwaitingReview
//!                          ▲                                        │
//!                          └──dispatch── PendingRevision ◀─rejected─┤
//!                                                                   ├─approved──▶ Approved
//!                                                                   └─exhausted─▶ FailedExhausted
//! ```

use crate::error::TransitionError;
use equity_core::{AgentId, Artifact, Verdict};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a branch is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchState {
    Pending,
    Running,
    AwaitingReview,
    PendingRevision,
    Approved,
    FailedExhausted,
}

impl BranchState {
    /// `Approved` and `FailedExhausted` have no outgoing edges
    pub fn is_terminal(self) -> bool {
        matches!(self, BranchState::Approved | BranchState::FailedExhausted)
    }

    /// States from which the engine may start an analysis execution
    pub fn is_dispatchable(self) -> bool {
        matches!(self, BranchState::Pending | BranchState::PendingRevision)
    }

    /// Follow one edge of the transition table
    pub fn next(self, trigger: Trigger) -> Option<BranchState> {
        use BranchState::{
            Approved, AwaitingReview, FailedExhausted, Pending, PendingRevision, Running,
        };

        match (self, trigger) {
            (Pending | PendingRevision, Trigger::Dispatch) => Some(Running),
            (Running, Trigger::ArtifactProduced | Trigger::ProducerFailed) => Some(AwaitingReview),
            (AwaitingReview, Trigger::Approved) => Some(Approved),
            (AwaitingReview, Trigger::RejectedRetry) => Some(PendingRevision),
            (AwaitingReview, Trigger::RejectedExhausted) => Some(FailedExhausted),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BranchState::Pending => "pending",
            BranchState::Running => "running",
            BranchState::AwaitingReview => "awaiting_review",
            BranchState::PendingRevision => "pending_revision",
            BranchState::Approved => "approved",
            BranchState::FailedExhausted => "failed_exhausted",
        }
    }
}

impl fmt::Display for BranchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event that moves a branch along an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// The engine starts an analysis execution
    Dispatch,
    /// The analysis node returned an artifact
    ArtifactProduced,
    /// The analysis node failed; treated as a synthetic rejection
    ProducerFailed,
    /// The verdict approved the artifact
    Approved,
    /// The verdict rejected the artifact and revisions remain
    RejectedRetry,
    /// The verdict rejected the artifact and the budget is spent
    RejectedExhausted,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Trigger::Dispatch => "dispatch",
            Trigger::ArtifactProduced => "artifact_produced",
            Trigger::ProducerFailed => "producer_failed",
            Trigger::Approved => "approved",
            Trigger::RejectedRetry => "rejected_retry",
            Trigger::RejectedExhausted => "rejected_exhausted",
        };
        f.write_str(name)
    }
}

/// One specialist's lane through a run
///
/// Fields are read-only outside this crate. [`crate::RunState`] is the only
/// writer, and it applies transitions requested by the engine, the
/// gatekeeper verdict and the [`crate::RetryController`].
#[derive(Debug, Clone, Serialize)]
pub struct Branch {
    agent: AgentId,
    state: BranchState,
    artifact: Option<Artifact>,
    revision_count: u32,
    last_verdict: Option<Verdict>,
    executions: u32,
}

impl Branch {
    pub fn new(agent: AgentId) -> Self {
        Self {
            agent,
            state: BranchState::Pending,
            artifact: None,
            revision_count: 0,
            last_verdict: None,
            executions: 0,
        }
    }

    pub fn agent(&self) -> AgentId {
        self.agent
    }

    pub fn state(&self) -> BranchState {
        self.state
    }

    /// Latest artifact, replaced on every successful execution
    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    /// Number of rejected-and-resubmitted cycles so far
    pub fn revision_count(&self) -> u32 {
        self.revision_count
    }

    pub fn last_verdict(&self) -> Option<&Verdict> {
        self.last_verdict.as_ref()
    }

    /// Reasons of the last verdict, empty when there is none or it approved
    pub fn last_reasons(&self) -> &[String] {
        match &self.last_verdict {
            Some(verdict) => verdict.reasons(),
            None => &[],
        }
    }

    /// Number of analysis executions started for this branch
    pub fn executions(&self) -> u32 {
        self.executions
    }

    pub(crate) fn transition(&mut self, trigger: Trigger) -> Result<BranchState, TransitionError> {
        let next = self.state.next(trigger).ok_or(TransitionError {
            agent: self.agent,
            from: self.state,
            trigger,
        })?;

        tracing::debug!(
            agent = %self.agent,
            from = %self.state,
            to = %next,
            %trigger,
            "Branch transition"
        );

        match trigger {
            Trigger::Dispatch => self.executions += 1,
            Trigger::RejectedRetry => self.revision_count += 1,
            _ => {}
        }
        self.state = next;
        Ok(next)
    }

    pub(crate) fn set_artifact(&mut self, artifact: Artifact) {
        self.artifact = Some(artifact);
    }

    pub(crate) fn set_verdict(&mut self, verdict: Verdict) {
        self.last_verdict = Some(verdict);
    }
}
