//! Per-run aggregate owned by the engine

use crate::branch::{Branch, BranchState, Trigger};
use crate::error::{Result, RunAbort, TransitionError};
use crate::node::AnalysisRequest;
use crate::report::BranchAudit;
use crate::synthesis::{DecisionDocument, ExcludedInput, SynthesisInput};
use equity_core::{AgentId, Artifact, Subject, Verdict};
use uuid::Uuid;

/// State of one run: its subject, one branch per roster member, and the
/// final document once synthesis completes
///
/// Branches are kept in roster order and the set never changes after
/// construction. Every mutation goes through the engine.
#[derive(Debug)]
pub struct RunState {
    run_id: Uuid,
    subject: Subject,
    branches: Vec<Branch>,
    final_document: Option<DecisionDocument>,
    review_invocations: u32,
}

impl RunState {
    /// Create the state for a run; the roster must be non-empty and free of
    /// duplicates
    pub fn new(run_id: Uuid, subject: Subject, roster: &[AgentId]) -> Result<Self> {
        if roster.is_empty() {
            return Err(RunAbort::Configuration("agent roster is empty".to_string()));
        }

        let mut branches: Vec<Branch> = Vec::with_capacity(roster.len());
        for agent in roster {
            if branches.iter().any(|branch| branch.agent() == *agent) {
                return Err(RunAbort::Configuration(format!(
                    "agent '{agent}' appears twice in the roster"
                )));
            }
            branches.push(Branch::new(*agent));
        }

        Ok(Self {
            run_id,
            subject,
            branches,
            final_document: None,
            review_invocations: 0,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn branch(&self, agent: AgentId) -> Option<&Branch> {
        self.branches.iter().find(|branch| branch.agent() == agent)
    }

    /// Agents whose branch is `Pending` or `PendingRevision`
    pub fn dispatchable(&self) -> Vec<AgentId> {
        self.branches
            .iter()
            .filter(|branch| branch.state().is_dispatchable())
            .map(Branch::agent)
            .collect()
    }

    pub fn is_terminal(&self) -> bool {
        self.branches.iter().all(|branch| branch.state().is_terminal())
    }

    pub fn count_in(&self, state: BranchState) -> usize {
        self.branches
            .iter()
            .filter(|branch| branch.state() == state)
            .count()
    }

    /// Analysis executions across all branches
    pub fn analysis_invocations(&self) -> u32 {
        self.branches.iter().map(Branch::executions).sum()
    }

    pub fn review_invocations(&self) -> u32 {
        self.review_invocations
    }

    pub fn final_document(&self) -> Option<&DecisionDocument> {
        self.final_document.as_ref()
    }

    /// Audit entries for every terminal branch, in roster order
    pub fn audit(&self) -> Vec<BranchAudit> {
        self.branches.iter().filter_map(BranchAudit::of).collect()
    }

    /// Move a branch to `Running` and build its analysis request
    pub(crate) fn dispatch(&mut self, agent: AgentId) -> Result<AnalysisRequest> {
        let subject = self.subject.clone();
        let branch = self.branch_mut(agent)?;
        branch.transition(Trigger::Dispatch)?;

        Ok(AnalysisRequest {
            subject,
            revision: branch.revision_count(),
            feedback: branch.last_reasons().to_vec(),
        })
    }

    /// Record a produced artifact; the branch awaits review
    pub(crate) fn record_artifact(&mut self, agent: AgentId, artifact: Artifact) -> Result<()> {
        let branch = self.branch_mut(agent)?;
        branch.transition(Trigger::ArtifactProduced)?;
        branch.set_artifact(artifact);
        Ok(())
    }

    /// Record a producer failure; the branch awaits its synthetic verdict
    pub(crate) fn record_producer_failure(&mut self, agent: AgentId) -> Result<()> {
        self.branch_mut(agent)?.transition(Trigger::ProducerFailed)?;
        Ok(())
    }

    pub(crate) fn record_review(&mut self) {
        self.review_invocations += 1;
    }

    /// Attach a verdict and apply the transition the retry controller chose
    pub(crate) fn apply_verdict(
        &mut self,
        agent: AgentId,
        verdict: Verdict,
        trigger: Trigger,
    ) -> Result<BranchState> {
        let branch = self.branch_mut(agent)?;
        if branch.state() != BranchState::AwaitingReview {
            return Err(TransitionError {
                agent,
                from: branch.state(),
                trigger,
            }
            .into());
        }
        branch.set_verdict(verdict);
        Ok(branch.transition(trigger)?)
    }

    /// Inputs for the synthesis step: approved artifacts in roster order and
    /// exhausted branches as metadata
    pub fn synthesis_input(&self) -> SynthesisInput {
        let mut approved = Vec::new();
        let mut unavailable = Vec::new();

        for branch in &self.branches {
            match (branch.state(), branch.artifact()) {
                (BranchState::Approved, Some(artifact)) => approved.push(artifact.clone()),
                (BranchState::FailedExhausted, _) => unavailable.push(ExcludedInput {
                    agent: branch.agent(),
                    reasons: branch.last_reasons().to_vec(),
                }),
                _ => {}
            }
        }

        SynthesisInput {
            run_id: self.run_id,
            subject: self.subject.clone(),
            approved,
            unavailable,
        }
    }

    /// Store the final document; fails if one is already set or a branch is
    /// still live
    pub(crate) fn set_final_document(&mut self, document: DecisionDocument) -> Result<()> {
        if self.final_document.is_some() {
            return Err(RunAbort::Internal(
                "final document already set for this run".to_string(),
            ));
        }
        if !self.is_terminal() {
            return Err(RunAbort::Internal(
                "final document offered before every branch is terminal".to_string(),
            ));
        }
        self.final_document = Some(document);
        Ok(())
    }

    fn branch_mut(&mut self, agent: AgentId) -> Result<&mut Branch> {
        self.branches
            .iter_mut()
            .find(|branch| branch.agent() == agent)
            .ok_or_else(|| RunAbort::Internal(format!("no branch for agent '{agent}'")))
    }
}
