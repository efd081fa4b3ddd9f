//! Run report and hand-off to the persistence collaborator

use crate::branch::{Branch, BranchState};
use crate::run_state::RunState;
use crate::synthesis::DecisionDocument;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use equity_core::{AgentId, CapabilityError, Subject};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

/// Terminal outcome of one branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchOutcome {
    Approved,
    FailedExhausted,
}

/// Audit entry for one branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchAudit {
    pub agent: AgentId,
    pub outcome: BranchOutcome,
    /// Rejected-and-resubmitted cycles
    pub revisions: u32,
    /// Analysis executions
    pub attempts: u32,
    /// Reasons of the final rejection; empty for approved branches
    pub last_reasons: Vec<String>,
}

impl BranchAudit {
    /// Audit a terminal branch; `None` while the branch is still live
    pub fn of(branch: &Branch) -> Option<Self> {
        let outcome = match branch.state() {
            BranchState::Approved => BranchOutcome::Approved,
            BranchState::FailedExhausted => BranchOutcome::FailedExhausted,
            _ => return None,
        };

        Some(Self {
            agent: branch.agent(),
            outcome,
            revisions: branch.revision_count(),
            attempts: branch.executions(),
            last_reasons: branch.last_reasons().to_vec(),
        })
    }
}

/// Everything a successful run hands to the persistence collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub subject: Subject,
    pub document: DecisionDocument,
    /// One entry per branch, in roster order
    pub branches: Vec<BranchAudit>,
    /// Analysis node executions across all branches
    pub analysis_invocations: u32,
    /// Gatekeeper invocations across all branches
    pub review_invocations: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Report for a run whose final document is set; `None` otherwise
    pub fn from_state(state: &RunState, started_at: DateTime<Utc>) -> Option<Self> {
        let document = state.final_document()?.clone();
        Some(Self {
            run_id: state.run_id(),
            subject: state.subject().clone(),
            document,
            branches: state.audit(),
            analysis_invocations: state.analysis_invocations(),
            review_invocations: state.review_invocations(),
            started_at,
            finished_at: Utc::now(),
        })
    }

    pub fn branch(&self, agent: AgentId) -> Option<&BranchAudit> {
        self.branches.iter().find(|audit| audit.agent == agent)
    }

    /// Branches that ended `FailedExhausted`
    pub fn exhausted(&self) -> impl Iterator<Item = &BranchAudit> {
        self.branches
            .iter()
            .filter(|audit| audit.outcome == BranchOutcome::FailedExhausted)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Receives the final report for storage
///
/// Called once per successful run. A failure here is logged by the engine and
/// does not change the run's outcome.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn publish(&self, report: &RunReport) -> Result<(), CapabilityError>;
}

/// Sink that keeps reports in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<RunReport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn reports(&self) -> Vec<RunReport> {
        self.reports.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.reports.lock().await.len()
    }
}

#[async_trait]
impl ReportSink for MemorySink {
    async fn publish(&self, report: &RunReport) -> Result<(), CapabilityError> {
        self.reports.lock().await.push(report.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::Trigger;
    use equity_core::Verdict;

    #[test]
    fn test_audit_only_for_terminal_branches() {
        let mut branch = Branch::new(AgentId::RiskManager);
        assert!(BranchAudit::of(&branch).is_none());

        branch.transition(Trigger::Dispatch).unwrap();
        branch.transition(Trigger::ArtifactProduced).unwrap();
        branch.set_verdict(Verdict::reject(["contradiction: VaR (2023)"]));
        branch.transition(Trigger::RejectedExhausted).unwrap();

        let audit = BranchAudit::of(&branch).unwrap();
        assert_eq!(audit.outcome, BranchOutcome::FailedExhausted);
        assert_eq!(audit.attempts, 1);
        assert_eq!(audit.last_reasons, vec!["contradiction: VaR (2023)"]);
    }

    #[tokio::test]
    async fn test_memory_sink_keeps_reports() {
        let subject = Subject::new("PETR4").unwrap();
        let run_id = Uuid::new_v4();
        let report = RunReport {
            run_id,
            subject: subject.clone(),
            document: DecisionDocument {
                run_id,
                subject,
                body: "body".to_string(),
                included: Vec::new(),
                excluded: Vec::new(),
                created_at: Utc::now(),
            },
            branches: Vec::new(),
            analysis_invocations: 0,
            review_invocations: 0,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };

        let sink = MemorySink::new();
        sink.publish(&report).await.unwrap();
        assert_eq!(sink.len().await, 1);
        assert!(sink.reports().await[0].to_json().unwrap().contains("PETR4"));
    }
}
