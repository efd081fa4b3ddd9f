//! Join barrier between the branches and synthesis

use crate::branch::BranchState;
use crate::run_state::RunState;

/// Result of checking the barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierStatus {
    /// At least one branch is still live
    Waiting { remaining: usize },
    /// Every branch is terminal and at least one was approved
    Released { approved: usize, exhausted: usize },
    /// Every branch ended `FailedExhausted`; synthesis must not run
    AllExhausted,
}

/// Releases synthesis once, when every branch is terminal
#[derive(Debug, Default)]
pub struct JoinBarrier {
    released: bool,
}

impl JoinBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the barrier has already released
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Check the run state; called after every state change
    pub fn check(&mut self, state: &RunState) -> BarrierStatus {
        let total = state.branches().len();
        let approved = state.count_in(BranchState::Approved);
        let exhausted = state.count_in(BranchState::FailedExhausted);
        let remaining = total - approved - exhausted;

        if remaining > 0 {
            tracing::trace!(remaining, approved, exhausted, "Join barrier waiting");
            return BarrierStatus::Waiting { remaining };
        }

        if approved == 0 {
            tracing::warn!(exhausted, "Every branch exhausted its revision budget");
            return BarrierStatus::AllExhausted;
        }

        if !self.released {
            tracing::info!(approved, exhausted, "Join barrier released");
            self.released = true;
        }
        BarrierStatus::Released {
            approved,
            exhausted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::Trigger;
    use equity_core::{AgentId, Artifact, Subject, Verdict};
    use uuid::Uuid;

    fn finish(state: &mut RunState, agent: AgentId, approve: bool) {
        let subject = state.subject().clone();
        state.dispatch(agent).unwrap();
        state
            .record_artifact(agent, Artifact::new(agent, subject, "draft"))
            .unwrap();
        let (verdict, trigger) = if approve {
            (Verdict::approve(), Trigger::Approved)
        } else {
            (Verdict::reject(["missing_source: news_references"]), Trigger::RejectedExhausted)
        };
        state.apply_verdict(agent, verdict, trigger).unwrap();
    }

    #[test]
    fn test_does_not_release_on_partial_success() {
        let roster = [AgentId::Fundamentalist, AgentId::Sentiment];
        let mut state = RunState::new(Uuid::new_v4(), Subject::new("ABEV3").unwrap(), &roster).unwrap();
        let mut barrier = JoinBarrier::new();

        finish(&mut state, AgentId::Fundamentalist, true);
        assert_eq!(barrier.check(&state), BarrierStatus::Waiting { remaining: 1 });
        assert!(!barrier.is_released());

        finish(&mut state, AgentId::Sentiment, false);
        assert_eq!(
            barrier.check(&state),
            BarrierStatus::Released { approved: 1, exhausted: 1 }
        );
        assert!(barrier.is_released());
    }

    #[test]
    fn test_all_exhausted_never_releases() {
        let roster = [AgentId::Quantitative, AgentId::RiskManager];
        let mut state = RunState::new(Uuid::new_v4(), Subject::new("ABEV3").unwrap(), &roster).unwrap();
        let mut barrier = JoinBarrier::new();

        finish(&mut state, AgentId::Quantitative, false);
        finish(&mut state, AgentId::RiskManager, false);

        assert_eq!(barrier.check(&state), BarrierStatus::AllExhausted);
        assert!(!barrier.is_released());
    }
}
