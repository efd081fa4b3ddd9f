//! Bounded revision policy

use crate::branch::{Branch, Trigger};
use equity_core::Verdict;

/// Decides what happens to a branch once its verdict is in
///
/// The revision budget is per branch: every rejection (content rejection,
/// producer failure or gatekeeper failure alike) spends one revision, and a
/// branch runs at most `max_retries + 1` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryController {
    max_retries: u32,
}

impl RetryController {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Pick the transition out of `AwaitingReview` for a fresh verdict
    pub fn decide(&self, branch: &Branch, verdict: &Verdict) -> Trigger {
        if verdict.approved() {
            Trigger::Approved
        } else if branch.revision_count() < self.max_retries {
            Trigger::RejectedRetry
        } else {
            Trigger::RejectedExhausted
        }
    }
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equity_core::AgentId;

    fn awaiting_review(revisions: u32) -> Branch {
        let mut branch = Branch::new(AgentId::Fundamentalist);
        for _ in 0..revisions {
            branch.transition(Trigger::Dispatch).unwrap();
            branch.transition(Trigger::ArtifactProduced).unwrap();
            branch.transition(Trigger::RejectedRetry).unwrap();
        }
        branch.transition(Trigger::Dispatch).unwrap();
        branch.transition(Trigger::ArtifactProduced).unwrap();
        branch
    }

    #[test]
    fn test_approval_wins_regardless_of_budget() {
        let controller = RetryController::new(0);
        assert_eq!(
            controller.decide(&awaiting_review(0), &Verdict::approve()),
            Trigger::Approved
        );
    }

    #[test]
    fn test_rejection_retries_until_budget_is_spent() {
        let controller = RetryController::new(2);
        let rejected = Verdict::reject(["missing_source: market_data"]);

        assert_eq!(controller.decide(&awaiting_review(0), &rejected), Trigger::RejectedRetry);
        assert_eq!(controller.decide(&awaiting_review(1), &rejected), Trigger::RejectedRetry);
        assert_eq!(
            controller.decide(&awaiting_review(2), &rejected),
            Trigger::RejectedExhausted
        );
    }

    #[test]
    fn test_zero_budget_exhausts_on_first_rejection() {
        let controller = RetryController::new(0);
        assert_eq!(
            controller.decide(&awaiting_review(0), &Verdict::reject(["x"])),
            Trigger::RejectedExhausted
        );
    }
}
