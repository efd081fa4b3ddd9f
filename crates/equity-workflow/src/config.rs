//! Configuration for a workflow run

use crate::error::{Result, RunAbort};
use equity_core::AgentId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Read-only inputs fixed for a run's lifetime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Revisions allowed per branch after the first draft
    pub max_retries: u32,

    /// Specialists taking part, in report order
    pub roster: Vec<AgentId>,

    /// Deadline for the whole run (none by default)
    pub run_timeout: Option<Duration>,

    /// Deadline for a single analysis execution
    pub node_timeout: Duration,

    /// Deadline for a single gatekeeper review
    pub review_timeout: Duration,

    /// Deadline for the synthesis step
    pub synthesis_timeout: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            roster: AgentId::ALL.to_vec(),
            run_timeout: None,
            node_timeout: Duration::from_secs(120),
            review_timeout: Duration::from_secs(60),
            synthesis_timeout: Duration::from_secs(180),
        }
    }
}

impl WorkflowConfig {
    /// Create a new configuration builder
    pub fn builder() -> WorkflowConfigBuilder {
        WorkflowConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.roster.is_empty() {
            return Err(RunAbort::Configuration(
                "roster must name at least one agent".to_string(),
            ));
        }

        for (index, agent) in self.roster.iter().enumerate() {
            if self.roster[..index].contains(agent) {
                return Err(RunAbort::Configuration(format!(
                    "agent '{agent}' appears twice in the roster"
                )));
            }
        }

        let zero = [
            ("node_timeout", self.node_timeout),
            ("review_timeout", self.review_timeout),
            ("synthesis_timeout", self.synthesis_timeout),
        ]
        .into_iter()
        .chain(self.run_timeout.map(|timeout| ("run_timeout", timeout)))
        .find(|(_, timeout)| timeout.is_zero());

        if let Some((name, _)) = zero {
            return Err(RunAbort::Configuration(format!(
                "{name} must be greater than 0"
            )));
        }

        Ok(())
    }

    /// Upper bound on analysis executions for one run
    pub fn max_executions(&self) -> u32 {
        let branches = u32::try_from(self.roster.len()).unwrap_or(u32::MAX);
        self.max_retries.saturating_add(1).saturating_mul(branches)
    }
}

/// Builder for WorkflowConfig
#[derive(Debug, Default)]
pub struct WorkflowConfigBuilder {
    max_retries: Option<u32>,
    roster: Option<Vec<AgentId>>,
    run_timeout: Option<Duration>,
    node_timeout: Option<Duration>,
    review_timeout: Option<Duration>,
    synthesis_timeout: Option<Duration>,
}

impl WorkflowConfigBuilder {
    /// Set the per-branch revision budget
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set the agent roster
    pub fn roster(mut self, roster: impl IntoIterator<Item = AgentId>) -> Self {
        self.roster = Some(roster.into_iter().collect());
        self
    }

    /// Set the run-level deadline
    pub fn run_timeout(mut self, duration: Duration) -> Self {
        self.run_timeout = Some(duration);
        self
    }

    /// Set the per-execution analysis deadline
    pub fn node_timeout(mut self, duration: Duration) -> Self {
        self.node_timeout = Some(duration);
        self
    }

    /// Set the per-review deadline
    pub fn review_timeout(mut self, duration: Duration) -> Self {
        self.review_timeout = Some(duration);
        self
    }

    /// Set the synthesis deadline
    pub fn synthesis_timeout(mut self, duration: Duration) -> Self {
        self.synthesis_timeout = Some(duration);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<WorkflowConfig> {
        let default = WorkflowConfig::default();
        let config = WorkflowConfig {
            max_retries: self.max_retries.unwrap_or(default.max_retries),
            roster: self.roster.unwrap_or(default.roster),
            run_timeout: self.run_timeout.or(default.run_timeout),
            node_timeout: self.node_timeout.unwrap_or(default.node_timeout),
            review_timeout: self.review_timeout.unwrap_or(default.review_timeout),
            synthesis_timeout: self.synthesis_timeout.unwrap_or(default.synthesis_timeout),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkflowConfig::default();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.roster, AgentId::ALL.to_vec());
        assert!(config.run_timeout.is_none());
        assert_eq!(config.max_executions(), 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = WorkflowConfig::builder()
            .max_retries(0)
            .roster([AgentId::Sentiment])
            .run_timeout(Duration::from_secs(300))
            .build()
            .unwrap();

        assert_eq!(config.max_retries, 0);
        assert_eq!(config.roster, vec![AgentId::Sentiment]);
        assert_eq!(config.run_timeout, Some(Duration::from_secs(300)));
        assert_eq!(config.node_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_max_executions_saturates() {
        let config = WorkflowConfig::builder().max_retries(u32::MAX).build().unwrap();
        assert_eq!(config.max_executions(), u32::MAX);
    }

    #[test]
    fn test_validation() {
        assert!(WorkflowConfig::builder().roster(Vec::new()).build().is_err());
        assert!(WorkflowConfig::builder()
            .roster([AgentId::Quantitative, AgentId::Quantitative])
            .build()
            .is_err());
        assert!(WorkflowConfig::builder()
            .node_timeout(Duration::ZERO)
            .build()
            .is_err());
        assert!(WorkflowConfig::builder()
            .run_timeout(Duration::ZERO)
            .build()
            .is_err());
    }
}
