//! Analysis node contract

use async_trait::async_trait;
use equity_core::{AgentId, Artifact, CapabilityError, Subject};

/// Input for one analysis execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub subject: Subject,
    /// Revision number of this execution (0 for the first draft)
    pub revision: u32,
    /// Reasons of the verdict that rejected the previous draft
    pub feedback: Vec<String>,
}

impl AnalysisRequest {
    pub fn first(subject: Subject) -> Self {
        Self {
            subject,
            revision: 0,
            feedback: Vec::new(),
        }
    }

    pub fn is_revision(&self) -> bool {
        self.revision > 0
    }
}

/// Produces a draft artifact for one specialist
///
/// Implementations read only the request and their capability adapters. They
/// never see other branches and return a fresh artifact on every call.
#[async_trait]
pub trait AnalysisNode: Send + Sync {
    /// The roster member this node analyses for
    fn agent(&self) -> AgentId;

    async fn analyze(&self, request: AnalysisRequest) -> Result<Artifact, CapabilityError>;
}
