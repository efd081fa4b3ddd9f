//! Specialist analysis nodes
//!
//! One [`SpecialistNode`] per roster member. Each execution fetches the
//! agent's data domains concurrently, renders its prompt (with the reviewer's
//! reasons on a revision), asks the text-generation capability for a JSON
//! analysis and parses it into an [`Artifact`].

use crate::parsing::AnalysisOutput;
use crate::prompts::{AnalysisPrompt, DomainData, PromptLibrary};
use crate::text;
use async_trait::async_trait;
use equity_core::{
    AgentId, Artifact, CapabilityError, CapabilityRegistry, CapabilityRequest, DataDomain, Subject,
};
use equity_workflow::{AnalysisNode, AnalysisRequest};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Analysis node backed by capability adapters and a language model
pub struct SpecialistNode {
    agent: AgentId,
    registry: CapabilityRegistry,
    prompts: Arc<PromptLibrary>,
}

impl SpecialistNode {
    pub fn new(agent: AgentId, registry: CapabilityRegistry, prompts: Arc<PromptLibrary>) -> Self {
        Self {
            agent,
            registry,
            prompts,
        }
    }

    /// Fetch every data domain of the agent
    ///
    /// A missing adapter fails the execution. A failing adapter only drops
    /// its domain, unless every domain failed.
    async fn fetch(
        &self,
        subject: &Subject,
    ) -> Result<(Vec<DomainData>, Vec<DataDomain>), CapabilityError> {
        let adapters = self
            .agent
            .data_domains()
            .iter()
            .map(|domain| self.registry.require(*domain))
            .collect::<Result<Vec<_>, _>>()?;

        let calls = adapters.iter().map(|adapter| {
            let request = CapabilityRequest::new(adapter.domain(), subject.clone());
            async move { (adapter.domain(), adapter.call(request).await) }
        });

        let mut data = Vec::new();
        let mut unavailable = Vec::new();
        let mut last_error = None;
        for (domain, result) in join_all(calls).await {
            match result {
                Ok(payload) => data.push(DomainData { domain, payload }),
                Err(err) => {
                    warn!(agent = %self.agent, %domain, error = %err, "Data fetch failed");
                    unavailable.push(domain);
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) if data.is_empty() => Err(CapabilityError::new(
                err.kind,
                format!("no data available for {}: {}", self.agent, err.message),
            )),
            _ => Ok((data, unavailable)),
        }
    }
}

#[async_trait]
impl AnalysisNode for SpecialistNode {
    fn agent(&self) -> AgentId {
        self.agent
    }

    #[instrument(
        name = "specialist",
        skip_all,
        fields(agent = %self.agent, subject = %request.subject, revision = request.revision)
    )]
    async fn analyze(&self, request: AnalysisRequest) -> Result<Artifact, CapabilityError> {
        let generator = self.registry.require(DataDomain::TextGeneration)?;
        let (data, unavailable) = self.fetch(&request.subject).await?;

        let system = self.prompts.specialist_system(self.agent)?;
        let prompt = self.prompts.analysis_request(&AnalysisPrompt {
            agent: self.agent,
            subject: &request.subject,
            revision: request.revision,
            feedback: &request.feedback,
            data: &data,
            unavailable: &unavailable,
        })?;
        debug!(prompt_chars = prompt.len(), "Prompt rendered");

        let raw = text::generate(generator.as_ref(), &request.subject, &system, &prompt).await?;
        let fetched: Vec<DataDomain> = data.iter().map(|item| item.domain).collect();
        let artifact = AnalysisOutput::parse(&raw)?.into_artifact(self.agent, request.subject, &fetched);

        info!(
            sections = artifact.sections.len(),
            metrics = artifact.metrics.len(),
            sources = artifact.sources.len(),
            "Analysis produced"
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedText, StaticAdapter, analysis_json};
    use equity_core::{CapabilityErrorKind, ClaimCategory};
    use serde_json::json;

    fn node(agent: AgentId, registry: CapabilityRegistry) -> SpecialistNode {
        SpecialistNode::new(agent, registry, Arc::new(PromptLibrary::new().unwrap()))
    }

    fn subject() -> Subject {
        Subject::new("BBAS3").unwrap()
    }

    #[tokio::test]
    async fn test_produces_artifact_with_default_citations() {
        let text = Arc::new(ScriptedText::new([analysis_json(AgentId::Fundamentalist)]));
        let registry = CapabilityRegistry::new()
            .with(Arc::new(StaticAdapter::new(DataDomain::FinancialStatements, json!({"net_income": 37.8}))))
            .with(Arc::new(StaticAdapter::new(DataDomain::MarketData, json!({"close": 27.1}))))
            .with(text.clone());

        let artifact = node(AgentId::Fundamentalist, registry)
            .analyze(AnalysisRequest::first(subject()))
            .await
            .unwrap();

        assert_eq!(artifact.agent, AgentId::Fundamentalist);
        assert_eq!(artifact.subject, subject());
        assert!(artifact.section("Indebtedness").is_some());
        assert!(artifact.cited_categories().contains(&ClaimCategory::FinancialFigures));
        assert!(artifact.cited_categories().contains(&ClaimCategory::MarketData));
        assert!(text.prompts()[0].contains("37.8"));
    }

    #[tokio::test]
    async fn test_revision_prompt_carries_feedback() {
        let text = Arc::new(ScriptedText::new([analysis_json(AgentId::Sentiment)]));
        let registry = CapabilityRegistry::new()
            .with(Arc::new(StaticAdapter::new(DataDomain::News, json!(["Record profit"]))))
            .with(text.clone());

        let request = AnalysisRequest {
            subject: subject(),
            revision: 2,
            feedback: vec!["reviewer: headline misquoted".to_string()],
        };
        node(AgentId::Sentiment, registry).analyze(request).await.unwrap();

        let prompt = &text.prompts()[0];
        assert!(prompt.contains("This is revision 2"));
        assert!(prompt.contains("reviewer: headline misquoted"));
    }

    #[tokio::test]
    async fn test_partial_data_is_used_and_flagged() {
        let text = Arc::new(ScriptedText::new([analysis_json(AgentId::RiskManager)]));
        let registry = CapabilityRegistry::new()
            .with(Arc::new(StaticAdapter::new(DataDomain::MarketData, json!({"beta": 1.2}))))
            .with(Arc::new(StaticAdapter::down(DataDomain::News)))
            .with(text.clone());

        let artifact = node(AgentId::RiskManager, registry)
            .analyze(AnalysisRequest::first(subject()))
            .await
            .unwrap();

        assert!(text.prompts()[0].contains("No data could be retrieved for: news"));
        assert!(!artifact.cited_categories().contains(&ClaimCategory::NewsReferences));
    }

    #[tokio::test]
    async fn test_all_data_down_is_unavailable() {
        let registry = CapabilityRegistry::new()
            .with(Arc::new(StaticAdapter::down(DataDomain::MarketData)))
            .with(Arc::new(ScriptedText::new([analysis_json(AgentId::Quantitative)])));

        let err = node(AgentId::Quantitative, registry)
            .analyze(AnalysisRequest::first(subject()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, CapabilityErrorKind::Unavailable);
        assert!(err.message.contains("quantitative"));
    }

    #[tokio::test]
    async fn test_missing_adapter_is_unavailable() {
        let registry = CapabilityRegistry::new()
            .with(Arc::new(ScriptedText::new([analysis_json(AgentId::Sentiment)])));

        let err = node(AgentId::Sentiment, registry)
            .analyze(AnalysisRequest::first(subject()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, CapabilityErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_unparsable_answer_is_malformed() {
        let registry = CapabilityRegistry::new()
            .with(Arc::new(StaticAdapter::new(DataDomain::News, json!([]))))
            .with(Arc::new(ScriptedText::new(["<think>hmm</think>Sorry, I can't help."])));

        let err = node(AgentId::Sentiment, registry)
            .analyze(AnalysisRequest::first(subject()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, CapabilityErrorKind::MalformedData);
    }
}
