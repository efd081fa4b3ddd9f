//! Reviewer gatekeeper: structural rules, then a model review

use crate::parsing::ReviewerOutput;
use crate::prompts::PromptLibrary;
use crate::text;
use async_trait::async_trait;
use equity_core::{Artifact, CapabilityAdapter, CapabilityError, Verdict};
use equity_workflow::{Gatekeeper, RuleGatekeeper};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Gatekeeper that applies [`RuleGatekeeper`] and, when those rules pass,
/// asks a language model for a second opinion
///
/// Without a text generator it behaves exactly like the rules alone. A model
/// failure is returned as an error; the engine turns it into a
/// `gatekeeper_failed` rejection.
pub struct ReviewerGatekeeper {
    rules: RuleGatekeeper,
    generator: Option<Arc<dyn CapabilityAdapter>>,
    prompts: Arc<PromptLibrary>,
}

impl ReviewerGatekeeper {
    pub fn new(prompts: Arc<PromptLibrary>) -> Self {
        Self {
            rules: RuleGatekeeper::new(),
            generator: None,
            prompts,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn CapabilityAdapter>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_rules(mut self, rules: RuleGatekeeper) -> Self {
        self.rules = rules;
        self
    }
}

#[async_trait]
impl Gatekeeper for ReviewerGatekeeper {
    #[instrument(name = "review", skip_all, fields(agent = %artifact.agent))]
    async fn review(&self, artifact: &Artifact) -> Result<Verdict, CapabilityError> {
        let violations = self.rules.check(artifact);
        if !violations.is_empty() {
            debug!(count = violations.len(), "Rule violations, skipping model review");
            return Ok(Verdict::from_reasons(violations));
        }

        let Some(generator) = &self.generator else {
            return Ok(Verdict::approve());
        };

        let system = self.prompts.reviewer_system()?;
        let prompt = self.prompts.review_request(artifact)?;
        let raw = text::generate(generator.as_ref(), &artifact.subject, &system, &prompt).await?;

        Ok(ReviewerOutput::parse(&raw)?.into_verdict())
    }
}
