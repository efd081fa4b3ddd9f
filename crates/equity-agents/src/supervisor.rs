//! Supervisor synthesis: the final report written by a language model

use crate::prompts::PromptLibrary;
use crate::text;
use async_trait::async_trait;
use equity_core::{CapabilityAdapter, CapabilityError};
use equity_workflow::{SynthesisInput, Synthesizer};
use std::sync::Arc;
use tracing::{info, instrument};

/// Synthesizer that asks the model to consolidate the approved artifacts
pub struct SupervisorSynthesizer {
    generator: Arc<dyn CapabilityAdapter>,
    prompts: Arc<PromptLibrary>,
}

impl SupervisorSynthesizer {
    pub fn new(generator: Arc<dyn CapabilityAdapter>, prompts: Arc<PromptLibrary>) -> Self {
        Self { generator, prompts }
    }
}

#[async_trait]
impl Synthesizer for SupervisorSynthesizer {
    #[instrument(name = "supervisor", skip_all, fields(subject = %input.subject))]
    async fn compose(&self, input: &SynthesisInput) -> Result<String, CapabilityError> {
        let system = self.prompts.supervisor_system()?;
        let prompt = self.prompts.synthesis_request(input)?;
        let report = text::generate(self.generator.as_ref(), &input.subject, &system, &prompt).await?;

        info!(
            approved = input.approved.len(),
            unavailable = input.unavailable.len(),
            chars = report.len(),
            "Final report written"
        );
        Ok(report)
    }
}
