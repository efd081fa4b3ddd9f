//! Final synthesis of approved artifacts

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use equity_core::{AgentId, Artifact, CapabilityError, Subject};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An agent input that was left out of the document, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedInput {
    pub agent: AgentId,
    pub reasons: Vec<String>,
}

/// An agent input that went into the document, with its sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludedInput {
    pub agent: AgentId,
    pub sources: Vec<String>,
}

/// Everything the synthesis step may see
///
/// `approved` is in roster order. Exhausted branches appear only in
/// `unavailable`, as metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisInput {
    pub run_id: Uuid,
    pub subject: Subject,
    pub approved: Vec<Artifact>,
    pub unavailable: Vec<ExcludedInput>,
}

/// The final output of a successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionDocument {
    pub run_id: Uuid,
    pub subject: Subject,
    pub body: String,
    pub included: Vec<IncludedInput>,
    pub excluded: Vec<ExcludedInput>,
    pub created_at: DateTime<Utc>,
}

impl DecisionDocument {
    /// Build the document around a synthesized body
    ///
    /// The included and excluded audit lists derive from the input alone, so
    /// the same approved set always yields the same audit.
    pub fn assemble(input: &SynthesisInput, body: String) -> Self {
        Self {
            run_id: input.run_id,
            subject: input.subject.clone(),
            body,
            included: input
                .approved
                .iter()
                .map(|artifact| IncludedInput {
                    agent: artifact.agent,
                    sources: artifact.source_references(),
                })
                .collect(),
            excluded: input.unavailable.clone(),
            created_at: Utc::now(),
        }
    }

    pub fn includes(&self, agent: AgentId) -> bool {
        self.included.iter().any(|input| input.agent == agent)
    }
}

/// Produces the document body from the joined outcomes
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn compose(&self, input: &SynthesisInput) -> Result<String, CapabilityError>;
}

/// Deterministic synthesizer that lays out each approved artifact in turn
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestSynthesizer;

impl DigestSynthesizer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(input: &SynthesisInput) -> String {
        let mut body = format!("# Investment Report: {}\n", input.subject);

        for artifact in &input.approved {
            body.push_str(&format!(
                "\n## {} ({})\n\n{}\n",
                artifact.agent.persona(),
                artifact.agent,
                artifact.summary.trim()
            ));

            for section in &artifact.sections {
                body.push_str(&format!("\n### {}\n\n{}\n", section.title, section.body.trim()));
            }

            if !artifact.metrics.is_empty() {
                body.push_str("\n| Metric | Value | Period |\n|---|---|---|\n");
                for metric in &artifact.metrics {
                    let value = match &metric.unit {
                        Some(unit) => format!("{} {unit}", metric.value),
                        None => metric.value.to_string(),
                    };
                    body.push_str(&format!(
                        "| {} | {value} | {} |\n",
                        metric.name,
                        metric.period.as_deref().unwrap_or("-")
                    ));
                }
            }

            let sources = artifact.source_references();
            if !sources.is_empty() {
                body.push_str(&format!("\nSources: {}\n", sources.join("; ")));
            }
        }

        if !input.unavailable.is_empty() {
            body.push_str("\n## Unavailable analyses\n\n");
            for excluded in &input.unavailable {
                body.push_str(&format!(
                    "- {} ({}): {}\n",
                    excluded.agent.persona(),
                    excluded.agent,
                    excluded.reasons.join("; ")
                ));
            }
        }

        body
    }
}

#[async_trait]
impl Synthesizer for DigestSynthesizer {
    async fn compose(&self, input: &SynthesisInput) -> Result<String, CapabilityError> {
        Ok(Self::render(input))
    }
}
