//! MiniJinja prompt templates for the specialists, reviewer and supervisor

use equity_core::{AgentId, Artifact, CapabilityError, ClaimCategory, DataDomain, Subject};
use equity_workflow::SynthesisInput;
use minijinja::Environment;
use minijinja::value::Value;
use serde_json::json;

use crate::parsing::describe_sources;

/// Longest payload excerpt, in characters, passed to a prompt per domain
pub const MAX_PAYLOAD_CHARS: usize = 6_000;

const SPECIALIST_SYSTEM: &str = r###"You are {{ persona }}, a {{ role }} covering Brazilian listed equities.
{{ focus }}

Answer with a single JSON object and nothing else:
{
  "summary": executive summary in two to four sentences,
  "details": markdown analysis with one "## " heading per section,
  "metrics": [{"name", "value", "unit", "period", "category"}],
  "sources": [{"category", "reference"}]
}
Required sections: {{ sections | join(', ') }}.
Valid categories: financial_figures, market_data, news_references.
Cite a source for every category you make claims in ({{ categories | join(', ') }} at least).
Only report figures present in the data you are given. Never report two different values for the same metric and period."###;

const ANALYSIS_REQUEST: &str = r#"Produce the structured analysis for {{ subject }}.
{% if revision > 0 %}
This is revision {{ revision }}. The reviewer rejected your previous draft for these reasons:
{% for reason in feedback %}- {{ reason }}
{% endfor %}Fix every point before answering.
{% endif %}
{% for item in data %}
=== {{ item.domain }} ===
{{ item.payload }}
{% endfor %}
{% if unavailable %}
No data could be retrieved for: {{ unavailable | join(', ') }}. Do not make claims in those areas.
{% endif %}"#;

const REVIEWER_SYSTEM: &str = r#"You are the review desk of an equity research team. You check one analyst draft at a time for
internal consistency, unsupported claims and missing reasoning. Be strict but concrete.

Answer with a single JSON object and nothing else:
{"approved": true or false, "comments": [specific problems], "recommendations": [specific fixes]}
Approve only when the draft needs no changes."#;

const REVIEW_REQUEST: &str = r#"Review the {{ agent }} draft ({{ persona }}) for {{ subject }}.

Summary: {{ summary }}
{% for section in sections %}
## {{ section.title }}
{{ section.body }}
{% endfor %}
{% if metrics %}
Metrics:
{% for metric in metrics %}- {{ metric.name }} = {{ metric.value }}{% if metric.unit %} {{ metric.unit }}{% endif %}{% if metric.period %} ({{ metric.period }}){% endif %}
{% endfor %}{% endif %}
Sources: {{ sources }}"#;

const SUPERVISOR_SYSTEM: &str = r#"You are the head of research. Consolidate the approved specialist analyses into one investment report
in markdown: an executive summary, one section per analysis, a consolidated view of risks, and a final
recommendation with its rationale. Mention any analysis that was unavailable and what that leaves uncovered.
Use only the material you are given."#;

const SYNTHESIS_REQUEST: &str = r#"Write the final report for {{ subject }}.
{% for analysis in analyses %}
--- {{ analysis.persona }} ({{ analysis.agent }}) ---
Summary: {{ analysis.summary }}
{% for section in analysis.sections %}
## {{ section.title }}
{{ section.body }}
{% endfor %}
Sources: {{ analysis.sources }}
{% endfor %}
{% if unavailable %}
Unavailable analyses:
{% for item in unavailable %}- {{ item.persona }} ({{ item.agent }}): {{ item.reasons | join('; ') }}
{% endfor %}{% endif %}"#;

/// Data fetched for one domain, rendered into an analysis prompt
#[derive(Debug, Clone, PartialEq)]
pub struct DomainData {
    pub domain: DataDomain,
    pub payload: serde_json::Value,
}

/// Inputs of one analysis prompt
#[derive(Debug, Clone)]
pub struct AnalysisPrompt<'a> {
    pub agent: AgentId,
    pub subject: &'a Subject,
    pub revision: u32,
    pub feedback: &'a [String],
    pub data: &'a [DomainData],
    pub unavailable: &'a [DataDomain],
}

/// Compiled prompt templates
pub struct PromptLibrary {
    env: Environment<'static>,
}

impl PromptLibrary {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("specialist_system", SPECIALIST_SYSTEM)?;
        env.add_template("analysis_request", ANALYSIS_REQUEST)?;
        env.add_template("reviewer_system", REVIEWER_SYSTEM)?;
        env.add_template("review_request", REVIEW_REQUEST)?;
        env.add_template("supervisor_system", SUPERVISOR_SYSTEM)?;
        env.add_template("synthesis_request", SYNTHESIS_REQUEST)?;
        Ok(Self { env })
    }

    fn render(&self, name: &str, vars: &serde_json::Value) -> Result<String, CapabilityError> {
        self.env
            .get_template(name)
            .and_then(|template| template.render(Value::from_serialize(vars)))
            .map(|text| text.trim().to_string())
            .map_err(|e| CapabilityError::internal(format!("prompt '{name}' failed to render: {e}")))
    }

    /// System prompt for a specialist
    pub fn specialist_system(&self, agent: AgentId) -> Result<String, CapabilityError> {
        let (role, focus) = match agent {
            AgentId::Fundamentalist => (
                "fundamental analyst",
                "Judge the business from its official financial statements: valuation, profitability and indebtedness.",
            ),
            AgentId::Quantitative => (
                "quantitative analyst",
                "Read the price and volume history: trend, momentum and volatility. Do not discuss fundamentals.",
            ),
            AgentId::Sentiment => (
                "market sentiment analyst",
                "Classify the recent news flow and what it implies for investor sentiment.",
            ),
            AgentId::RiskManager => (
                "risk manager",
                "Assess market risk from price behaviour and business risk from the news flow.",
            ),
        };
        let categories: Vec<&str> = agent.required_categories().iter().map(ClaimCategory::as_str).collect();

        self.render(
            "specialist_system",
            &json!({
                "persona": agent.persona(),
                "role": role,
                "focus": focus,
                "sections": agent.expected_sections(),
                "categories": categories,
            }),
        )
    }

    /// User prompt for one analysis execution
    pub fn analysis_request(&self, prompt: &AnalysisPrompt<'_>) -> Result<String, CapabilityError> {
        let data: Vec<serde_json::Value> = prompt
            .data
            .iter()
            .map(|item| {
                let payload = serde_json::to_string_pretty(&item.payload).unwrap_or_default();
                json!({
                    "domain": item.domain.as_str(),
                    "payload": truncate(&payload, MAX_PAYLOAD_CHARS),
                })
            })
            .collect();
        let unavailable: Vec<&str> = prompt.unavailable.iter().map(DataDomain::as_str).collect();

        self.render(
            "analysis_request",
            &json!({
                "agent": prompt.agent.as_str(),
                "subject": prompt.subject.identifier(),
                "revision": prompt.revision,
                "feedback": prompt.feedback,
                "data": data,
                "unavailable": unavailable,
            }),
        )
    }

    pub fn reviewer_system(&self) -> Result<String, CapabilityError> {
        self.render("reviewer_system", &json!({}))
    }

    /// User prompt asking the reviewer to judge one artifact
    pub fn review_request(&self, artifact: &Artifact) -> Result<String, CapabilityError> {
        let metrics: Vec<serde_json::Value> = artifact
            .metrics
            .iter()
            .map(|metric| {
                json!({
                    "name": metric.name,
                    "value": metric.value.to_string(),
                    "unit": metric.unit,
                    "period": metric.period,
                })
            })
            .collect();

        self.render(
            "review_request",
            &json!({
                "agent": artifact.agent.as_str(),
                "persona": artifact.agent.persona(),
                "subject": artifact.subject.identifier(),
                "summary": artifact.summary,
                "sections": artifact.sections,
                "metrics": metrics,
                "sources": describe_sources(&artifact.sources),
            }),
        )
    }

    pub fn supervisor_system(&self) -> Result<String, CapabilityError> {
        self.render("supervisor_system", &json!({}))
    }

    /// User prompt for the final report
    pub fn synthesis_request(&self, input: &SynthesisInput) -> Result<String, CapabilityError> {
        let analyses: Vec<serde_json::Value> = input
            .approved
            .iter()
            .map(|artifact| {
                json!({
                    "agent": artifact.agent.as_str(),
                    "persona": artifact.agent.persona(),
                    "summary": artifact.summary,
                    "sections": artifact.sections,
                    "sources": describe_sources(&artifact.sources),
                })
            })
            .collect();
        let unavailable: Vec<serde_json::Value> = input
            .unavailable
            .iter()
            .map(|excluded| {
                json!({
                    "agent": excluded.agent.as_str(),
                    "persona": excluded.agent.persona(),
                    "reasons": excluded.reasons,
                })
            })
            .collect();

        self.render(
            "synthesis_request",
            &json!({
                "subject": input.subject.identifier(),
                "analyses": analyses,
                "unavailable": unavailable,
            }),
        )
    }
}

/// Cut `text` to at most `limit` characters, marking the cut
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}
