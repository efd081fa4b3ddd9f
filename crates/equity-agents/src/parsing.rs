//! Cleaning and parsing model output
//!
//! Models wrap their answers in `<think>` blocks and markdown fences and
//! sometimes add prose around the JSON. Everything here is lenient about the
//! wrapping and strict about the payload: a response that does not contain
//! the expected JSON object is [`CapabilityErrorKind::MalformedData`](equity_core::CapabilityErrorKind).

use equity_core::{
    AgentId, Artifact, CapabilityError, Citation, ClaimCategory, DataDomain, FinancialMetric,
    MetricValue, Section, Subject, Verdict,
};
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;

static THINK_TAGS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").ok());

static NUMBERED_HEADING: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\d+[.)]\s*").ok());

/// Title given to text that precedes the first heading of `details`
pub const OVERVIEW_SECTION: &str = "Overview";

/// Remove `<think>...</think>` blocks and surrounding whitespace
pub fn cleanup_think_tags(content: &str) -> String {
    match THINK_TAGS.as_ref() {
        Some(pattern) => pattern.replace_all(content, "").trim().to_string(),
        None => content.trim().to_string(),
    }
}

/// Strip a ```` ```json ```` (or bare ```` ``` ````) fence around the payload
pub fn clean_json_markdown(content: &str) -> String {
    if let Some((_, rest)) = content.split_once("```json") {
        return rest.split("```").next().unwrap_or(rest).trim().to_string();
    }
    if content.contains("```") {
        return content.replace("```", "").trim().to_string();
    }
    content.trim().to_string()
}

fn parse_json<T: DeserializeOwned>(raw: &str, what: &str) -> Result<T, CapabilityError> {
    let cleaned = clean_json_markdown(&cleanup_think_tags(raw));

    match serde_json::from_str(&cleaned) {
        Ok(value) => Ok(value),
        Err(first_error) => {
            // Prose around the object: retry on the outermost braces
            let embedded = cleaned
                .find('{')
                .zip(cleaned.rfind('}'))
                .filter(|(start, end)| start < end)
                .map(|(start, end)| &cleaned[start..=end]);

            embedded
                .and_then(|json| serde_json::from_str(json).ok())
                .ok_or_else(|| {
                    CapabilityError::malformed(format!("{what} is not valid JSON: {first_error}"))
                })
        }
    }
}

/// One metric as the model reports it
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricOutput {
    pub name: String,
    pub value: MetricValue,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
    /// Defaults to the agent's primary claim category
    #[serde(default)]
    pub category: Option<ClaimCategory>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A source as the model reports it: a bare label or a categorised citation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SourceOutput {
    Plain(String),
    Labelled {
        category: ClaimCategory,
        reference: String,
    },
}

/// Structured answer requested from every specialist
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisOutput {
    pub summary: String,
    /// Markdown; `#` headings become artifact sections
    pub details: String,
    #[serde(default)]
    pub metrics: Vec<MetricOutput>,
    #[serde(default)]
    pub sources: Option<Vec<SourceOutput>>,
}

impl AnalysisOutput {
    pub fn parse(raw: &str) -> Result<Self, CapabilityError> {
        parse_json(raw, "analysis output")
    }

    /// Build the artifact; `fetched` lists the domains whose adapter returned
    /// data and decides the default citations when the model gave none
    pub fn into_artifact(self, agent: AgentId, subject: Subject, fetched: &[DataDomain]) -> Artifact {
        let primary = agent
            .required_categories()
            .first()
            .copied()
            .unwrap_or(ClaimCategory::MarketData);

        let mut artifact = Artifact::new(agent, subject, self.summary.trim());
        artifact.sections = split_sections(&self.details);
        artifact.metrics = self
            .metrics
            .into_iter()
            .map(|metric| {
                let mut converted =
                    FinancialMetric::new(metric.name.trim(), metric.value, metric.category.unwrap_or(primary));
                converted.unit = metric.unit.filter(|unit| !unit.trim().is_empty());
                converted.period = metric.period.filter(|period| !period.trim().is_empty());
                converted
            })
            .collect();

        let sources = self.sources.unwrap_or_default();
        if sources.is_empty() {
            for domain in fetched {
                if let Some(category) = domain.claim_category() {
                    artifact = artifact.with_citation(category, default_reference(*domain));
                }
            }
        } else {
            for source in sources {
                artifact = match source {
                    SourceOutput::Plain(reference) if reference.trim().is_empty() => artifact,
                    SourceOutput::Plain(reference) => artifact.with_citation(primary, reference.trim()),
                    SourceOutput::Labelled { category, reference } => {
                        artifact.with_citation(category, reference.trim())
                    }
                };
            }
        }

        artifact
    }
}

/// Citation used when the model names no sources for data it was given
pub fn default_reference(domain: DataDomain) -> &'static str {
    match domain {
        DataDomain::FinancialStatements => "CVM - Portal Dados Abertos",
        DataDomain::MarketData => "Yahoo Finance",
        DataDomain::News => "News search",
        DataDomain::TextGeneration => "Model knowledge base",
    }
}

/// Split markdown into sections at each heading
pub fn split_sections(details: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut title = OVERVIEW_SECTION.to_string();
    let mut body = String::new();

    for line in details.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') {
            flush(&title, &mut body, &mut sections);
            title = heading_title(trimmed);
        } else {
            body.push_str(line);
            body.push('\n');
        }
    }
    flush(&title, &mut body, &mut sections);

    sections
}

/// Text before the first heading only becomes a section when non-blank
fn flush(title: &str, body: &mut String, sections: &mut Vec<Section>) {
    if title != OVERVIEW_SECTION || !body.trim().is_empty() {
        sections.push(Section::new(title, body.trim()));
    }
    body.clear();
}

fn heading_title(line: &str) -> String {
    let text = line.trim_start_matches('#').trim().trim_end_matches('#').trim();
    let text = text.trim_matches('*').trim();
    match NUMBERED_HEADING.as_ref() {
        Some(pattern) => pattern.replace(text, "").trim().to_string(),
        None => text.to_string(),
    }
}

/// Structured answer requested from the reviewer model
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReviewerOutput {
    pub approved: bool,
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl ReviewerOutput {
    pub fn parse(raw: &str) -> Result<Self, CapabilityError> {
        parse_json(raw, "reviewer output")
    }

    /// An approval drops any comments; a rejection carries them as reasons
    pub fn into_verdict(self) -> Verdict {
        if self.approved {
            return Verdict::approve();
        }

        let comments = self
            .comments
            .into_iter()
            .map(|comment| format!("reviewer: {}", comment.trim()));
        let recommendations = self
            .recommendations
            .into_iter()
            .map(|recommendation| format!("recommendation: {}", recommendation.trim()));
        Verdict::reject(comments.chain(recommendations))
    }
}

/// Citations that name a category, for prompts
pub fn describe_sources(sources: &[Citation]) -> String {
    sources
        .iter()
        .map(|citation| format!("{} ({})", citation.reference, citation.category))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use equity_core::verdict::reasons;

    fn subject() -> Subject {
        Subject::new("ITUB4").unwrap()
    }

    #[test]
    fn test_cleanup_think_tags() {
        let raw = "<think>\nthe user wants JSON\n</think>\n{\"a\": 1}<think>again</think>";
        assert_eq!(cleanup_think_tags(raw), "{\"a\": 1}");
        assert_eq!(cleanup_think_tags("  plain  "), "plain");
    }

    #[test]
    fn test_clean_json_markdown() {
        assert_eq!(clean_json_markdown("```json\n{\"a\": 1}\n```\ntrailing"), "{\"a\": 1}");
        assert_eq!(clean_json_markdown("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(clean_json_markdown("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_tolerates_surrounding_prose() {
        let raw = "Here is the analysis:\n{\"summary\": \"ok\", \"details\": \"## Trend\\nUp\"}\nThanks!";
        let output = AnalysisOutput::parse(raw).unwrap();
        assert_eq!(output.summary, "ok");
        assert!(output.sources.is_none());
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let err = AnalysisOutput::parse("I cannot analyse this ticker.").unwrap_err();
        assert_eq!(err.kind, equity_core::CapabilityErrorKind::MalformedData);
    }

    #[test]
    fn test_split_sections() {
        let details = "Intro line\n## 1. Valuation\nP/L of 8x\n### **Profitability**\nROE 21%\n## Indebtedness ##\n";
        let sections = split_sections(details);
        let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Overview", "Valuation", "Profitability", "Indebtedness"]);
        assert_eq!(sections[1].body, "P/L of 8x");
        assert!(sections[3].is_blank());

        assert!(split_sections("## Trend\nUp").iter().all(|s| s.title != OVERVIEW_SECTION));
    }

    #[test]
    fn test_into_artifact_uses_model_sources() {
        let raw = r###"{
            "summary": "Cheap bank",
            "details": "## Valuation\nLow multiples",
            "metrics": [
                {"name": "P/L", "value": 7.9, "unit": "x", "period": "2024"},
                {"name": "Price", "value": 35.2, "unit": "BRL", "period": "", "category": "market_data"}
            ],
            "sources": ["CVM DFP 2024", {"category": "market_data", "reference": "B3"}]
        }"###;
        let artifact = AnalysisOutput::parse(raw)
            .unwrap()
            .into_artifact(AgentId::Fundamentalist, subject(), &[DataDomain::FinancialStatements]);

        assert_eq!(artifact.metrics[0].category, ClaimCategory::FinancialFigures);
        assert_eq!(artifact.metrics[1].category, ClaimCategory::MarketData);
        assert!(artifact.metrics[1].period.is_none());
        assert_eq!(artifact.sources.len(), 2);
        assert_eq!(artifact.sources[0].category, ClaimCategory::FinancialFigures);
        assert_eq!(artifact.section("valuation").unwrap().body, "Low multiples");
    }

    #[test]
    fn test_default_citations_only_for_fetched_domains() {
        let output = AnalysisOutput {
            summary: "Elevated risk".to_string(),
            details: "## Market Risk\nHigh beta".to_string(),
            metrics: Vec::new(),
            sources: Some(Vec::new()),
        };
        let artifact = output.into_artifact(AgentId::RiskManager, subject(), &[DataDomain::MarketData]);

        assert_eq!(
            artifact.sources,
            vec![Citation::new(ClaimCategory::MarketData, "Yahoo Finance")]
        );
    }

    #[test]
    fn test_reviewer_output_to_verdict() {
        let approved = ReviewerOutput::parse("```json\n{\"approved\": true, \"comments\": [\"fine\"]}\n```").unwrap();
        assert!(approved.into_verdict().approved());

        let rejected = ReviewerOutput::parse(
            r#"{"approved": false, "comments": ["P/L contradicts price"], "recommendations": ["recompute P/L"]}"#,
        )
        .unwrap()
        .into_verdict();
        assert_eq!(
            rejected.reasons(),
            ["reviewer: P/L contradicts price", "recommendation: recompute P/L"]
        );

        let bare = ReviewerOutput::parse(r#"{"approved": false}"#).unwrap().into_verdict();
        assert_eq!(bare.reasons(), [reasons::UNSPECIFIED]);
    }

    #[test]
    fn test_describe_sources() {
        let sources = vec![Citation::new(ClaimCategory::NewsReferences, "Valor Econômico")];
        assert_eq!(describe_sources(&sources), "Valor Econômico (news_references)");
    }
}
