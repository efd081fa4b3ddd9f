//! Gatekeeper contract and content-agnostic acceptance rules

use async_trait::async_trait;
use equity_core::verdict::reasons;
use equity_core::{Artifact, CapabilityError, Verdict};
use std::collections::HashMap;

/// Validates one artifact submission
///
/// Called exactly once per submission and never with more than one branch's
/// artifact. An `Err` is turned into a `gatekeeper_failed` rejection by the
/// engine.
#[async_trait]
pub trait Gatekeeper: Send + Sync {
    async fn review(&self, artifact: &Artifact) -> Result<Verdict, CapabilityError>;
}

/// Structural rules every artifact must satisfy
///
/// - a non-empty summary and every expected section of its agent present
///   and non-empty (`empty_section: <title>`)
/// - at least one citation for each claim category it makes
///   (`missing_source: <category>`)
/// - no two numeric metrics with the same name and period but different
///   values (`contradiction: <name> (<period>)`)
#[derive(Debug, Clone, Copy)]
pub struct RuleGatekeeper {
    tolerance: f64,
}

impl RuleGatekeeper {
    pub fn new() -> Self {
        Self { tolerance: 1e-6 }
    }

    /// Relative tolerance when comparing repeated metric values
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance.abs();
        self
    }

    /// Every rule violation, in rule order
    pub fn check(&self, artifact: &Artifact) -> Vec<String> {
        let mut found = Vec::new();
        Self::check_structure(artifact, &mut found);
        Self::check_sources(artifact, &mut found);
        self.check_consistency(artifact, &mut found);
        found
    }

    fn check_structure(artifact: &Artifact, found: &mut Vec<String>) {
        if artifact.summary.trim().is_empty() {
            found.push(format!("{}: summary", reasons::EMPTY_SECTION));
        }

        for title in artifact.agent.expected_sections() {
            let blank = artifact.section(title).is_none_or(|section| section.is_blank());
            if blank {
                found.push(format!("{}: {title}", reasons::EMPTY_SECTION));
            }
        }
    }

    fn check_sources(artifact: &Artifact, found: &mut Vec<String>) {
        let cited = artifact.cited_categories();
        for category in artifact.claimed_categories() {
            if !cited.contains(&category) {
                found.push(format!("{}: {category}", reasons::MISSING_SOURCE));
            }
        }
    }

    fn check_consistency(&self, artifact: &Artifact, found: &mut Vec<String>) {
        let mut seen: HashMap<(String, Option<String>), f64> = HashMap::new();

        for metric in &artifact.metrics {
            let Some(value) = metric.value.as_number() else {
                continue;
            };
            let key = (
                metric.name.trim().to_lowercase(),
                metric.period.as_ref().map(|period| period.trim().to_lowercase()),
            );

            match seen.get(&key) {
                Some(previous) if !self.same_value(*previous, value) => {
                    let reason = match &metric.period {
                        Some(period) => {
                            format!("{}: {} ({period})", reasons::CONTRADICTION, metric.name.trim())
                        }
                        None => format!("{}: {}", reasons::CONTRADICTION, metric.name.trim()),
                    };
                    if !found.contains(&reason) {
                        found.push(reason);
                    }
                }
                Some(_) => {}
                None => {
                    seen.insert(key, value);
                }
            }
        }
    }

    fn same_value(&self, a: f64, b: f64) -> bool {
        let scale = a.abs().max(b.abs()).max(1.0);
        (a - b).abs() <= self.tolerance * scale
    }
}

impl Default for RuleGatekeeper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gatekeeper for RuleGatekeeper {
    async fn review(&self, artifact: &Artifact) -> Result<Verdict, CapabilityError> {
        let found = self.check(artifact);
        tracing::debug!(agent = %artifact.agent, violations = found.len(), "Rule review");
        Ok(Verdict::from_reasons(found))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equity_core::{AgentId, ClaimCategory, FinancialMetric, MetricValue, Subject};

    fn complete_quant() -> Artifact {
        Artifact::new(AgentId::Quantitative, Subject::new("BBAS3").unwrap(), "Uptrend intact")
            .with_section("Trend", "Above the 200-day average")
            .with_section("Momentum", "RSI at 61")
            .with_section("Volatility", "ATR stable")
            .with_citation(ClaimCategory::MarketData, "Yahoo Finance")
    }

    #[tokio::test]
    async fn test_complete_artifact_is_approved() {
        let verdict = RuleGatekeeper::new().review(&complete_quant()).await.unwrap();
        assert!(verdict.approved());
    }

    #[test]
    fn test_missing_source_per_claimed_category() {
        let mut artifact = complete_quant().with_metric(FinancialMetric::new(
            "Net margin",
            MetricValue::Number(0.12),
            ClaimCategory::FinancialFigures,
        ));
        artifact.sources.clear();

        let found = RuleGatekeeper::new().check(&artifact);
        assert_eq!(
            found,
            vec![
                "missing_source: financial_figures".to_string(),
                "missing_source: market_data".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_and_missing_sections() {
        let mut artifact = complete_quant();
        artifact.summary = "  ".to_string();
        artifact.sections.retain(|section| section.title != "Momentum");
        artifact.sections[0].body = String::new();

        let found = RuleGatekeeper::new().check(&artifact);
        assert_eq!(
            found,
            vec![
                "empty_section: summary".to_string(),
                "empty_section: Trend".to_string(),
                "empty_section: Momentum".to_string(),
            ]
        );
    }

    #[test]
    fn test_contradicting_figures() {
        let metric = |value: f64, period: &str| {
            FinancialMetric::new("RSI", MetricValue::Number(value), ClaimCategory::MarketData)
                .with_period(period)
        };
        let artifact = complete_quant()
            .with_metric(metric(61.0, "14d"))
            .with_metric(metric(61.0, "14d"))
            .with_metric(metric(48.0, "14d"))
            .with_metric(metric(30.0, "28d"));

        let found = RuleGatekeeper::new().check(&artifact);
        assert_eq!(found, vec!["contradiction: RSI (14d)".to_string()]);
    }

    #[test]
    fn test_violations_reported_in_rule_order() {
        let metric = |value: f64| {
            FinancialMetric::new("ROE", MetricValue::Number(value), ClaimCategory::FinancialFigures)
        };
        let mut artifact = complete_quant().with_metric(metric(0.18)).with_metric(metric(0.25));
        artifact.summary.clear();

        let found = RuleGatekeeper::new().check(&artifact);
        assert_eq!(
            found,
            vec![
                "empty_section: summary".to_string(),
                "missing_source: financial_figures".to_string(),
                "contradiction: ROE".to_string(),
            ]
        );
    }

    #[test]
    fn test_text_metrics_never_contradict() {
        let artifact = complete_quant()
            .with_metric(FinancialMetric::new(
                "Trend",
                MetricValue::Text("up".to_string()),
                ClaimCategory::MarketData,
            ))
            .with_metric(FinancialMetric::new(
                "Trend",
                MetricValue::Text("sideways".to_string()),
                ClaimCategory::MarketData,
            ));

        assert!(RuleGatekeeper::new().check(&artifact).is_empty());
    }
}
