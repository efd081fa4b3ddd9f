//! Draft analyses produced by specialist agents

use crate::agent::AgentId;
use crate::subject::Subject;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Kinds of material claims an artifact can make
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimCategory {
    /// Figures taken from financial statements
    FinancialFigures,
    /// Price, volume and derived market data points
    MarketData,
    /// References to news or published commentary
    NewsReferences,
}

impl ClaimCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimCategory::FinancialFigures => "financial_figures",
            ClaimCategory::MarketData => "market_data",
            ClaimCategory::NewsReferences => "news_references",
        }
    }
}

impl fmt::Display for ClaimCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A titled block of the analysis body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub body: String,
}

impl Section {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// True when the body has no visible content
    pub fn is_blank(&self) -> bool {
        self.body.trim().is_empty()
    }
}

/// Value of a metric: numeric when the model reports a number, text otherwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetricValue::Number(value) => Some(*value),
            MetricValue::Text(_) => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Number(value) => write!(f, "{value}"),
            MetricValue::Text(text) => f.write_str(text),
        }
    }
}

/// An extracted or calculated figure (P/E, ROE, VaR, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialMetric {
    pub name: String,
    pub value: MetricValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Reference period (e.g. `2023`, `4Q23`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    pub category: ClaimCategory,
}

impl FinancialMetric {
    pub fn new(name: impl Into<String>, value: MetricValue, category: ClaimCategory) -> Self {
        Self {
            name: name.into(),
            value,
            unit: None,
            period: None,
            category,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = Some(period.into());
        self
    }
}

/// A source backing claims of one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub category: ClaimCategory,
    /// URL, document name or dataset identifier
    pub reference: String,
}

impl Citation {
    pub fn new(category: ClaimCategory, reference: impl Into<String>) -> Self {
        Self {
            category,
            reference: reference.into(),
        }
    }
}

/// The latest output of an analysis node for its branch
///
/// Artifacts are plain values: a node returns a new one on every attempt and
/// never sees the artifacts of other branches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub agent: AgentId,
    pub subject: Subject,
    pub summary: String,
    pub sections: Vec<Section>,
    pub metrics: Vec<FinancialMetric>,
    pub sources: Vec<Citation>,
    pub produced_at: DateTime<Utc>,
}

impl Artifact {
    /// Create an artifact with a summary and no body yet
    pub fn new(agent: AgentId, subject: Subject, summary: impl Into<String>) -> Self {
        Self {
            agent,
            subject,
            summary: summary.into(),
            sections: Vec::new(),
            metrics: Vec::new(),
            sources: Vec::new(),
            produced_at: Utc::now(),
        }
    }

    pub fn with_section(mut self, title: impl Into<String>, body: impl Into<String>) -> Self {
        self.sections.push(Section::new(title, body));
        self
    }

    pub fn with_metric(mut self, metric: FinancialMetric) -> Self {
        self.metrics.push(metric);
        self
    }

    /// Add a citation, ignoring exact duplicates
    pub fn with_citation(mut self, category: ClaimCategory, reference: impl Into<String>) -> Self {
        let citation = Citation::new(category, reference);
        if !self.sources.contains(&citation) {
            self.sources.push(citation);
        }
        self
    }

    /// Find a section by title, case-insensitively
    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|section| section.title.trim().eq_ignore_ascii_case(title.trim()))
    }

    /// Categories that have at least one citation
    pub fn cited_categories(&self) -> BTreeSet<ClaimCategory> {
        self.sources.iter().map(|citation| citation.category).collect()
    }

    /// Categories the artifact makes claims in: the agent's required
    /// categories plus every category a reported metric belongs to
    pub fn claimed_categories(&self) -> BTreeSet<ClaimCategory> {
        self.agent
            .required_categories()
            .iter()
            .copied()
            .chain(self.metrics.iter().map(|metric| metric.category))
            .collect()
    }

    /// Source references in citation order, without duplicates
    pub fn source_references(&self) -> Vec<String> {
        let mut references: Vec<String> = Vec::new();
        for citation in &self.sources {
            if !references.contains(&citation.reference) {
                references.push(citation.reference.clone());
            }
        }
        references
    }
}
