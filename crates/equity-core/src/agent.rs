//! The fixed roster of specialist analysts

use crate::artifact::ClaimCategory;
use crate::capability::DataDomain;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies one specialist analysis agent
///
/// The set is closed: a run's roster is a subset of these variants, and each
/// member owns exactly one branch of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentId {
    /// Fundamental analysis from financial statements and valuation
    Fundamentalist,
    /// Technical/quantitative analysis from price and volume history
    Quantitative,
    /// News flow and market sentiment
    Sentiment,
    /// Risk assessment across market and news signals
    RiskManager,
}

impl AgentId {
    /// Every agent, in default roster order
    pub const ALL: [AgentId; 4] = [
        AgentId::Fundamentalist,
        AgentId::Quantitative,
        AgentId::Sentiment,
        AgentId::RiskManager,
    ];

    /// Stable machine name (`risk_manager`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::Fundamentalist => "fundamentalist",
            AgentId::Quantitative => "quantitative",
            AgentId::Sentiment => "sentiment",
            AgentId::RiskManager => "risk_manager",
        }
    }

    /// Display persona used in reports
    pub fn persona(&self) -> &'static str {
        match self {
            AgentId::Fundamentalist => "Graham",
            AgentId::Quantitative => "Vector",
            AgentId::Sentiment => "Sonar",
            AgentId::RiskManager => "Sentry",
        }
    }

    /// Data domains this agent reads through capability adapters
    pub fn data_domains(&self) -> &'static [DataDomain] {
        match self {
            AgentId::Fundamentalist => &[DataDomain::FinancialStatements, DataDomain::MarketData],
            AgentId::Quantitative => &[DataDomain::MarketData],
            AgentId::Sentiment => &[DataDomain::News],
            AgentId::RiskManager => &[DataDomain::MarketData, DataDomain::News],
        }
    }

    /// Claim categories that must always be backed by a citation
    pub fn required_categories(&self) -> &'static [ClaimCategory] {
        match self {
            AgentId::Fundamentalist => &[ClaimCategory::FinancialFigures],
            AgentId::Quantitative => &[ClaimCategory::MarketData],
            AgentId::Sentiment => &[ClaimCategory::NewsReferences],
            AgentId::RiskManager => &[ClaimCategory::MarketData],
        }
    }

    /// Section titles a complete artifact from this agent carries
    pub fn expected_sections(&self) -> &'static [&'static str] {
        match self {
            AgentId::Fundamentalist => &["Valuation", "Profitability", "Indebtedness"],
            AgentId::Quantitative => &["Trend", "Momentum", "Volatility"],
            AgentId::Sentiment => &["Headlines", "Sentiment"],
            AgentId::RiskManager => &["Market Risk", "Business Risk"],
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        AgentId::ALL
            .into_iter()
            .find(|agent| agent.as_str() == normalized || agent.persona().to_lowercase() == normalized)
            .ok_or_else(|| Error::UnknownAgent(s.to_string()))
    }
}
