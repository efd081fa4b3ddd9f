//! The capability adapter contract
//!
//! Every external call a node makes (financial statements, market prices,
//! news, text generation) goes through [`CapabilityAdapter`]. The core treats
//! adapters as fungible: a request goes in, structured JSON or a
//! [`CapabilityError`] comes out, whatever provider sits behind it.

use crate::artifact::ClaimCategory;
use crate::subject::Subject;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The data domain an adapter serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataDomain {
    /// Balance sheets, income statements, cash flows
    FinancialStatements,
    /// Price and volume history, quotes
    MarketData,
    /// News articles and sentiment signals
    News,
    /// Language-model text generation
    TextGeneration,
}

impl DataDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataDomain::FinancialStatements => "financial_statements",
            DataDomain::MarketData => "market_data",
            DataDomain::News => "news",
            DataDomain::TextGeneration => "text_generation",
        }
    }

    /// The claim category data from this domain backs, if any
    pub fn claim_category(&self) -> Option<ClaimCategory> {
        match self {
            DataDomain::FinancialStatements => Some(ClaimCategory::FinancialFigures),
            DataDomain::MarketData => Some(ClaimCategory::MarketData),
            DataDomain::News => Some(ClaimCategory::NewsReferences),
            DataDomain::TextGeneration => None,
        }
    }
}

impl fmt::Display for DataDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an external call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityErrorKind {
    /// The adapter is missing, unreachable, or refused the request
    Unavailable,
    /// Upstream data could not be parsed into the expected shape
    MalformedData,
    /// The call did not finish within its time budget
    Timeout,
    /// A quota, rate or token budget was exhausted
    BudgetExceeded,
    /// The node itself failed (panic, invariant violation)
    Internal,
}

impl fmt::Display for CapabilityErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CapabilityErrorKind::Unavailable => "unavailable",
            CapabilityErrorKind::MalformedData => "malformed_data",
            CapabilityErrorKind::Timeout => "timeout",
            CapabilityErrorKind::BudgetExceeded => "budget_exceeded",
            CapabilityErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Failure of an external capability call
///
/// Inside a run this never escapes a branch: the engine turns it into a
/// synthetic rejection that consumes one revision attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct CapabilityError {
    pub kind: CapabilityErrorKind,
    pub message: String,
}

impl CapabilityError {
    pub fn new(kind: CapabilityErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(CapabilityErrorKind::Unavailable, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(CapabilityErrorKind::MalformedData, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(CapabilityErrorKind::Timeout, message)
    }

    pub fn budget_exceeded(message: impl Into<String>) -> Self {
        Self::new(CapabilityErrorKind::BudgetExceeded, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CapabilityErrorKind::Internal, message)
    }

    /// Whether repeating the same call might succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            CapabilityErrorKind::Unavailable | CapabilityErrorKind::Timeout
        )
    }
}

/// A domain-specific request to an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityRequest {
    pub domain: DataDomain,
    pub subject: Subject,
    /// Adapter-specific parameters (period, query, prompt, ...)
    #[serde(default)]
    pub params: serde_json::Value,
}

impl CapabilityRequest {
    pub fn new(domain: DataDomain, subject: Subject) -> Self {
        Self {
            domain,
            subject,
            params: serde_json::Value::Null,
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }
}

/// Uniform interface over every external data or text-generation call
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use equity_core::{CapabilityAdapter, CapabilityError, CapabilityRequest, DataDomain};
/// use serde_json::{Value, json};
///
/// struct StaticPrices;
///
/// #[async_trait]
/// impl CapabilityAdapter for StaticPrices {
///     fn name(&self) -> &str {
///         "static-prices"
///     }
///
///     fn domain(&self) -> DataDomain {
///         DataDomain::MarketData
///     }
///
///     async fn call(&self, request: CapabilityRequest) -> Result<Value, CapabilityError> {
///         Ok(json!({ "ticker": request.subject.identifier(), "close": 42.0 }))
///     }
/// }
/// ```
#[async_trait]
pub trait CapabilityAdapter: Send + Sync {
    /// Adapter name used in logs and citations
    fn name(&self) -> &str;

    /// The domain this adapter serves
    fn domain(&self) -> DataDomain;

    /// Perform the call
    async fn call(&self, request: CapabilityRequest)
    -> Result<serde_json::Value, CapabilityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CapabilityError::timeout("market data took 30s");
        assert_eq!(err.to_string(), "timeout: market data took 30s");
    }

    #[test]
    fn test_transient_kinds() {
        assert!(CapabilityError::unavailable("503").is_transient());
        assert!(CapabilityError::timeout("slow").is_transient());
        assert!(!CapabilityError::malformed("bad json").is_transient());
        assert!(!CapabilityError::budget_exceeded("quota").is_transient());
    }

    #[test]
    fn test_domain_categories() {
        assert_eq!(
            DataDomain::FinancialStatements.claim_category(),
            Some(ClaimCategory::FinancialFigures)
        );
        assert_eq!(DataDomain::TextGeneration.claim_category(), None);
    }
}
