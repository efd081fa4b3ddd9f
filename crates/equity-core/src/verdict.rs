//! Gatekeeper verdicts

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Reason strings with a fixed meaning across the workflow
pub mod reasons {
    /// The analysis node failed before producing an artifact
    pub const PRODUCER_FAILED: &str = "producer_failed";
    /// The gatekeeper could not complete its review
    pub const GATEKEEPER_FAILED: &str = "gatekeeper_failed";
    /// A claim category has no cited source
    pub const MISSING_SOURCE: &str = "missing_source";
    /// An expected section is absent or empty
    pub const EMPTY_SECTION: &str = "empty_section";
    /// Two stated figures disagree
    pub const CONTRADICTION: &str = "contradiction";
    /// The artifact was produced for another subject or agent
    pub const SUBJECT_MISMATCH: &str = "subject_mismatch";
    /// Rejection issued without any stated reason
    pub const UNSPECIFIED: &str = "unspecified_rejection";
}

/// Approve/reject decision for one artifact submission
///
/// `reasons` is empty if and only if the verdict approves. Constructors and
/// deserialization both enforce this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "VerdictRepr")]
pub struct Verdict {
    approved: bool,
    reasons: Vec<String>,
}

#[derive(Deserialize)]
struct VerdictRepr {
    approved: bool,
    #[serde(default)]
    reasons: Vec<String>,
}

impl TryFrom<VerdictRepr> for Verdict {
    type Error = Error;

    fn try_from(repr: VerdictRepr) -> Result<Self, Self::Error> {
        if repr.approved != repr.reasons.is_empty() {
            return Err(Error::InvalidVerdict(format!(
                "approved={} with {} reason(s)",
                repr.approved,
                repr.reasons.len()
            )));
        }
        Ok(Self {
            approved: repr.approved,
            reasons: repr.reasons,
        })
    }
}

impl Verdict {
    /// An approving verdict
    pub fn approve() -> Self {
        Self {
            approved: true,
            reasons: Vec::new(),
        }
    }

    /// A rejecting verdict; an empty reason list becomes
    /// [`reasons::UNSPECIFIED`]
    pub fn reject<I, S>(reasons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut reasons: Vec<String> = reasons.into_iter().map(Into::into).collect();
        if reasons.is_empty() {
            reasons.push(reasons::UNSPECIFIED.to_string());
        }
        Self {
            approved: false,
            reasons,
        }
    }

    /// Approve when no reasons were collected, reject otherwise
    pub fn from_reasons(reasons: Vec<String>) -> Self {
        if reasons.is_empty() {
            Self::approve()
        } else {
            Self::reject(reasons)
        }
    }

    pub fn approved(&self) -> bool {
        self.approved
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    pub fn into_reasons(self) -> Vec<String> {
        self.reasons
    }
}
