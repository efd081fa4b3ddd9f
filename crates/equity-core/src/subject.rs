//! The unit of work for one run

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The entity under analysis (e.g. a ticker such as `WEGE3`)
///
/// Identifiers are trimmed and upper-cased on construction. A `Subject` is
/// immutable; a run holds one for its whole lifetime.
///
/// # Example
///
/// ```
/// use equity_core::Subject;
///
/// let subject = Subject::new(" wege3 ").unwrap();
/// assert_eq!(subject.identifier(), "WEGE3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subject {
    identifier: String,
}

impl Subject {
    /// Create a subject from a raw identifier
    pub fn new(identifier: impl AsRef<str>) -> Result<Self> {
        let identifier = identifier.as_ref().trim();

        if identifier.is_empty() {
            return Err(Error::InvalidSubject("identifier is empty".to_string()));
        }

        if identifier.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(Error::InvalidSubject(format!(
                "identifier '{identifier}' contains whitespace or control characters"
            )));
        }

        Ok(Self {
            identifier: identifier.to_uppercase(),
        })
    }

    /// The normalised identifier
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}

impl TryFrom<String> for Subject {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Subject> for String {
    fn from(subject: Subject) -> Self {
        subject.identifier
    }
}
