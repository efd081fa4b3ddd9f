//! Error types for equity-core

use crate::capability::CapabilityError;
use thiserror::Error;

/// Result type alias for equity-core
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while constructing or converting core values
#[derive(Error, Debug)]
pub enum Error {
    /// The subject identifier is empty or malformed
    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    /// An agent name did not match any member of the roster
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// A verdict violated the approved/reasons invariant
    #[error("Invalid verdict: {0}")]
    InvalidVerdict(String),

    /// JSON (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An external capability failed
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}
