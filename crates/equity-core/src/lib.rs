//! Core vocabulary for equitygraph
//!
//! This crate defines the values every other equitygraph crate speaks in:
//!
//! - [`Subject`]: the entity a run analyses (a ticker)
//! - [`AgentId`]: the fixed roster of specialist analysts
//! - [`Artifact`]: a specialist's draft analysis with its cited sources
//! - [`Verdict`]: the gatekeeper's approve/reject decision for one artifact
//! - [`CapabilityAdapter`]: the single contract behind which every external
//!   data or text-generation call lives, failing with [`CapabilityError`]

pub mod agent;
pub mod artifact;
pub mod capability;
pub mod error;
pub mod registry;
pub mod subject;
pub mod verdict;

pub use agent::AgentId;
pub use artifact::{Artifact, Citation, ClaimCategory, FinancialMetric, MetricValue, Section};
pub use capability::{
    CapabilityAdapter, CapabilityError, CapabilityErrorKind, CapabilityRequest, DataDomain,
};
pub use error::{Error, Result};
pub use registry::CapabilityRegistry;
pub use subject::Subject;
pub use verdict::Verdict;
