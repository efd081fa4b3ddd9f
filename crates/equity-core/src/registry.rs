//! Registry of capability adapters, one per data domain

use crate::capability::{CapabilityAdapter, CapabilityError, DataDomain};
use std::collections::HashMap;
use std::sync::Arc;

/// Adapters available to a run, keyed by domain
///
/// The registry is assembled before a run starts and read-only afterwards, so
/// it is cheap to clone and share between concurrently running nodes.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    adapters: HashMap<DataDomain, Arc<dyn CapabilityAdapter>>,
}

impl CapabilityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its domain, returning the one it replaced
    pub fn register(
        &mut self,
        adapter: Arc<dyn CapabilityAdapter>,
    ) -> Option<Arc<dyn CapabilityAdapter>> {
        tracing::debug!(
            adapter = adapter.name(),
            domain = %adapter.domain(),
            "Registering capability adapter"
        );
        self.adapters.insert(adapter.domain(), adapter)
    }

    /// Builder-style registration
    pub fn with(mut self, adapter: Arc<dyn CapabilityAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Get the adapter for a domain
    pub fn get(&self, domain: DataDomain) -> Option<Arc<dyn CapabilityAdapter>> {
        self.adapters.get(&domain).cloned()
    }

    /// Get the adapter for a domain or fail as `Unavailable`
    pub fn require(&self, domain: DataDomain) -> Result<Arc<dyn CapabilityAdapter>, CapabilityError> {
        self.get(domain).ok_or_else(|| {
            CapabilityError::unavailable(format!("no adapter registered for {domain}"))
        })
    }

    /// Registered domains, sorted
    pub fn domains(&self) -> Vec<DataDomain> {
        let mut domains: Vec<DataDomain> = self.adapters.keys().copied().collect();
        domains.sort();
        domains
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("domains", &self.domains())
            .finish()
    }
}
