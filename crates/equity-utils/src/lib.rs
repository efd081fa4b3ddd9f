//! Shared utilities for equitygraph
//!
//! Logging setup and the [`Settings`] tree that configures providers, the
//! workflow and the data adapters from the environment or a TOML file.

pub mod logging;
pub mod settings;

pub use logging::{init_tracing, init_tracing_json};
pub use settings::{AdapterSettings, ConfigError, ProviderKind, ProviderSettings, Settings, WorkflowSettings};
