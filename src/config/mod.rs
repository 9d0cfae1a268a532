//! Configuration loading and layering.
//!
//! Handles `.patchpilot.toml` loading, environment variable resolution,
//! and CLI flag merging with proper priority ordering.

pub mod loader;

pub use loader::{
    AgentTuning, AgentsConfig, Config, ConfigError, EnrichmentConfig, HeuristicsConfig,
    MemoryConfig, ProviderConfig, RetryConfig, WorkersConfig,
};
