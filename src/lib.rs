//! patchpilot: multi-agent code analysis workflow (library crate).
//!
//! Re-exports public modules for the CLI binary and integration tests.

pub mod agents;
pub mod config;
pub mod constants;
pub mod env;
pub mod heuristics;
pub mod input;
pub mod memory;
pub mod models;
pub mod orchestrator;
pub mod output;
pub mod providers;
pub mod service;
