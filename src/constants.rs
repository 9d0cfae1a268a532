//! App-wide constants.
//!
//! Centralises the tool name, config paths and environment variable
//! names so a rename only requires changing this file.

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "patchpilot";

/// Crate version baked in at build time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Target triple the binary was compiled for.
pub const TARGET: &str = env!("PATCHPILOT_TARGET");

/// Local config filename (e.g. `.patchpilot.toml` in repo root).
pub const CONFIG_FILENAME: &str = ".patchpilot.toml";

/// Directory name under `~/.config/` for global config.
pub const CONFIG_DIR: &str = "patchpilot";

/// Upper bound on confidence for findings produced by the fallback scan.
pub const HEURISTIC_CONFIDENCE_CAP: f32 = 0.6;

// ── Environment variable names ──────────────────────────────────────

pub const ENV_PROVIDER: &str = "PATCHPILOT_PROVIDER";
pub const ENV_MODEL: &str = "PATCHPILOT_MODEL";
pub const ENV_API_KEY: &str = "PATCHPILOT_API_KEY";
pub const ENV_BASE_URL: &str = "PATCHPILOT_BASE_URL";
pub const ENV_WORKERS: &str = "PATCHPILOT_WORKERS";
pub const ENV_MAX_CONCURRENT: &str = "PATCHPILOT_MAX_CONCURRENT";
pub const ENV_MAX_RETRIES: &str = "PATCHPILOT_MAX_RETRIES";
pub const ENV_LOG: &str = "PATCHPILOT_LOG";
