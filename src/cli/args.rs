//! Clap argument types and input validation.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use patchpilot::models::{FindingCategory, InputMode, RunReport, Verdict};

/// Multi-agent code analysis: security, quality and logic review with a
/// merge decision and proposed patches.
#[derive(Parser, Debug)]
#[command(name = "patchpilot", version = patchpilot::constants::VERSION)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Analyze a change and print the verdict.
    Analyze(Box<AnalyzeArgs>),

    /// Validate an analysis context JSON file.
    Validate(ValidateArgs),

    /// List the heuristic fallback rules.
    Rules(RulesArgs),

    /// Print version and build information.
    Version,
}

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to the context JSON file.
    pub file: PathBuf,
}

#[derive(Parser, Debug)]
pub struct RulesArgs {
    /// Only list rules for this analyzer.
    #[arg(long)]
    pub category: Option<FindingCategory>,

    /// Extra TOML rule file to include.
    #[arg(long)]
    pub rules: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    // --- Input (one required) ---
    /// Serialized analysis context (JSON).
    #[arg(long)]
    pub context: Option<PathBuf>,

    /// File or directory whose contents become the snippets.
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Repository id, used with --path.
    #[arg(long, default_value = "local")]
    pub repo: String,

    /// Change id, used with --path.
    #[arg(long, default_value = "working-tree")]
    pub change: String,

    /// Change author, used with --path.
    #[arg(long, default_value = "unknown")]
    pub author: String,

    // --- Output ---
    #[arg(long, default_value = "terminal")]
    pub format: OutputFormat,

    /// Exit non-zero when the verdict is at least this strict.
    #[arg(long)]
    pub fail_on: Option<Verdict>,

    /// Write proposed patches under this directory.
    #[arg(long)]
    pub patch_dir: Option<PathBuf>,

    // --- Provider ---
    /// Skip the reasoning provider and analyze with heuristics only.
    #[arg(long, default_value_t = false)]
    pub offline: bool,

    // --- Memory ---
    /// Similarity memory file, loaded before and saved after the run.
    #[arg(long)]
    pub memory: Option<PathBuf>,

    // --- Performance ---
    /// Concurrent runs in the worker pool.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Max concurrent provider calls.
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Repository root for `.patchpilot.toml` (default: current directory).
    #[arg(long)]
    pub config_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Terminal,
    Json,
}

impl OutputFormat {
    pub fn render(&self, report: &RunReport) -> String {
        use patchpilot::output::OutputRenderer;
        match self {
            OutputFormat::Terminal => patchpilot::output::terminal::TerminalRenderer.render(report),
            OutputFormat::Json => patchpilot::output::json::JsonRenderer.render(report),
        }
    }
}

impl AnalyzeArgs {
    /// Exactly one of `--context` and `--path` must be given.
    pub fn validate_input(&self) -> Result<InputMode, String> {
        match (&self.context, &self.path) {
            (Some(file), None) => Ok(InputMode::ContextFile(file.clone())),
            (None, Some(path)) => Ok(InputMode::DirectPath(path.clone())),
            (None, None) => Err("one input source is required: --context or --path".to_string()),
            (Some(_), Some(_)) => Err("only one input source allowed: --context or --path".to_string()),
        }
    }

    /// `true` when `verdict` trips the `--fail-on` threshold.
    pub fn fails(&self, verdict: Verdict) -> bool {
        self.fail_on.is_some_and(|threshold| verdict >= threshold)
    }
}
