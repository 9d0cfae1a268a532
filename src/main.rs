//! patchpilot: multi-agent code analysis CLI.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! error propagation and user-facing messages.

mod cli;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;

use patchpilot::agents::AgentRegistry;
use patchpilot::config::Config;
use patchpilot::constants;
use patchpilot::env::Env;
use patchpilot::heuristics::RuleSet;
use patchpilot::input::{self, ChangeIdentity};
use patchpilot::memory::InMemoryStore;
use patchpilot::models::{Stage, Verdict};
use patchpilot::orchestrator::Orchestrator;
use patchpilot::providers::rig::RigProvider;
use patchpilot::providers::{RateLimitedProvider, ReasoningProvider, UnavailableProvider};
use patchpilot::service::{
    AnalysisService, DirectoryPatchSink, InMemoryRegistry, PatchSink, ServiceOptions, TaskStatus,
};

use cli::args::{AnalyzeArgs, Cli, Command, RulesArgs, ValidateArgs};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    cli::init_tracing(cli.verbose, &Env::real());

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Analyze(args) => run_analyze(*args).await,
        Command::Validate(args) => run_validate(args).await,
        Command::Rules(args) => run_rules(args),
        Command::Version => run_version(),
    }
}

fn run_version() -> Result<()> {
    println!("{} {}", constants::APP_NAME.bold(), constants::VERSION.green().bold());
    println!("{}     {}", "target:".dimmed(), constants::TARGET);
    Ok(())
}

fn run_rules(args: RulesArgs) -> Result<()> {
    let rules = RuleSet::load(args.rules.as_deref()).context("failed to load heuristic rules")?;

    let mut listed = 0;
    for rule in rules.rules() {
        if args.category.is_some_and(|c| c != rule.category) {
            continue;
        }
        println!(
            "  {}  {} {} {}",
            rule.id.bold(),
            rule.category.to_string().cyan(),
            rule.severity,
            rule.kind,
        );
        println!("         {}", rule.description.dimmed());
        listed += 1;
    }
    if listed == 0 {
        println!("No rules found.");
    }
    Ok(())
}

/// Check that a context file parses and would be accepted for analysis.
async fn run_validate(args: ValidateArgs) -> Result<()> {
    let context = input::load_context_file(&args.file)
        .await
        .with_context(|| format!("failed to load {}", args.file.display()))?;

    match context.validate() {
        Ok(()) => {
            println!(
                "  {} {}  {}",
                "✔".green().bold(),
                context.repo.bold(),
                format!("change {} by {}", context.change_id, context.author).dimmed(),
            );
            println!("         {}  {}", "snippets:".cyan(), context.snippets.len());
            if !context.prior_findings.is_empty() {
                println!("         {}  {}", "prior findings:".cyan(), context.prior_findings.len());
            }
            Ok(())
        }
        Err(e) => bail!("{} {}", "✖".red().bold(), format!("Invalid context: {e}").red()),
    }
}

async fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let input_mode = args.validate_input().map_err(|e| anyhow::anyhow!("{e}"))?;

    let config_root = match &args.config_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("could not determine current directory")?,
    };
    let mut config =
        Config::load(Some(&config_root), &Env::real()).context("failed to load configuration")?;
    if let Some(n) = args.workers {
        config.workers.pool_size = n;
    }
    if let Some(n) = args.max_concurrent {
        config.workers.max_concurrent_calls = n;
    }

    let provider = build_provider(&config, args.offline);

    let memory_path: Option<PathBuf> = args
        .memory
        .clone()
        .or_else(|| config.memory.path.as_ref().map(PathBuf::from));
    let memory = Arc::new(match &memory_path {
        Some(path) => InMemoryStore::load(path)
            .await
            .with_context(|| format!("failed to load memory from {}", path.display()))?,
        None => InMemoryStore::new(),
    });

    let rules = RuleSet::load(config.heuristics.additional_rules.as_deref().map(Path::new))
        .context("failed to load heuristic rules")?;
    let registry = AgentRegistry::standard(&config, provider, memory.clone(), Arc::new(rules))
        .context("failed to build agent registry")?;

    let sink = args
        .patch_dir
        .as_ref()
        .map(|dir| Arc::new(DirectoryPatchSink::new(dir)) as Arc<dyn PatchSink>);
    let service = AnalysisService::new(
        Orchestrator::new(registry),
        Arc::new(InMemoryRegistry::new()),
        memory.clone(),
        sink,
        ServiceOptions {
            pool_size: config.workers.pool_size,
            record_findings: config.memory.record_findings,
        },
    );

    let identity = ChangeIdentity {
        repo: args.repo.clone(),
        change_id: args.change.clone(),
        author: args.author.clone(),
    };
    let context = input::load(&input_mode, &identity)
        .await
        .context("failed to read input")?;

    let run_id = service.submit(context).await.context("failed to submit run")?;
    let record = service.wait(&run_id).await.context("run did not finish")?;
    service.shutdown().await;

    if record.status == TaskStatus::Error {
        bail!("invalid analysis context: {}", record.error.unwrap_or_default());
    }
    let report = record.report.context("completed run has no report")?;

    print!("{}", args.format.render(&report));

    if let Some(path) = &memory_path {
        memory
            .save(path)
            .await
            .with_context(|| format!("failed to save memory to {}", path.display()))?;
    }

    if report.stage == Stage::Failed {
        bail!(
            "analysis failed: {}",
            report.errors.last().map(String::as_str).unwrap_or("unknown error")
        );
    }

    let verdict = report.decision.as_ref().map(|d| d.verdict).unwrap_or(Verdict::Approve);
    if args.fails(verdict) {
        bail!("verdict {verdict} meets the --fail-on threshold");
    }

    Ok(())
}

/// The shared, rate-limited provider. Falls back to an unavailable
/// provider so analysis still runs on heuristics when no backend is set up.
fn build_provider(config: &Config, offline: bool) -> Arc<dyn ReasoningProvider> {
    let inner: Arc<dyn ReasoningProvider> = if offline {
        Arc::new(UnavailableProvider::new("offline mode"))
    } else {
        match RigProvider::new(config.provider.clone()) {
            Ok(provider) => Arc::new(provider),
            Err(e) => {
                tracing::warn!(error = %e, "reasoning provider unavailable, using heuristics only");
                Arc::new(UnavailableProvider::new(e.to_string()))
            }
        }
    };
    Arc::new(RateLimitedProvider::new(inner, config.workers.max_concurrent_calls))
}
