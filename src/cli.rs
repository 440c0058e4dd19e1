//! Command-line interface

use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::auth::{self, MODIFY_SCOPE};
use crate::client::GmailStore;
use crate::config::{self, Config};
use crate::engine::{plan_rules, EngineOptions, PlannedRule, RuleEngine};
use crate::error::{Result, TriageError};
use crate::report::{RunSummary, TracingReporter};
use crate::rules::RuleSetSource;
use crate::store::MessageStore;

#[derive(Parser, Debug)]
#[command(name = "inbox-triage")]
#[command(version = "0.1.0")]
#[command(about = "Declarative inbox triage for Gmail", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 credentials file
    #[arg(long, default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Path to token cache file
    #[arg(long, default_value = ".inbox-triage/token.json")]
    pub token_cache: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with Gmail API
    Auth {
        /// Force re-authentication even if token exists
        #[arg(long)]
        force: bool,
    },

    /// Apply every rule of the rule set to the mailbox
    Run {
        /// Rule set file or http(s) URL (overrides rules.source)
        #[arg(short, long)]
        rules: Option<String>,

        /// Preview matching messages instead of changing labels
        #[arg(long)]
        dry_run: bool,

        /// Maximum messages per rule, 1-500 (overrides search.max_results)
        #[arg(short, long)]
        limit: Option<u32>,

        /// Write a Markdown run report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show each rule's search query and label changes without contacting Gmail
    Check {
        /// Rule set file or http(s) URL (overrides rules.source)
        #[arg(short, long)]
        rules: Option<String>,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

/// Spinners for the slow startup steps
pub struct ProgressReporter {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        Self {
            multi: MultiProgress::new(),
            spinner_style,
        }
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Finish a spinner and clear it from the multi-progress display
    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        println!("  ✓ {}", msg);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// The rule set named on the command line, falling back to `rules.source`
pub fn rule_source(cli_rules: Option<&str>, config: &Config) -> Result<RuleSetSource> {
    cli_rules.unwrap_or(config.rules.source.as_str()).parse()
}

/// Merge command-line overrides into the configured run options
pub fn engine_options(config: &Config, dry_run: bool, limit: Option<u32>) -> Result<EngineOptions> {
    let limit = limit.unwrap_or(config.search.max_results);
    config::validate_limit(limit)?;

    Ok(EngineOptions {
        limit,
        simulate: dry_run || config.execution.dry_run,
    })
}

/// Run the OAuth flow and return the connected account's address
pub async fn authenticate(cli: &Cli, force: bool) -> Result<String> {
    if force && cli.token_cache.exists() {
        tokio::fs::remove_file(&cli.token_cache).await?;
        info!("Removed existing token cache");
    }

    auth::load_credentials(&cli.credentials).await?;
    let hub = auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache).await?;

    let (_, profile) = hub
        .users()
        .get_profile("me")
        .add_scope(MODIFY_SCOPE)
        .doit()
        .await?;

    Ok(profile.email_address.unwrap_or_default())
}

/// Authenticate, then load the rule set and run every rule against the mailbox
pub async fn run_triage(
    cli: &Cli,
    config: &Config,
    rules: Option<&str>,
    dry_run: bool,
    limit: Option<u32>,
    report: Option<&Path>,
) -> Result<RunSummary> {
    let options = engine_options(config, dry_run, limit)?;
    let source = rule_source(rules, config)?;
    let progress = ProgressReporter::new();

    let spinner = progress.add_spinner("Authenticating with Gmail API...");
    let hub = match auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache).await {
        Ok(hub) => hub,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };
    progress.finish_spinner(&spinner, "Gmail API authenticated");

    triage_with_store(GmailStore::new(hub), &source, options, report).await
}

/// Run the rule set from `source` against `store`, writing the report if asked.
///
/// A rule set that cannot be loaded aborts the run before any rule is applied.
pub async fn triage_with_store<S: MessageStore>(
    store: S,
    source: &RuleSetSource,
    options: EngineOptions,
    report: Option<&Path>,
) -> Result<RunSummary> {
    let mut engine = RuleEngine::new(store, TracingReporter, options)?;

    info!("Loading rules from {}", source);
    let summary = engine.run_from_source(source).await?;

    if let Some(path) = report {
        summary.save(path).await?;
        info!("Report written to {}", path.display());
    }

    Ok(summary)
}

/// Load the rule set and plan every rule offline
pub async fn check_rules(config: &Config, rules: Option<&str>) -> Result<Vec<PlannedRule>> {
    let source = rule_source(rules, config)?;
    let records = source.load().await?;
    Ok(plan_rules(&records))
}

/// Human-readable rendering of a rule plan
pub fn render_plan(plans: &[PlannedRule]) -> String {
    let mut out = String::new();
    for planned in plans {
        let _ = writeln!(out, "Rule {}: {}", planned.index, planned.matcher);
        match &planned.plan {
            Ok((query, delta)) if delta.is_empty() => {
                let _ = writeln!(out, "  query:  {}", query);
                let _ = writeln!(out, "  skipped: no actions");
            }
            Ok((query, delta)) => {
                let _ = writeln!(out, "  query:  {}", query);
                let _ = writeln!(out, "  add:    {:?}", delta.add);
                let _ = writeln!(out, "  remove: {:?}", delta.remove);
            }
            Err(reason) => {
                let _ = writeln!(out, "  invalid: {}", reason);
            }
        }
    }
    out
}

pub fn print_summary(summary: &RunSummary) {
    println!("\n========================================");
    if summary.simulate {
        println!("Triage Summary (dry run)");
    } else {
        println!("Triage Summary");
    }
    println!("========================================");
    println!("Run ID: {}", summary.run_id);
    println!("Duration: {} seconds", summary.duration_seconds());
    println!("Rules processed: {}", summary.outcomes.len());
    println!("Rules invalid: {}", summary.rules_invalid());
    println!("Rules failed: {}", summary.rules_failed());
    println!("Rules without actions: {}", summary.rules_without_actions());
    println!("Messages matched: {}", summary.messages_matched());
    println!("Messages modified: {}", summary.totals.mutated);
    println!("========================================");
}

/// Write an example configuration, refusing to clobber one unless forced
pub async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(TriageError::ConfigError(format!(
            "Configuration file already exists at {:?}. Use --force to overwrite.",
            output
        )));
    }

    Config::create_example(output).await
}
