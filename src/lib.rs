//! Inbox Triage
//!
//! Applies a declarative rule set to a Gmail mailbox. Each rule names the
//! messages it concerns (by label or raw search query, plus an age
//! threshold) and the label changes to make: mark as read, archive, trash,
//! add or remove labels.
//!
//! # Overview
//!
//! For every rule the engine:
//! - **Builds** a search query from the rule's matcher ([`query`])
//! - **Resolves** the actions into one label delta ([`actions`])
//! - **Locates** up to the configured number of matching messages ([`locator`])
//! - **Mutates** them in one batch call, or previews them in dry-run mode ([`mutator`])
//!
//! Rules run one after another. A rule that is invalid or whose store call
//! fails is recorded and skipped; only a rule set that cannot be loaded aborts
//! the run.
//!
//! # Example Usage
//!
//! ```no_run
//! use inbox_triage::{auth, client::GmailStore, config::Config};
//! use inbox_triage::engine::{EngineOptions, RuleEngine};
//! use inbox_triage::report::TracingReporter;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!     let source = config.rules.source.parse()?;
//!
//!     let hub = auth::initialize_gmail_hub(
//!         "credentials.json".as_ref(),
//!         ".inbox-triage/token.json".as_ref(),
//!     )
//!     .await?;
//!
//!     let options = EngineOptions {
//!         limit: config.search.max_results,
//!         simulate: true,
//!     };
//!     let mut engine = RuleEngine::new(GmailStore::new(hub), TracingReporter, options)?;
//!     let summary = engine.run_from_source(&source).await?;
//!     println!("{}", summary.to_markdown());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`actions`] - Rule actions to label delta
//! - [`auth`] - OAuth2 authentication and Gmail API initialization
//! - [`cli`] - Command-line interface
//! - [`client`] - Gmail-backed [`store::MessageStore`] with retries
//! - [`config`] - Configuration management
//! - [`engine`] - Per-rule pipeline and run orchestration
//! - [`error`] - Error types and result aliases
//! - [`locator`] - Query execution against the store
//! - [`logging`] - Tracing subscriber setup
//! - [`models`] - Rules, matchers and label deltas
//! - [`mutator`] - Batch label changes and dry-run previews
//! - [`query`] - Gmail search query construction
//! - [`report`] - Run accounting and reporting
//! - [`rules`] - Rule set loading
//! - [`store`] - Message store capability

pub mod actions;
pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod locator;
pub mod logging;
pub mod models;
pub mod mutator;
pub mod query;
pub mod report;
pub mod rules;
pub mod store;

// Re-export commonly used types for convenience
pub use error::{Result, TriageError};

// Core data models
pub use models::{Actions, LabelDelta, Matcher, MessageRef, Rule, RuleRecord};

// Engine
pub use engine::{EngineOptions, PlannedRule, RuleEngine, RunPhase};

// Reporting
pub use report::{RuleOutcome, RuleStatus, RunReporter, RunSummary, RunTotals, TracingReporter};

// Store
pub use client::GmailStore;
pub use store::MessageStore;

pub use config::Config;
pub use rules::RuleSetSource;
