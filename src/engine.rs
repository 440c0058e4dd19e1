//! Rule engine: runs every rule of a rule set through
//! build -> locate -> resolve -> mutate and accounts for the results.
//!
//! Rules are processed one at a time in rule-set order. A failing rule is
//! recorded and skipped; only an unobtainable rule set aborts the run.

use chrono::Utc;
use tracing::debug;

use crate::actions;
use crate::config;
use crate::error::{Result, TriageError};
use crate::locator;
use crate::models::{LabelDelta, Rule, RuleRecord};
use crate::mutator;
use crate::query;
use crate::report::{RuleOutcome, RuleStatus, RunReporter, RunSummary, RunTotals};
use crate::rules::RuleSetSource;
use crate::store::MessageStore;

/// Run-level state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    LoadingRules,
    Processing,
    Summarizing,
    Done,
    Aborted,
}

/// Per-rule pipeline stage, reported in debug events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleStage {
    Building,
    Locating,
    Resolving,
    Mutating,
}

/// Per-run knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Maximum messages located per rule, 1..=500
    pub limit: u32,
    /// Preview matches instead of changing labels
    pub simulate: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            simulate: false,
        }
    }
}

/// Offline view of a rule: what it would search for and change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRule {
    pub index: usize,
    pub matcher: String,
    pub plan: std::result::Result<(String, LabelDelta), String>,
}

/// Orchestrates one triage run against a message store
pub struct RuleEngine<S, R> {
    store: S,
    reporter: R,
    options: EngineOptions,
    totals: RunTotals,
    phase: RunPhase,
}

impl<S, R> RuleEngine<S, R>
where
    S: MessageStore,
    R: RunReporter,
{
    pub fn new(store: S, reporter: R, options: EngineOptions) -> Result<Self> {
        config::validate_limit(options.limit)?;

        Ok(Self {
            store,
            reporter,
            options,
            totals: RunTotals::default(),
            phase: RunPhase::Idle,
        })
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn totals(&self) -> RunTotals {
        self.totals
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load the rule set from `source`, then run it.
    ///
    /// A rule set that cannot be loaded moves the engine to
    /// [`RunPhase::Aborted`] and returns [`TriageError::ConfigurationFatal`].
    pub async fn run_from_source(&mut self, source: &RuleSetSource) -> Result<RunSummary> {
        self.phase = RunPhase::LoadingRules;
        let records = match source.load().await {
            Ok(records) => records,
            Err(e) => {
                self.phase = RunPhase::Aborted;
                return Err(match e {
                    TriageError::ConfigurationFatal(_) => e,
                    other => TriageError::ConfigurationFatal(other.to_string()),
                });
            }
        };

        Ok(self.run(records).await)
    }

    /// Process an already-loaded rule set
    pub async fn run(&mut self, records: Vec<RuleRecord>) -> RunSummary {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        self.totals.reset();
        self.phase = RunPhase::Processing;

        debug!(
            run_id = %run_id,
            rules = records.len(),
            simulate = self.options.simulate,
            "starting run"
        );

        let mut outcomes = Vec::with_capacity(records.len());
        for (i, record) in records.into_iter().enumerate() {
            let outcome = self.process_rule(i + 1, record).await;
            self.reporter.rule_completed(&outcome);
            outcomes.push(outcome);
        }

        self.phase = RunPhase::Summarizing;
        let summary = RunSummary {
            run_id,
            started_at,
            completed_at: Utc::now(),
            simulate: self.options.simulate,
            totals: self.totals,
            outcomes,
        };
        self.reporter.run_completed(&summary);
        self.phase = RunPhase::Done;

        summary
    }

    async fn process_rule(&mut self, index: usize, record: RuleRecord) -> RuleOutcome {
        let description = record.describe();

        stage(index, RuleStage::Building);
        let rule = match Rule::try_from(record) {
            Ok(rule) => rule,
            Err(e) => {
                let mut outcome = RuleOutcome::new(index, description);
                outcome.status = RuleStatus::Invalid(invalid_reason(e));
                return outcome;
            }
        };
        let query = query::build_query(&rule.matcher, &rule.age_threshold);
        let mut outcome = RuleOutcome::new(index, rule.matcher.to_string());
        outcome.query = Some(query.clone());

        // A rule with nothing to change is skipped before touching the store,
        // in simulation too.
        stage(index, RuleStage::Resolving);
        let delta = actions::resolve(&rule.actions);
        if delta.is_empty() {
            outcome.status = RuleStatus::NoActions;
            return outcome;
        }
        outcome = outcome.with_delta(&delta);

        stage(index, RuleStage::Locating);
        let messages = match locator::locate(&self.store, &query, self.options.limit).await {
            Ok(messages) => messages,
            Err(e) => {
                outcome.status = RuleStatus::Failed(e.to_string());
                return outcome;
            }
        };
        outcome.matched = messages.len();
        if messages.is_empty() {
            outcome.status = RuleStatus::NoMatches;
            return outcome;
        }

        stage(index, RuleStage::Mutating);
        match mutator::apply(&self.store, messages, &delta, self.options.simulate).await {
            Ok(result) if self.options.simulate => {
                outcome.previews = result.previews;
                outcome.status = RuleStatus::Simulated;
            }
            Ok(result) => {
                self.totals.record(result.count);
                outcome.mutated = result.count;
                outcome.status = RuleStatus::Mutated;
            }
            Err(e) => outcome.status = RuleStatus::Failed(e.to_string()),
        }

        outcome
    }
}

fn stage(index: usize, stage: RuleStage) {
    debug!(rule = index, stage = ?stage, "rule stage");
}

fn invalid_reason(error: TriageError) -> String {
    match error {
        TriageError::InvalidRule(reason) => reason,
        other => other.to_string(),
    }
}

/// Build each rule's query and delta without contacting a store
pub fn plan_rules(records: &[RuleRecord]) -> Vec<PlannedRule> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let plan = Rule::try_from(record.clone())
                .map(|rule| {
                    (
                        query::build_query(&rule.matcher, &rule.age_threshold),
                        actions::resolve(&rule.actions),
                    )
                })
                .map_err(invalid_reason);
            PlannedRule {
                index: i + 1,
                matcher: record.describe(),
                plan,
            }
        })
        .collect()
}
