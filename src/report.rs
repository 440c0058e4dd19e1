//! Run accounting: per-rule outcome records, run totals and the run summary

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::models::{LabelDelta, MessageRef};

/// Messages actually mutated during one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub mutated: usize,
}

impl RunTotals {
    pub fn record(&mut self, count: usize) {
        self.mutated += count;
    }

    pub fn reset(&mut self) {
        self.mutated = 0;
    }
}

/// What happened to one rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum RuleStatus {
    /// Labels were changed on the matched messages
    Mutated,
    /// Matches were previewed, nothing changed
    Simulated,
    /// The search returned nothing
    NoMatches,
    /// The rule's actions resolve to no label change; nothing was searched
    NoActions,
    /// The rule could not be built
    Invalid(String),
    /// Search or mutation failed
    Failed(String),
}

/// Structured record emitted once per rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    /// Position of the rule in the rule set, starting at 1
    pub index: usize,
    pub matcher: String,
    pub query: Option<String>,
    pub matched: usize,
    /// Messages the store reports as changed; 0 unless status is `Mutated`
    pub mutated: usize,
    pub labels_added: Vec<String>,
    pub labels_removed: Vec<String>,
    pub previews: Vec<MessageRef>,
    #[serde(flatten)]
    pub status: RuleStatus,
}

impl RuleOutcome {
    pub(crate) fn new(index: usize, matcher: String) -> Self {
        Self {
            index,
            matcher,
            query: None,
            matched: 0,
            mutated: 0,
            labels_added: Vec::new(),
            labels_removed: Vec::new(),
            previews: Vec::new(),
            status: RuleStatus::NoActions,
        }
    }

    pub(crate) fn with_delta(mut self, delta: &LabelDelta) -> Self {
        self.labels_added = delta.add.clone();
        self.labels_removed = delta.remove.clone();
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, RuleStatus::Invalid(_) | RuleStatus::Failed(_))
    }
}

/// Final record of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub simulate: bool,
    pub totals: RunTotals,
    pub outcomes: Vec<RuleOutcome>,
}

impl RunSummary {
    pub fn rules_failed(&self) -> usize {
        self.count(|s| matches!(s, RuleStatus::Failed(_)))
    }

    pub fn rules_invalid(&self) -> usize {
        self.count(|s| matches!(s, RuleStatus::Invalid(_)))
    }

    pub fn rules_without_actions(&self) -> usize {
        self.count(|s| matches!(s, RuleStatus::NoActions))
    }

    pub fn messages_matched(&self) -> usize {
        self.outcomes.iter().map(|o| o.matched).sum()
    }

    fn count(&self, pred: impl Fn(&RuleStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.completed_at - self.started_at).num_seconds()
    }

    /// Render the run as a Markdown report
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        if self.simulate {
            md.push_str("# Inbox Triage Report (DRY RUN)\n\n");
            md.push_str("> **DRY RUN** - No labels were changed. Matches are listed with previews.\n\n");
        } else {
            md.push_str("# Inbox Triage Report\n\n");
        }
        md.push_str(&format!(
            "Generated: {}\n\n",
            self.completed_at.format("%Y-%m-%d %H:%M:%S")
        ));

        md.push_str("## Summary\n\n");
        md.push_str(&format!("- **Run ID:** {}\n", self.run_id));
        md.push_str(&format!("- **Rules:** {}\n", self.outcomes.len()));
        md.push_str(&format!("- **Messages matched:** {}\n", self.messages_matched()));
        md.push_str(&format!("- **Messages modified:** {}\n", self.totals.mutated));
        md.push_str(&format!(
            "- **Rules failed / invalid / without actions:** {} / {} / {}\n",
            self.rules_failed(),
            self.rules_invalid(),
            self.rules_without_actions()
        ));
        md.push_str(&format!("- **Duration:** {} seconds\n\n", self.duration_seconds()));

        md.push_str("## Rules\n\n");
        md.push_str("| # | Matcher | Query | Matched | Added | Removed | Status |\n");
        md.push_str("|---|---------|-------|---------|-------|---------|--------|\n");
        for outcome in &self.outcomes {
            md.push_str(&format!(
                "| {} | {} | `{}` | {} | {} | {} | {} |\n",
                outcome.index,
                escape_cell(&outcome.matcher),
                escape_cell(outcome.query.as_deref().unwrap_or("-")),
                outcome.matched,
                escape_cell(&outcome.labels_added.join(", ")),
                escape_cell(&outcome.labels_removed.join(", ")),
                escape_cell(&status_label(&outcome.status)),
            ));
        }
        md.push('\n');

        if self.simulate {
            md.push_str("## Previews\n\n");
            for outcome in self.outcomes.iter().filter(|o| !o.previews.is_empty()) {
                md.push_str(&format!("### Rule {}: {}\n\n", outcome.index, outcome.matcher));
                for preview in &outcome.previews {
                    let snippet = preview.snippet.as_deref().unwrap_or("<unavailable>");
                    md.push_str(&format!("- `{}` {}\n", preview.id, truncate(snippet, 100)));
                }
                md.push('\n');
            }
            md.push_str("---\n\n");
            md.push_str("_To apply these changes, run again without `--dry-run`._\n");
        }

        md
    }

    /// Save the Markdown report to a file
    pub async fn save(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, self.to_markdown()).await
    }
}

fn status_label(status: &RuleStatus) -> String {
    match status {
        RuleStatus::Mutated => "modified".to_string(),
        RuleStatus::Simulated => "previewed".to_string(),
        RuleStatus::NoMatches => "no messages found".to_string(),
        RuleStatus::NoActions => "no actions".to_string(),
        RuleStatus::Invalid(reason) => format!("invalid: {}", reason),
        RuleStatus::Failed(reason) => format!("failed: {}", reason),
    }
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|")
}

/// Truncate to `max_len` characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_len.saturating_sub(3)).collect::<String>())
    }
}

/// Receives the engine's structured records; the engine itself never prints
pub trait RunReporter: Send {
    fn rule_completed(&mut self, outcome: &RuleOutcome);

    fn run_completed(&mut self, summary: &RunSummary);
}

/// Renders run records as log lines
#[derive(Debug, Default)]
pub struct TracingReporter;

impl RunReporter for TracingReporter {
    fn rule_completed(&mut self, outcome: &RuleOutcome) {
        match &outcome.status {
            RuleStatus::Mutated => info!(
                "Modified {} emails for {} by adding {:?} and removing {:?}",
                outcome.mutated, outcome.matcher, outcome.labels_added, outcome.labels_removed
            ),
            RuleStatus::Simulated => {
                info!(
                    "[dry run] {} emails match {}; would add {:?} and remove {:?}",
                    outcome.matched, outcome.matcher, outcome.labels_added, outcome.labels_removed
                );
                for preview in &outcome.previews {
                    info!(
                        "[dry run]   {}: {}",
                        preview.id,
                        truncate(preview.snippet.as_deref().unwrap_or("<unavailable>"), 100)
                    );
                }
            }
            RuleStatus::NoMatches => warn!("No messages found for {}", outcome.matcher),
            RuleStatus::NoActions => info!("No actions configured for {}, skipping", outcome.matcher),
            RuleStatus::Invalid(reason) => {
                error!("Skipping rule {} ({}): {}", outcome.index, outcome.matcher, reason)
            }
            RuleStatus::Failed(reason) => {
                error!("Rule {} ({}) failed: {}", outcome.index, outcome.matcher, reason)
            }
        }
    }

    fn run_completed(&mut self, summary: &RunSummary) {
        if summary.simulate {
            info!(
                "Dry run complete: {} emails matched across {} rules, none modified",
                summary.messages_matched(),
                summary.outcomes.len()
            );
        } else {
            info!(
                "Run complete: modified {} emails across {} rules ({} failed)",
                summary.totals.mutated,
                summary.outcomes.len(),
                summary.rules_failed() + summary.rules_invalid()
            );
        }
    }
}
