//! Common test utilities and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use inbox_triage::error::{Result, TriageError};
use inbox_triage::models::RuleRecord;
use inbox_triage::report::{RuleOutcome, RunReporter, RunSummary};
use inbox_triage::store::MessageStore;
use mockall::mock;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Mutex;

mock! {
    pub Store {}

    #[async_trait::async_trait]
    impl MessageStore for Store {
        async fn search(&self, query: &str, limit: u32) -> Result<Vec<String>>;
        async fn fetch_snippet(&self, id: &str) -> Result<String>;
        async fn batch_mutate(&self, ids: &[String], add: &[String], remove: &[String]) -> Result<usize>;
    }
}

/// Parse one rule record from JSON
pub fn record(json: &str) -> RuleRecord {
    serde_json::from_str(json).expect("valid rule record")
}

/// Message held by [`InMemoryStore`]
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: String,
    pub from: String,
    pub snippet: String,
    pub labels: BTreeSet<String>,
}

/// Create an unread inbox message carrying `labels`
pub fn inbox_message(id: &str, from: &str, labels: &[&str]) -> StoredMessage {
    let mut all: BTreeSet<String> = labels.iter().map(|l| l.to_string()).collect();
    all.insert("INBOX".to_string());
    all.insert("UNREAD".to_string());

    StoredMessage {
        id: id.to_string(),
        from: from.to_string(),
        snippet: format!("Snippet of {}", id),
        labels: all,
    }
}

/// One recorded `batch_mutate` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutateCall {
    pub ids: Vec<String>,
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

static LABEL_TERM: Lazy<Regex> = Lazy::new(|| Regex::new(r#"label:"((?:[^"\\]|\\.)*)""#).unwrap());
static FROM_TERM: Lazy<Regex> = Lazy::new(|| Regex::new(r"from:(\S+)").unwrap());

/// Mailbox simulation that understands the queries the engine builds.
///
/// Every message counts as old enough for any `older_than` term. Trashed
/// messages never match, like Gmail search.
#[derive(Default)]
pub struct InMemoryStore {
    messages: Mutex<Vec<StoredMessage>>,
    pub searches: Mutex<Vec<String>>,
    pub mutations: Mutex<Vec<MutateCall>>,
    pub snippet_fetches: Mutex<Vec<String>>,
    /// Queries for which `search` fails with a server error
    pub failing_queries: Mutex<Vec<String>>,
}

impl InMemoryStore {
    pub fn with_messages(messages: Vec<StoredMessage>) -> Self {
        Self {
            messages: Mutex::new(messages),
            ..Default::default()
        }
    }

    pub fn fail_search_for(&self, query: &str) {
        self.failing_queries.lock().unwrap().push(query.to_string());
    }

    pub fn labels_of(&self, id: &str) -> BTreeSet<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.labels.clone())
            .unwrap_or_default()
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.lock().unwrap().len()
    }

    fn matches(message: &StoredMessage, query: &str) -> bool {
        if message.labels.contains("TRASH") {
            return false;
        }
        if query.contains("in:inbox") && !message.labels.contains("INBOX") {
            return false;
        }

        let wanted: Vec<String> = LABEL_TERM
            .captures_iter(query)
            .map(|c| c[1].replace("\\\"", "\""))
            .collect();
        if !wanted.is_empty() && !wanted.iter().any(|l| message.labels.contains(l)) {
            return false;
        }

        if let Some(from) = FROM_TERM.captures(query) {
            if message.from != from[1] {
                return false;
            }
        }

        true
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<String>> {
        self.searches.lock().unwrap().push(query.to_string());
        if self.failing_queries.lock().unwrap().iter().any(|q| q == query) {
            return Err(TriageError::ServerError {
                status: 503,
                message: "backend unavailable".to_string(),
            });
        }

        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| Self::matches(m, query))
            .take(limit as usize)
            .map(|m| m.id.clone())
            .collect())
    }

    async fn fetch_snippet(&self, id: &str) -> Result<String> {
        self.snippet_fetches.lock().unwrap().push(id.to_string());
        self.messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.snippet.clone())
            .ok_or_else(|| TriageError::NotFound(format!("message {}", id)))
    }

    async fn batch_mutate(&self, ids: &[String], add: &[String], remove: &[String]) -> Result<usize> {
        self.mutations.lock().unwrap().push(MutateCall {
            ids: ids.to_vec(),
            add: add.to_vec(),
            remove: remove.to_vec(),
        });

        let mut messages = self.messages.lock().unwrap();
        let mut changed = 0;
        for message in messages.iter_mut().filter(|m| ids.contains(&m.id)) {
            for label in add {
                message.labels.insert(label.clone());
            }
            for label in remove {
                message.labels.remove(label);
            }
            changed += 1;
        }
        Ok(changed)
    }
}

/// Reporter that keeps every record it receives
#[derive(Default)]
pub struct RecordingReporter {
    pub outcomes: Vec<RuleOutcome>,
    pub summaries: Vec<RunSummary>,
}

impl RunReporter for RecordingReporter {
    fn rule_completed(&mut self, outcome: &RuleOutcome) {
        self.outcomes.push(outcome.clone());
    }

    fn run_completed(&mut self, summary: &RunSummary) {
        self.summaries.push(summary.clone());
    }
}
