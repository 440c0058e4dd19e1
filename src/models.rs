//! Core data structures: rules as authored, rules as validated, label deltas

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, TriageError};

/// Provider state label removed by `mark_as_read`
pub const UNREAD_LABEL: &str = "UNREAD";
/// Provider state label removed by `archive`
pub const INBOX_LABEL: &str = "INBOX";
/// Provider state label added by `trash`
pub const TRASH_LABEL: &str = "TRASH";

/// Relative age understood by the Gmail `older_than:` operator
static AGE_THRESHOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[dmy]$").unwrap());

/// A field that rule authors may write either as a single string or as a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// Action toggles exactly as they appear in the rule set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionsRecord {
    #[serde(default)]
    pub mark_as_read: bool,
    #[serde(default)]
    pub archive: bool,
    #[serde(default)]
    pub trash: bool,
    #[serde(default)]
    pub add: Option<OneOrMany>,
    #[serde(default)]
    pub remove: Option<OneOrMany>,
}

/// One element of the rule set as ingested, before matcher validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleRecord {
    #[serde(default, alias = "label")]
    pub labels: Option<OneOrMany>,
    #[serde(default)]
    pub query: Option<OneOrMany>,
    pub older_than: String,
    pub actions: ActionsRecord,
}

/// Selects the messages a rule applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    ByLabels(Vec<String>),
    ByQuery(Vec<String>),
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::ByLabels(labels) => write!(f, "labels [{}]", labels.join(", ")),
            Matcher::ByQuery(fragments) => write!(f, "query [{}]", fragments.join(" ")),
        }
    }
}

/// Normalized action set; explicit label lists keep author order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actions {
    pub mark_as_read: bool,
    pub archive: bool,
    pub trash: bool,
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl From<ActionsRecord> for Actions {
    fn from(record: ActionsRecord) -> Self {
        Self {
            mark_as_read: record.mark_as_read,
            archive: record.archive,
            trash: record.trash,
            add: record.add.map(OneOrMany::into_vec).unwrap_or_default(),
            remove: record.remove.map(OneOrMany::into_vec).unwrap_or_default(),
        }
    }
}

/// A validated triage rule. Built fresh from the rule set on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub matcher: Matcher,
    pub age_threshold: String,
    pub actions: Actions,
}

impl Rule {
    pub fn new(matcher: Matcher, age_threshold: impl Into<String>, actions: Actions) -> Result<Self> {
        let age_threshold = age_threshold.into();
        match &matcher {
            Matcher::ByLabels(items) | Matcher::ByQuery(items) => {
                if items.is_empty() || items.iter().any(|item| item.trim().is_empty()) {
                    return Err(TriageError::InvalidRule(format!(
                        "{} contains no usable entries",
                        matcher
                    )));
                }
            }
        }
        if !AGE_THRESHOLD.is_match(&age_threshold) {
            return Err(TriageError::InvalidRule(format!(
                "older_than '{}' is not a relative age like 30d, 6m or 1y",
                age_threshold
            )));
        }
        let delta = crate::actions::resolve(&actions);
        if let Some(label) = delta
            .add
            .iter()
            .find(|a| delta.remove.iter().any(|r| r.eq_ignore_ascii_case(a)))
        {
            return Err(TriageError::InvalidRule(format!(
                "label '{}' is both added and removed",
                label
            )));
        }

        Ok(Self {
            matcher,
            age_threshold,
            actions,
        })
    }
}

impl TryFrom<RuleRecord> for Rule {
    type Error = TriageError;

    fn try_from(record: RuleRecord) -> Result<Self> {
        let matcher = match (record.labels, record.query) {
            (Some(labels), None) => Matcher::ByLabels(labels.into_vec()),
            (None, Some(query)) => Matcher::ByQuery(query.into_vec()),
            (Some(_), Some(_)) => {
                return Err(TriageError::InvalidRule(
                    "rule has both 'labels' and 'query'; use exactly one".to_string(),
                ))
            }
            (None, None) => {
                return Err(TriageError::InvalidRule(
                    "rule has neither 'labels' nor 'query'".to_string(),
                ))
            }
        };

        Rule::new(matcher, record.older_than, record.actions.into())
    }
}

impl RuleRecord {
    /// Human-readable identity used in logs, also for records that fail validation
    pub fn describe(&self) -> String {
        fn join(value: &Option<OneOrMany>) -> String {
            value
                .clone()
                .map(OneOrMany::into_vec)
                .unwrap_or_default()
                .join(", ")
        }

        match (&self.labels, &self.query) {
            (Some(_), None) => format!("labels [{}]", join(&self.labels)),
            (None, Some(_)) => format!("query [{}]", join(&self.query)),
            (Some(_), Some(_)) => format!(
                "labels [{}] + query [{}]",
                join(&self.labels),
                join(&self.query)
            ),
            (None, None) => "<no matcher>".to_string(),
        }
    }
}

/// Label names to add and remove, in insertion order, without duplicates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDelta {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl LabelDelta {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// A located message. The snippet is only fetched for simulation previews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub id: String,
    pub snippet: Option<String>,
}

impl MessageRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            snippet: None,
        }
    }
}
