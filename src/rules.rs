//! Rule set loading from a local JSON file or an HTTP(S) URL

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, TriageError};
use crate::models::RuleRecord;

/// Where the rule set comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSetSource {
    File(PathBuf),
    Url(String),
}

impl FromStr for RuleSetSource {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TriageError::ConfigError(
                "rule set source cannot be empty".to_string(),
            ));
        }
        let lower = s.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Ok(RuleSetSource::Url(s.to_string()))
        } else {
            Ok(RuleSetSource::File(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for RuleSetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSetSource::File(path) => write!(f, "{}", path.display()),
            RuleSetSource::Url(url) => write!(f, "{}", url),
        }
    }
}

impl RuleSetSource {
    /// Fetch and shape-check the rule set.
    ///
    /// Every failure, including a single malformed record, is
    /// [`TriageError::ConfigurationFatal`]. Matcher validity is checked
    /// later, per rule.
    pub async fn load(&self) -> Result<Vec<RuleRecord>> {
        let content = match self {
            RuleSetSource::File(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
                TriageError::ConfigurationFatal(format!(
                    "cannot read rule set {}: {}",
                    path.display(),
                    e
                ))
            })?,
            RuleSetSource::Url(url) => fetch(url).await?,
        };

        let records = parse_rule_set(&content)
            .map_err(|e| TriageError::ConfigurationFatal(format!("{} in {}", e, self)))?;

        tracing::info!("Loaded {} rules from {}", records.len(), self);
        Ok(records)
    }
}

async fn fetch(url: &str) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| TriageError::ConfigurationFatal(format!("cannot build HTTP client: {}", e)))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| TriageError::ConfigurationFatal(format!("cannot fetch {}: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(TriageError::ConfigurationFatal(format!(
            "fetching {} returned HTTP {}",
            url,
            status.as_u16()
        )));
    }

    response
        .text()
        .await
        .map_err(|e| TriageError::ConfigurationFatal(format!("cannot read body of {}: {}", url, e)))
}

/// Parse a JSON array of rule records
pub fn parse_rule_set(content: &str) -> std::result::Result<Vec<RuleRecord>, String> {
    serde_json::from_str::<Vec<RuleRecord>>(content)
        .map_err(|e| format!("rule set does not match the expected schema: {}", e))
}
