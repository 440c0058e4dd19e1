use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, TriageError};
use crate::store::MAX_SEARCH_LIMIT;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Messages located per rule, 1..=500
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Path or http(s) URL of the JSON rule set
    #[serde(default = "default_rules_source")]
    pub source: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            source: default_rules_source(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Optional log file, rotated per `rotation`
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub rotation: LogRotation,
    /// Rotated files kept on disk
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
            rotation: LogRotation::default(),
            max_files: default_max_files(),
        }
    }
}

fn default_max_results() -> u32 {
    5
}

fn default_rules_source() -> String {
    "labels.json".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_files() -> usize {
    6
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TriageError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config = Self::from_toml(&content)?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parse and validate TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| TriageError::ConfigError(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    TriageError::ConfigError(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TriageError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| TriageError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        validate_limit(self.search.max_results)?;

        if self.rules.source.trim().is_empty() {
            return Err(TriageError::ConfigError(
                "rules.source cannot be empty".to_string(),
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(TriageError::ConfigError(
                "logging.level cannot be empty".to_string(),
            ));
        }
        if self.logging.max_files == 0 {
            return Err(TriageError::ConfigError(
                "logging.max_files must be at least 1".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let mut config = Self::default();
        config.logging.file = Some(PathBuf::from("results.log"));
        config.save(path).await
    }
}

/// Search limits outside 1..=500 are rejected here, before any run starts
pub fn validate_limit(limit: u32) -> Result<()> {
    if limit == 0 {
        return Err(TriageError::ConfigError(
            "search.max_results must be at least 1".to_string(),
        ));
    }
    if limit > MAX_SEARCH_LIMIT {
        return Err(TriageError::ConfigError(format!(
            "search.max_results cannot exceed {} (Gmail list page limit)",
            MAX_SEARCH_LIMIT
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.search.max_results, 5);
        assert!(!config.execution.dry_run);
        assert_eq!(config.rules.source, "labels.json");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
        assert_eq!(config.logging.rotation, LogRotation::Daily);
        assert_eq!(config.logging.max_files, 6);
        assert!(config.logging.file.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_results_boundaries() {
        let mut config = Config::default();

        config.search.max_results = 1;
        assert!(config.validate().is_ok());
        config.search.max_results = 500;
        assert!(config.validate().is_ok());

        config.search.max_results = 0;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("at least 1"));

        config.search.max_results = 501;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("cannot exceed 500"));
    }

    #[test]
    fn test_empty_rules_source_rejected() {
        let mut config = Config::default();
        config.rules.source = "   ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_max_files_rejected() {
        let mut config = Config::default();
        config.logging.max_files = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [search]
            max_results = 250

            [logging]
            format = "json"
            file = "logs/triage.log"
            rotation = "hourly"
            "#,
        )
        .unwrap();

        assert_eq!(config.search.max_results, 250);
        assert!(!config.execution.dry_run);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.rotation, LogRotation::Hourly);
        assert_eq!(config.logging.file, Some(PathBuf::from("logs/triage.log")));
        assert_eq!(config.logging.max_files, 6);
    }

    #[test]
    fn test_invalid_toml_values() {
        assert!(Config::from_toml("[search]\nmax_results = 1000\n").is_err());
        assert!(Config::from_toml("[logging]\nrotation = \"weekly\"\n").is_err());
        assert!(Config::from_toml("[search\n").is_err());
    }

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let config = Config::load(Path::new("/nonexistent/config.toml")).await.unwrap();
        assert_eq!(config.search.max_results, 5);
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.search.max_results = 100;
        config.execution.dry_run = true;
        config.rules.source = "https://example.com/rules.json".to_string();

        config.save(temp_file.path()).await.unwrap();
        let loaded = Config::load(temp_file.path()).await.unwrap();

        assert_eq!(loaded.search.max_results, 100);
        assert!(loaded.execution.dry_run);
        assert_eq!(loaded.rules.source, "https://example.com/rules.json");
    }

    #[tokio::test]
    async fn test_create_example() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::create_example(&path).await.unwrap();

        let loaded = Config::load(&path).await.unwrap();
        assert_eq!(loaded.logging.file, Some(PathBuf::from("results.log")));
    }
}
