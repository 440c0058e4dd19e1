//! Tracing subscriber setup: stderr plus an optional rotating log file

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::{LogFormat, LogRotation, LoggingConfig};
use crate::error::{Result, TriageError};

/// Build the event filter. `RUST_LOG` wins over the configured level;
/// `verbose` turns on debug output for this crate.
pub fn build_filter(config: &LoggingConfig, verbose: bool) -> Result<EnvFilter> {
    if std::env::var("RUST_LOG").is_ok() {
        return Ok(EnvFilter::from_default_env());
    }

    let directives = if verbose {
        format!("{},inbox_triage=debug", config.level)
    } else {
        config.level.clone()
    };

    EnvFilter::try_new(&directives)
        .map_err(|e| TriageError::ConfigError(format!("invalid log filter '{}': {}", directives, e)))
}

fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Minutely => Rotation::MINUTELY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    }
}

/// Split a log file path into the appender's directory and file-name prefix
fn split_log_path(path: &Path) -> Result<(PathBuf, String)> {
    let prefix = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TriageError::ConfigError(format!("log file path {:?} has no file name", path)))?
        .to_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, prefix))
}

fn file_appender(config: &LoggingConfig, path: &Path) -> Result<RollingFileAppender> {
    let (dir, prefix) = split_log_path(path)?;
    std::fs::create_dir_all(&dir)?;

    RollingFileAppender::builder()
        .rotation(rotation(config.rotation))
        .filename_prefix(prefix)
        .max_log_files(config.max_files)
        .build(&dir)
        .map_err(|e| TriageError::ConfigError(format!("cannot open log file in {:?}: {}", dir, e)))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held until
/// the process exits.
pub fn init_tracing(config: &LoggingConfig, verbose: bool) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(config, verbose)?;
    let json = config.format == LogFormat::Json;

    let stderr_layer = if json {
        fmt::layer()
            .json()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let mut guard = None;
    let file_layer = match &config.file {
        Some(path) => {
            let (writer, file_guard) = tracing_appender::non_blocking(file_appender(config, path)?);
            guard = Some(file_guard);
            let layer = if json {
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed()
            } else {
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed()
            };
            Some(layer)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer.and_then(file_layer).with_filter(filter))
        .try_init()
        .map_err(|e| TriageError::ConfigError(format!("cannot install logger: {}", e)))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_log_path() {
        let (dir, prefix) = split_log_path(Path::new("logs/results.log")).unwrap();
        assert_eq!(dir, PathBuf::from("logs"));
        assert_eq!(prefix, "results.log");

        let (dir, prefix) = split_log_path(Path::new("results.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(prefix, "results.log");

        assert!(split_log_path(Path::new("/")).is_err());
    }

    #[test]
    fn test_rotation_mapping() {
        assert_eq!(rotation(LogRotation::Daily), Rotation::DAILY);
        assert_eq!(rotation(LogRotation::Never), Rotation::NEVER);
    }

    #[test]
    fn test_build_filter_rejects_garbage_level() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let mut config = LoggingConfig::default();
        assert!(build_filter(&config, true).is_ok());
        config.level = "info,inbox_triage=loud".to_string();
        assert!(build_filter(&config, false).is_err());
    }

    #[test]
    fn test_file_appender_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("triage.log");
        let config = LoggingConfig {
            file: Some(path.clone()),
            ..Default::default()
        };
        file_appender(&config, &path).unwrap();
        assert!(dir.path().join("nested").is_dir());
    }
}
