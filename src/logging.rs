/*!
 * Logging and tracing initialization
 */

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::TetherConfig;
use crate::error::{Result, TetherError};

/// Crates whose events the default filter lets through
const LOG_TARGETS: [&str; 3] = ["tether", "tether_core_resilience", "tether_core_monitor"];

/// Build the default filter directive, e.g. `tether=info,tether_core_resilience=info,...`
pub fn default_directive(level: Level) -> String {
    LOG_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Effective level for a configuration (`verbose` forces DEBUG)
pub fn effective_level(config: &TetherConfig) -> Level {
    if config.verbose {
        Level::DEBUG
    } else {
        config.log_level.to_tracing_level()
    }
}

/// Where log events go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    /// Compact human-readable lines on stderr; stdout stays reserved for command output
    Stderr,
    /// JSON lines appended to a file, so repeated `watch` runs share one history
    File(PathBuf),
}

impl LogSink {
    pub fn for_config(config: &TetherConfig) -> Self {
        match &config.log_file {
            Some(path) => LogSink::File(path.clone()),
            None => LogSink::Stderr,
        }
    }
}

/// Install the global subscriber for a configuration.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_logging(config: &TetherConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(effective_level(config))))
        .map_err(|e| TetherError::Config(format!("Invalid log filter: {}", e)))?;

    let installed = match LogSink::for_config(config) {
        LogSink::Stderr => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_span_events(FmtSpan::NONE)
                    .compact(),
            )
            .try_init(),
        LogSink::File(path) => {
            let file = open_log_file(&path)?;
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_target(true)
                        .with_thread_names(true)
                        .with_file(true)
                        .with_line_number(true)
                        .with_span_events(FmtSpan::CLOSE)
                        .with_ansi(false)
                        .json(),
                )
                .try_init()
        }
    };

    installed.map_err(|e| TetherError::Config(format!("Log subscriber already set: {}", e)))
}

fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| TetherError::Config(format!("Cannot open log file {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_default_directive_covers_workspace_crates() {
        let directive = default_directive(Level::WARN);
        assert_eq!(
            directive,
            "tether=WARN,tether_core_resilience=WARN,tether_core_monitor=WARN"
        );
        assert!(EnvFilter::try_new(directive).is_ok());
    }

    #[test]
    fn test_verbose_overrides_log_level() {
        let config = TetherConfig {
            log_level: LogLevel::Error,
            verbose: true,
            ..Default::default()
        };
        assert_eq!(effective_level(&config), Level::DEBUG);
    }

    #[test]
    fn test_sink_follows_log_file() {
        assert_eq!(LogSink::for_config(&TetherConfig::default()), LogSink::Stderr);

        let config = TetherConfig {
            log_file: Some(PathBuf::from("/var/log/tether.jsonl")),
            ..Default::default()
        };
        assert_eq!(
            LogSink::for_config(&config),
            LogSink::File(PathBuf::from("/var/log/tether.jsonl"))
        );
    }

    #[test]
    fn test_log_file_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tether.log");
        std::fs::write(&path, "earlier run\n").unwrap();

        let mut file = open_log_file(&path).unwrap();
        std::io::Write::write_all(&mut file, b"later run\n").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "earlier run\nlater run\n");
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Error.to_tracing_level(), Level::ERROR);
        assert_eq!(LogLevel::Warn.to_tracing_level(), Level::WARN);
        assert_eq!(LogLevel::Info.to_tracing_level(), Level::INFO);
        assert_eq!(LogLevel::Debug.to_tracing_level(), Level::DEBUG);
        assert_eq!(LogLevel::Trace.to_tracing_level(), Level::TRACE);
    }
}
