/*!
 * Tracing subscriber setup
 *
 * Diagnostics go to stderr so stdout carries only the report. With a log
 * file configured, events are written there as JSON instead.
 */

use std::fs::File;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::ReportConfig;
use crate::error::{FlowError, Result};

/// Target prefix of this crate's events
const LOG_TARGET: &str = "desktopflow";

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &ReportConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(config)))
        .map_err(|e| FlowError::Config(format!("Failed to create log filter: {}", e)))?;

    match config.log_file.as_deref() {
        Some(log_path) => init_file_logging(log_path, env_filter),
        None => {
            init_stderr_logging(env_filter);
            Ok(())
        }
    }
}

/// Level after applying `verbose`
pub fn effective_level(config: &ReportConfig) -> Level {
    if config.verbose {
        Level::DEBUG.max(config.log_level.to_tracing_level())
    } else {
        config.log_level.to_tracing_level()
    }
}

/// Filter directive used when `RUST_LOG` is unset
pub fn default_directive(config: &ReportConfig) -> String {
    format!("{}={}", LOG_TARGET, effective_level(config))
}

fn init_stderr_logging(env_filter: EnvFilter) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn init_file_logging(log_path: &Path, env_filter: EnvFilter) -> Result<()> {
    let file = File::create(log_path).map_err(|e| FlowError::io_at(log_path, e))?;

    let fmt_layer = fmt::layer()
        .with_writer(file)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_default_directive() {
        let config = ReportConfig::default();
        assert_eq!(default_directive(&config), "desktopflow=INFO");

        let config = ReportConfig {
            log_level: LogLevel::Warn,
            ..ReportConfig::default()
        };
        assert_eq!(default_directive(&config), "desktopflow=WARN");
        assert!(EnvFilter::try_new(default_directive(&config)).is_ok());
    }

    #[test]
    fn test_verbose_raises_to_debug() {
        let config = ReportConfig {
            log_level: LogLevel::Error,
            verbose: true,
            ..ReportConfig::default()
        };
        assert_eq!(effective_level(&config), Level::DEBUG);
    }

    #[test]
    fn test_verbose_keeps_trace() {
        let config = ReportConfig {
            log_level: LogLevel::Trace,
            verbose: true,
            ..ReportConfig::default()
        };
        assert_eq!(effective_level(&config), Level::TRACE);
    }
}
