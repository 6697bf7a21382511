// src/logging.rs
// =============================================================================
// Logging setup using `tracing` + `tracing-subscriber`.
//
// Priority for determining the log level:
// 1. `--log-level` CLI flag (if provided)
// 2. `AUDIT_LOG` environment variable (e.g. "info", "debug")
// 3. default to `warn`, so the report on stdout stays the main output
//
// Logs always go to stderr; stdout is reserved for the report (and JSON).
// =============================================================================

use tracing::Level;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

/// Environment variable consulted when no --log-level flag is given
pub const LOG_ENV: &str = "AUDIT_LOG";

// Initialise the global logging subscriber.
// Call once, at startup: a second init() panics.
pub fn init_logging(cli_level: Option<LogLevel>) {
    let level = match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => std::env::var(LOG_ENV)
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(Level::WARN),
    };

    fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn level_from_log_level(lvl: LogLevel) -> Level {
    match lvl {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_str() {
        assert_eq!(parse_level_str(" Debug "), Some(Level::DEBUG));
        assert_eq!(parse_level_str("warning"), Some(Level::WARN));
        assert_eq!(parse_level_str("loud"), None);
    }

    #[test]
    fn test_cli_level_mapping() {
        assert_eq!(level_from_log_level(LogLevel::Trace), Level::TRACE);
        assert_eq!(level_from_log_level(LogLevel::Error), Level::ERROR);
    }
}
