//! Structured logging.

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable consulted first for the log filter.
pub const LOG_ENV_VAR: &str = "RECORDSET_LOG";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name, defaulting to pretty output.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Event filter.
    pub filter: EnvFilter,
    /// Output format.
    pub format: LogFormat,
    /// Optional log file; stderr when absent.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds configuration from `RECORDSET_LOG`, then `RUST_LOG`, then `info`.
    ///
    /// `verbose` raises the crate's own level to `debug`, which makes every
    /// executed SQL statement visible.
    #[must_use]
    pub fn from_env(verbose: bool) -> Self {
        let directives = std::env::var(LOG_ENV_VAR)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| {
                if verbose {
                    "info,recordset=debug".to_string()
                } else {
                    "info".to_string()
                }
            });
        let format = std::env::var("RECORDSET_LOG_FORMAT")
            .map(|f| LogFormat::parse(&f))
            .unwrap_or_default();

        Self {
            filter: EnvFilter::new(directives),
            format,
            file: std::env::var_os("RECORDSET_LOG_FILE").map(PathBuf::from),
        }
    }

    /// Sets the output format.
    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Replaces the event filter with `directives` (`EnvFilter` syntax).
    #[must_use]
    pub fn with_directives(mut self, directives: &str) -> Self {
        self.filter = EnvFilter::new(directives);
        self
    }

    /// Sends output to a file.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: EnvFilter::new("info"),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("other"), LogFormat::Pretty);
    }

    #[test]
    fn test_builders() {
        let config = LoggingConfig::default()
            .with_format(LogFormat::Json)
            .with_file("/tmp/recordset.log");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/recordset.log")));
    }
}
