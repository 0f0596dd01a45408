//! Configuration management.

use serde::Deserialize;
use std::path::Path;

/// Default number of rows fetched when no limit clause is set.
pub const DEFAULT_ROW_LIMIT: u32 = 1000;

/// Runtime configuration for a cursor and its auxiliary cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorConfig {
    /// Row limit used by the SQL builder when no limit clause is set.
    pub default_limit: u32,
    /// Whether the backend assigns primary keys on insert.
    pub auto_populate_pk: bool,
    /// Whether executed statements are logged at debug level.
    pub log_sql: bool,
    /// `SQLite` connection settings.
    pub sqlite: SqliteSettings,
}

/// Connection settings for the `SQLite` backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteSettings {
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
    /// Journal mode pragma value.
    pub journal_mode: String,
    /// Synchronous pragma value.
    pub synchronous: String,
}

impl Default for SqliteSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5000,
            journal_mode: "WAL".to_string(),
            synchronous: "NORMAL".to_string(),
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Default row limit.
    pub default_limit: Option<u32>,
    /// Backend-assigned primary keys.
    pub auto_populate_pk: Option<bool>,
    /// SQL statement logging.
    pub log_sql: Option<bool>,
    /// `SQLite` section.
    pub sqlite: Option<ConfigFileSqlite>,
}

/// `SQLite` section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileSqlite {
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: Option<u32>,
    /// Journal mode.
    pub journal_mode: Option<String>,
    /// Synchronous mode.
    pub synchronous: Option<String>,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_ROW_LIMIT,
            auto_populate_pk: true,
            log_sql: true,
            sqlite: SqliteSettings::default(),
        }
    }
}

impl CursorConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default row limit.
    #[must_use]
    pub const fn with_default_limit(mut self, limit: u32) -> Self {
        self.default_limit = limit;
        self
    }

    /// Sets whether the backend assigns primary keys on insert.
    #[must_use]
    pub const fn with_auto_populate_pk(mut self, auto: bool) -> Self {
        self.auto_populate_pk = auto;
        self
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;

        Self::from_toml(&contents)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid configuration TOML.
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self::from_config_file(file))
    }

    /// Converts a `ConfigFile` to `CursorConfig`, keeping defaults for absent keys.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(limit) = file.default_limit {
            config.default_limit = limit;
        }
        if let Some(auto) = file.auto_populate_pk {
            config.auto_populate_pk = auto;
        }
        if let Some(log_sql) = file.log_sql {
            config.log_sql = log_sql;
        }
        if let Some(sqlite) = file.sqlite {
            if let Some(timeout) = sqlite.busy_timeout_ms {
                config.sqlite.busy_timeout_ms = timeout;
            }
            if let Some(mode) = sqlite.journal_mode {
                config.sqlite.journal_mode = mode;
            }
            if let Some(sync) = sqlite.synchronous {
                config.sqlite.synchronous = sync;
            }
        }

        config
    }
}
