//! Environment-driven runtime configuration.
//!
//! # Responsibility
//! - Resolve log level, log directory and database path for executables.
//!
//! # Invariants
//! - Blank environment values are treated as unset.
//! - Resolution never fails; invalid values surface later at use sites
//!   (`init_logging`, `open_db`) with their own errors.

use crate::logging::default_log_level;
use once_cell::sync::Lazy;
use std::path::PathBuf;

pub const ENV_LOG_LEVEL: &str = "CHARSHEET_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "CHARSHEET_LOG_DIR";
pub const ENV_DB_PATH: &str = "CHARSHEET_DB_PATH";

const DEFAULT_DB_FILE_NAME: &str = "charsheet.sqlite3";

static PROCESS_CONFIG: Lazy<CoreConfig> = Lazy::new(CoreConfig::from_env);

/// Runtime settings shared by the CLI and embedding hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// File logging is disabled when `None`.
    pub log_dir: Option<PathBuf>,
    /// SQLite database file.
    pub db_path: PathBuf,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
        }
    }
}

impl CoreConfig {
    /// Reads the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves settings through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let defaults = Self::default();
        Self {
            log_level: read(ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_dir: read(ENV_LOG_DIR).map(PathBuf::from),
            db_path: read(ENV_DB_PATH)
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
        }
    }
}

/// Configuration resolved once from the environment of this process.
pub fn process_config() -> &'static CoreConfig {
    &PROCESS_CONFIG
}
