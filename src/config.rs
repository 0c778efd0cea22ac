//! Pool configuration.
//!
//! Configuration is a flat string-keyed lookup consulted once, before the pool is built. Keys:
//! `driverClassIdentifier`, `url`, `user`, `password`, `minConnectCount`, `waitTime`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, OnceLock};

use regex::Regex;
use serde::Deserialize;

use crate::error::SqlMapperError;
use crate::types::DatabaseType;

pub const KEY_DRIVER: &str = "driverClassIdentifier";
pub const KEY_URL: &str = "url";
pub const KEY_USER: &str = "user";
pub const KEY_PASSWORD: &str = "password";
pub const KEY_MIN_CONNECT_COUNT: &str = "minConnectCount";
pub const KEY_WAIT_TIME: &str = "waitTime";

/// Environment variable naming the config file used when none was installed.
pub const CONFIG_PATH_ENV: &str = "SQL_MAPPER_CONFIG";
/// File read when neither an installed config nor `SQL_MAPPER_CONFIG` is present.
pub const DEFAULT_CONFIG_FILE: &str = "config.properties";

/// A flat string-keyed configuration source.
pub trait ConfigProvider {
    fn get(&self, key: &str) -> Option<String>;
}

impl ConfigProvider for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

static PROPERTY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([^=:\s]+)\s*[=:]\s*(.*?)\s*$").expect("property line pattern is valid")
});

/// Key/value pairs parsed from Java-style `.properties` text.
///
/// Blank lines and lines starting with `#` or `!` are skipped; `=` or `:` separates key from
/// value. Later duplicates win.
#[derive(Debug, Clone, Default)]
pub struct PropertiesConfig {
    entries: HashMap<String, String>,
}

impl PropertiesConfig {
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` naming the first line that is not `key=value`.
    pub fn parse(text: &str) -> Result<Self, SqlMapperError> {
        let mut entries = HashMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                continue;
            }
            let caps = PROPERTY_LINE.captures(line).ok_or_else(|| {
                SqlMapperError::ConfigError(format!(
                    "line {}: expected key=value, found '{trimmed}'",
                    lineno + 1
                ))
            })?;
            entries.insert(caps[1].to_string(), caps[2].to_string());
        }
        Ok(Self { entries })
    }

    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SqlMapperError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SqlMapperError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&text)
    }
}

impl ConfigProvider for PropertiesConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }
}

/// Everything the pool needs to open its connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub database_type: DatabaseType,
    /// SQLite path/URI, or a Postgres connection string.
    pub url: String,
    pub user: String,
    pub password: String,
    /// Number of physical connections, fixed for the pool's lifetime.
    pub min_connect_count: usize,
    /// Acquisition budget in whole seconds.
    pub wait_time_secs: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPoolConfig {
    driver_class_identifier: String,
    url: String,
    #[serde(default)]
    user: String,
    #[serde(default)]
    password: String,
    min_connect_count: usize,
    wait_time: u64,
}

impl PoolConfig {
    /// A `SQLite` config with the given pool size and wait budget.
    #[cfg(feature = "sqlite")]
    #[must_use]
    pub fn sqlite(path: impl Into<String>, min_connect_count: usize, wait_time_secs: u64) -> Self {
        Self {
            database_type: DatabaseType::Sqlite,
            url: path.into(),
            user: String::new(),
            password: String::new(),
            min_connect_count,
            wait_time_secs,
        }
    }

    /// Read every key from `provider`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` for a missing required key, an unknown driver, or
    /// counts that are not non-negative integers (`minConnectCount` must be at least 1).
    pub fn from_provider(provider: &dyn ConfigProvider) -> Result<Self, SqlMapperError> {
        let required = |key: &str| {
            provider
                .get(key)
                .ok_or_else(|| SqlMapperError::ConfigError(format!("missing required key '{key}'")))
        };

        let database_type = DatabaseType::parse(&required(KEY_DRIVER)?)?;
        let url = required(KEY_URL)?;
        let min_connect_count =
            parse_number::<usize>(KEY_MIN_CONNECT_COUNT, &required(KEY_MIN_CONNECT_COUNT)?)?;
        let wait_time_secs = parse_number::<u64>(KEY_WAIT_TIME, &required(KEY_WAIT_TIME)?)?;

        Self {
            database_type,
            url,
            user: provider.get(KEY_USER).unwrap_or_default(),
            password: provider.get(KEY_PASSWORD).unwrap_or_default(),
            min_connect_count,
            wait_time_secs,
        }
        .validated()
    }

    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if the file cannot be read or is incomplete.
    pub fn from_properties_file(path: impl AsRef<Path>) -> Result<Self, SqlMapperError> {
        Self::from_provider(&PropertiesConfig::from_file(path)?)
    }

    /// Parse a JSON object using the same camelCase keys as the properties format.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` on malformed JSON or invalid values.
    pub fn from_json_str(json: &str) -> Result<Self, SqlMapperError> {
        let raw: RawPoolConfig = serde_json::from_str(json)
            .map_err(|e| SqlMapperError::ConfigError(format!("invalid JSON config: {e}")))?;
        Self {
            database_type: DatabaseType::parse(&raw.driver_class_identifier)?,
            url: raw.url,
            user: raw.user,
            password: raw.password,
            min_connect_count: raw.min_connect_count,
            wait_time_secs: raw.wait_time,
        }
        .validated()
    }

    /// Load from a `.json` or `.properties` file, chosen by extension.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if the file cannot be read or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SqlMapperError> {
        let path = path.as_ref();
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
            let text = std::fs::read_to_string(path).map_err(|e| {
                SqlMapperError::ConfigError(format!("cannot read {}: {e}", path.display()))
            })?;
            Self::from_json_str(&text)
        } else {
            Self::from_properties_file(path)
        }
    }

    fn validated(self) -> Result<Self, SqlMapperError> {
        if self.min_connect_count == 0 {
            return Err(SqlMapperError::ConfigError(format!(
                "{KEY_MIN_CONNECT_COUNT} must be at least 1"
            )));
        }
        if self.url.trim().is_empty() {
            return Err(SqlMapperError::ConfigError(format!("{KEY_URL} is empty")));
        }
        Ok(self)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, SqlMapperError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| {
        SqlMapperError::ConfigError(format!(
            "{key} must be a non-negative integer, got '{raw}': {e}"
        ))
    })
}

static GLOBAL_CONFIG: OnceLock<PoolConfig> = OnceLock::new();

/// Install the process-wide configuration used by the global pool.
///
/// Must run before the first use of [`crate::pool::ConnectionPool::global`].
///
/// # Errors
/// Returns `SqlMapperError::ConfigError` when a configuration was already installed or loaded.
pub fn install(config: PoolConfig) -> Result<(), SqlMapperError> {
    GLOBAL_CONFIG.set(config).map_err(|_| {
        SqlMapperError::ConfigError("a global configuration is already in place".into())
    })
}

/// The process-wide configuration, loading it from disk on first call if none was installed.
///
/// # Errors
/// Returns `SqlMapperError::ConfigError` when no configuration can be loaded.
pub fn global() -> Result<&'static PoolConfig, SqlMapperError> {
    if let Some(config) = GLOBAL_CONFIG.get() {
        return Ok(config);
    }
    let path = std::env::var_os(CONFIG_PATH_ENV)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from);
    let loaded = PoolConfig::from_file(&path)?;
    tracing::debug!(path = %path.display(), "loaded pool configuration");
    // A concurrent install may have won; either way the stored value is the one to use.
    Ok(GLOBAL_CONFIG.get_or_init(|| loaded))
}
