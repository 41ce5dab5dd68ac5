//! Server configuration loading from file and environment variables.

use countmein_ingest::{ValidationPolicy, MAX_CLOCK_SKEW_SECS, SERVICE_EPOCH_FLOOR};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Announcement ingest settings.
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "countmein_ingest=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Ingest pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Earliest accepted announcement time, seconds since epoch.
    #[serde(default = "default_time_floor")]
    pub time_floor: i64,

    /// Allowed forward clock skew of client timestamps, in seconds.
    #[serde(default = "default_max_clock_skew_secs")]
    pub max_clock_skew_secs: i64,
}

impl IngestConfig {
    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            time_floor: self.time_floor,
            max_clock_skew_secs: self.max_clock_skew_secs,
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> String {
    "countmein.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_time_floor() -> i64 {
    SERVICE_EPOCH_FLOOR
}

fn default_max_clock_skew_secs() -> i64 {
    MAX_CLOCK_SKEW_SECS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            time_floor: default_time_floor(),
            max_clock_skew_secs: default_max_clock_skew_secs(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// File read when neither a CLI argument nor `COUNTMEIN_CONFIG_PATH` names one.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Where the configuration file path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Argument,
    Environment,
    Default,
}

/// Picks the configuration file: the first CLI argument, then
/// `COUNTMEIN_CONFIG_PATH`, then [`DEFAULT_CONFIG_PATH`]. Blank values are
/// skipped.
pub fn config_path(
    arg: Option<String>,
    var: impl Fn(&str) -> Option<String>,
) -> (String, ConfigSource) {
    let present = |value: &String| !value.trim().is_empty();

    if let Some(path) = arg.filter(present) {
        (path, ConfigSource::Argument)
    } else if let Some(path) = var("COUNTMEIN_CONFIG_PATH").filter(present) {
        (path, ConfigSource::Environment)
    } else {
        (DEFAULT_CONFIG_PATH.to_string(), ConfigSource::Default)
    }
}

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies environment overrides.
///
/// Environment variable overrides:
/// - `COUNTMEIN_HOST` overrides `server.host`
/// - `COUNTMEIN_PORT` overrides `server.port`
/// - `COUNTMEIN_DB_PATH` overrides `database.path`
/// - `COUNTMEIN_LOG_LEVEL` overrides `logging.level`
/// - `COUNTMEIN_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    Ok(apply_overrides(config, |key| std::env::var(key).ok()))
}

/// Applies `COUNTMEIN_*` overrides looked up through `var`. Unparseable
/// host and port values are ignored.
pub fn apply_overrides(mut config: Config, var: impl Fn(&str) -> Option<String>) -> Config {
    if let Some(host) = var("COUNTMEIN_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("COUNTMEIN_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(db_path) = var("COUNTMEIN_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = var("COUNTMEIN_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("COUNTMEIN_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    config
}
