use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::core::sync::DateFallback;

const DEFAULT_CONFIG_PATH: &str = "config.json";
const DEFAULT_DATABASE_URL: &str = "sqlite://news.db?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 4;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid feeds file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("refresh must be a positive number of minutes that fits in seconds")]
    InvalidRefresh,
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}

/// Contents of the feeds file: `{"feeds": [...], "refresh": <minutes>}`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FeedsConfig {
    pub feeds: Vec<String>,
    pub refresh: u64,
    #[serde(default)]
    pub date_fallback: Option<DateFallback>,
}

impl FeedsConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: FeedsConfig = serde_json::from_str(raw)?;
        if config.refresh == 0 || config.refresh.checked_mul(60).is_none() {
            return Err(ConfigError::InvalidRefresh);
        }
        Ok(config)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh.saturating_mul(60))
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub feeds: FeedsConfig,
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub fetch_timeout: Duration,
    pub date_fallback: DateFallback,
    pub skip_in_flight: bool,
    pub db_max_connections: u32,
}

impl AppConfig {
    /// Reads `.env`/`.env.local`, then the feeds file named by
    /// `NEWSWIRE_CONFIG`. Environment wins over the file for the date policy.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let _ = dotenvy::from_filename(".env.local");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config_path = lookup("NEWSWIRE_CONFIG").unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        let feeds = FeedsConfig::from_file(Path::new(&config_path))?;

        let date_fallback = match lookup("DATE_FALLBACK") {
            Some(value) => parse_env("DATE_FALLBACK", value)?,
            None => feeds.date_fallback.unwrap_or_default(),
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            bind_addr: parse_env(
                "BIND_ADDR",
                lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            )?,
            fetch_timeout: Duration::from_secs(match lookup("FETCH_TIMEOUT_SECS") {
                Some(value) => parse_env("FETCH_TIMEOUT_SECS", value)?,
                None => DEFAULT_FETCH_TIMEOUT_SECS,
            }),
            date_fallback,
            skip_in_flight: match lookup("SKIP_IN_FLIGHT") {
                Some(value) => parse_env("SKIP_IN_FLIGHT", value)?,
                None => false,
            },
            db_max_connections: match lookup("DB_MAX_CONNECTIONS") {
                Some(value) => parse_env("DB_MAX_CONNECTIONS", value)?,
                None => DEFAULT_DB_MAX_CONNECTIONS,
            },
            feeds,
        })
    }
}

impl FromStr for DateFallback {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "epoch" => Ok(DateFallback::Epoch),
            "fetch_time" | "fetch-time" => Ok(DateFallback::FetchTime),
            other => Err(other.to_string()),
        }
    }
}

fn parse_env<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|_| ConfigError::InvalidEnv { key, value })
}
