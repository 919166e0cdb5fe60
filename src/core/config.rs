//! Process configuration.
//!
//! Values come from built-in defaults, then an optional JSON file
//! (`CONFIG_PATH`, default `config.json`), then the environment (including
//! `.env`, loaded by the binary through dotenvy).

use anyhow::{Context as _, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::core::error::ConfigError;
use crate::features::reminders::ReminderSchedule;

const DEFAULT_CONFIG_PATH: &str = "config.json";
const DEFAULT_DATABASE_PATH: &str = "data/remy.db";
const DEFAULT_SCHEDULE: &str = "3h,6h,12h,24h,48h";

/// Which storage engine backs deadlines, baskets and pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::Invalid {
                key: "STORE_BACKEND",
                reason: format!("expected 'sqlite' or 'memory', got '{other}'"),
            }),
        }
    }
}

/// Optional settings file. Every field may be overridden from the environment.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub discord_token: Option<String>,
    pub target_channel_id: Option<u64>,
    pub prefix: Option<String>,
    pub store_backend: Option<String>,
    pub database: Option<String>,
    pub timezone: Option<String>,
    pub reminder_schedule: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub send_timeout_secs: Option<u64>,
    pub store_timeout_secs: Option<u64>,
    pub command_rate_limit: Option<usize>,
    pub log_level: Option<String>,
}

impl FileConfig {
    /// Read the file if it exists; a missing file yields all defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    /// Discord channel the bot listens in and posts reminders to
    pub target_channel_id: u64,
    pub command_prefix: String,
    pub store_backend: StoreBackend,
    pub database_path: String,
    /// Used for rendering and for reading user input; comparisons stay in UTC
    pub display_timezone: Tz,
    pub reminder_schedule: ReminderSchedule,
    pub poll_interval: Duration,
    pub send_timeout: Duration,
    pub store_timeout: Duration,
    /// Commands allowed per user per [`COMMAND_RATE_WINDOW`]
    pub command_rate_limit: usize,
    pub log_level: String,
}

/// Sliding window for the per-user command limit
pub const COMMAND_RATE_WINDOW: Duration = Duration::from_secs(10);

impl Config {
    /// Load from the config file named by `CONFIG_PATH` and the process environment
    pub fn from_env() -> Result<Self> {
        let path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let file = FileConfig::load(&path)?;
        let config = Self::from_sources(file, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Merge a file config with an environment lookup. Environment wins.
    pub fn from_sources<F>(file: FileConfig, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let discord_token = get("DISCORD_TOKEN")
            .or(file.discord_token)
            .ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let target_channel_id = match get("TARGET_CHANNEL_ID") {
            Some(raw) => parse_number::<u64>("TARGET_CHANNEL_ID", &raw)?,
            None => file
                .target_channel_id
                .ok_or(ConfigError::Missing("TARGET_CHANNEL_ID"))?,
        };

        let command_prefix = get("COMMAND_PREFIX")
            .or(file.prefix)
            .unwrap_or_else(|| ".".to_string());

        let store_backend = get("STORE_BACKEND")
            .or(file.store_backend)
            .map(|raw| raw.parse::<StoreBackend>())
            .transpose()?
            .unwrap_or(StoreBackend::Sqlite);

        let database_path = get("DATABASE_PATH")
            .or(file.database)
            .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string());

        let timezone = get("DISPLAY_TIMEZONE")
            .or(file.timezone)
            .unwrap_or_else(|| "UTC".to_string());
        let display_timezone = timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::Invalid {
                key: "DISPLAY_TIMEZONE",
                reason: e.to_string(),
            })?;

        let reminder_schedule = ReminderSchedule::parse(
            &get("REMINDER_SCHEDULE")
                .or(file.reminder_schedule)
                .unwrap_or_else(|| DEFAULT_SCHEDULE.to_string()),
        )?;

        let secs = |key: &'static str, from_file: Option<u64>, default: u64| -> Result<Duration, ConfigError> {
            let value = match get(key) {
                Some(raw) => parse_number::<u64>(key, &raw)?,
                None => from_file.unwrap_or(default),
            };
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must be greater than zero".to_string(),
                });
            }
            Ok(Duration::from_secs(value))
        };

        let poll_interval = secs("POLL_INTERVAL_SECS", file.poll_interval_secs, 600)?;
        let send_timeout = secs("SEND_TIMEOUT_SECS", file.send_timeout_secs, 5)?;
        let store_timeout = secs("STORE_TIMEOUT_SECS", file.store_timeout_secs, 5)?;

        let command_rate_limit = match get("COMMAND_RATE_LIMIT") {
            Some(raw) => parse_number::<usize>("COMMAND_RATE_LIMIT", &raw)?,
            None => file.command_rate_limit.unwrap_or(5),
        };

        let log_level = get("LOG_LEVEL")
            .or(file.log_level)
            .unwrap_or_else(|| "info".to_string());

        Ok(Config {
            discord_token,
            target_channel_id,
            command_prefix,
            store_backend,
            database_path,
            display_timezone,
            reminder_schedule,
            poll_interval,
            send_timeout,
            store_timeout,
            command_rate_limit,
            log_level,
        })
    }
}

fn parse_number<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        reason: format!("'{raw}': {e}"),
    })
}
