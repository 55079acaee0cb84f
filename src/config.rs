//! Environment-supplied configuration.
//!
//! The store endpoint and access key come from the environment (a `.env`
//! file is honored). Both are required; everything else has a documented
//! default. Missing credentials or an unparseable numeric value is a
//! [`ConfigError`] at startup, before any load attempt is made.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `SUPABASE_URL` | store endpoint | required |
//! | `SUPABASE_KEY` | store access key | required |
//! | `STAGELOAD_TABLE` | target table | `staged_records` |
//! | `STAGELOAD_BATCH_SIZE` | chunk size | `200` |
//! | `STAGELOAD_MAX_RETRIES` | retries after the first attempt | `3` |
//! | `STAGELOAD_RETRY_DELAY_MS` | constant backoff between attempts | `2000` |
//! | `STAGELOAD_HTTP_TIMEOUT_SECS` | call-level timeout | `30` |

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// Default target table.
pub const DEFAULT_TABLE: &str = "staged_records";

/// Default number of records per chunk.
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default constant delay between attempts, in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2000;

/// Default call-level HTTP timeout, in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Remote store connection settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base endpoint URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Access key sent as `apikey` and bearer token.
    pub key: String,
    /// Call-level timeout applied to every request.
    pub http_timeout: Duration,
}

/// Load-stage tuning values.
#[derive(Debug, Clone)]
pub struct LoadSettings {
    /// Target table name.
    pub table: String,
    /// Records per chunk; must be positive.
    pub batch_size: usize,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Constant delay between attempts.
    pub retry_delay: Duration,
}

/// Complete run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub load: LoadSettings,
}

impl Config {
    /// Read configuration from the environment, honoring a `.env` file.
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();

        let url = require("SUPABASE_URL")?;
        let key = require("SUPABASE_KEY")?;
        let http_timeout_secs: u64 =
            parse_env("STAGELOAD_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;

        let table = env::var("STAGELOAD_TABLE").unwrap_or_else(|_| DEFAULT_TABLE.to_string());
        let batch_size: usize = parse_env("STAGELOAD_BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        if batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(0));
        }
        let max_retries: u32 = parse_env("STAGELOAD_MAX_RETRIES", DEFAULT_MAX_RETRIES)?;
        let retry_delay_ms: u64 = parse_env("STAGELOAD_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS)?;

        Ok(Self {
            store: StoreConfig {
                url,
                key,
                http_timeout: Duration::from_secs(http_timeout_secs),
            },
            load: LoadSettings {
                table,
                batch_size,
                max_retries,
                retry_delay: Duration::from_millis(retry_delay_ms),
            },
        })
    }
}

/// Read a required variable; absent or blank is a [`ConfigError`].
fn require(var: &'static str) -> ConfigResult<String> {
    env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingVar(var))
}

/// Read an optional variable, falling back to `default` when absent.
/// A present-but-unparseable value is an error, not a silent fallback.
fn parse_env<T>(var: &'static str, default: T) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(var) {
        Err(_) => Ok(default),
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            var,
            value: raw,
            reason: e.to_string(),
        }),
    }
}
