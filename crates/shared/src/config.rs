//! Application configuration management.

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::AppError;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Bulk repair configuration.
    #[serde(default)]
    pub repair: RepairConfig,
    /// Engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Scheduled sweep configuration.
    #[serde(default)]
    pub sweep: SweepConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Bulk repair configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RepairConfig {
    /// Records fetched and fixed per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    /// Pause between full batches, in milliseconds.
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
    /// Scopes reconciled concurrently within one account book.
    #[serde(default = "default_scope_concurrency")]
    pub scope_concurrency: usize,
}

fn default_batch_size() -> u64 {
    500
}

fn default_pause_ms() -> u64 {
    2000
}

fn default_scope_concurrency() -> usize {
    4
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            pause_ms: default_pause_ms(),
            scope_concurrency: default_scope_concurrency(),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// IANA timezone used to derive "today" at the outermost call boundary.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

impl EngineConfig {
    /// Parses the configured timezone.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the name is not a known IANA timezone.
    pub fn tz(&self) -> Result<Tz, AppError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| AppError::Config(format!("invalid engine.timezone: {e}")))
    }

    /// Returns today's date in the configured timezone.
    ///
    /// This is the only place the wall clock is read; everything below the
    /// command boundary takes an explicit `as_of` date.
    pub fn today(&self) -> Result<NaiveDate, AppError> {
        let tz = self.tz()?;
        Ok(chrono::Utc::now().with_timezone(&tz).date_naive())
    }
}

/// Scheduled sweep configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    /// Seconds between sweep runs.
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
}

fn default_sweep_interval() -> u64 {
    3600
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("CARRYOVER").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_env_with_defaults() {
        temp_env::with_vars(
            [
                ("CARRYOVER__DATABASE__URL", Some("postgres://localhost/carryover")),
                ("CARRYOVER__REPAIR__BATCH_SIZE", Some("250")),
                ("RUN_MODE", Some("test-nonexistent")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.database.url, "postgres://localhost/carryover");
                assert_eq!(config.database.max_connections, 10);
                assert_eq!(config.repair.batch_size, 250);
                assert_eq!(config.repair.pause_ms, 2000);
                assert_eq!(config.repair.scope_concurrency, 4);
                assert_eq!(config.engine.timezone, "UTC");
                assert_eq!(config.sweep.interval_secs, 3600);
            },
        );
    }

    #[test]
    fn test_missing_database_url_fails() {
        temp_env::with_vars(
            [
                ("CARRYOVER__DATABASE__URL", None::<&str>),
                ("RUN_MODE", Some("test-nonexistent")),
            ],
            || {
                assert!(AppConfig::load().is_err());
            },
        );
    }

    #[test]
    fn test_engine_timezone_parsing() {
        let shanghai = EngineConfig {
            timezone: "Asia/Shanghai".to_string(),
        };
        assert_eq!(shanghai.tz().unwrap(), chrono_tz::Asia::Shanghai);

        let bogus = EngineConfig {
            timezone: "Mars/Olympus".to_string(),
        };
        assert!(matches!(bogus.tz(), Err(AppError::Config(_))));
    }
}
