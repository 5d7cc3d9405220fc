//! Configuration management with validation and defaults
//!
//! Loaded from TOML, then overridden by `CASINO_*` environment variables.

use crate::errors::{CasinoResult, ConfigurationError};
use serde::{Deserialize, Serialize};
use std::{env, path::Path, time::Duration};

/// Complete casino configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CasinoConfig {
    pub ledger: LedgerConfig,
    pub scheduler: SchedulerConfig,
    pub storage: StorageConfig,
    pub monitoring: MonitoringConfig,
}

/// Account bookkeeping settings (all amounts in cents)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub starting_balance: i64,
    pub daily_stipend: i64,
    /// UTC hour in which the stipend is paid
    pub stipend_hour_utc: u32,
    pub beg_values: Vec<i64>,
    pub currency: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: 200_000,
            daily_stipend: 10_000,
            stipend_hour_utc: 23,
            beg_values: vec![50, 100, 200, 300, 400, 500, 30_000],
            currency: "€".to_string(),
        }
    }
}

/// Betting window timing
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Length of one betting window; the wheel spins once per window
    pub cycle_seconds: u64,
    /// Trailing part of the window in which bets are refused
    pub closing_seconds: u64,
    pub poll_interval_ms: u64,
    /// Games driven by the background loop
    pub games: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_seconds: 120,
            closing_seconds: 5,
            poll_interval_ms: 1_000,
            games: vec!["roulette".to_string()],
        }
    }
}

/// Storage configuration with optimization settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_directory: String,
    /// Keep state in process memory only
    pub in_memory: bool,
    pub write_buffer_size_mb: usize,
    pub max_write_buffer_number: i32,
    pub compression_type: CompressionType,
    /// Whether to clear database on startup (testing only!)
    pub clear_on_start: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompressionType {
    None,
    Snappy,
    Lz4,
    Zstd,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: "./DB/casino_data".to_string(),
            in_memory: false,
            write_buffer_size_mb: 16,
            max_write_buffer_number: 2,
            compression_type: CompressionType::Lz4,
            clear_on_start: false,
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: LogLevel,
    pub stats_interval_seconds: u64,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            stats_interval_seconds: 300,
        }
    }
}

impl CasinoConfig {
    /// In-memory configuration for tests and local experiments
    pub fn testing() -> Self {
        Self {
            storage: StorageConfig {
                in_memory: true,
                ..Default::default()
            },
            monitoring: MonitoringConfig {
                log_level: LogLevel::Debug,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Configuration for a long-running deployment with persistence
    pub fn production() -> Self {
        Self {
            storage: StorageConfig {
                data_directory: "./DB/casino_data".to_string(),
                write_buffer_size_mb: 64,
                max_write_buffer_number: 4,
                clear_on_start: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> CasinoResult<()> {
        if self.ledger.starting_balance < 0 {
            return Err(invalid(
                "ledger.starting_balance",
                self.ledger.starting_balance,
                "Starting balance cannot be negative",
            ));
        }

        if self.ledger.daily_stipend < 0 {
            return Err(invalid(
                "ledger.daily_stipend",
                self.ledger.daily_stipend,
                "Stipend cannot be negative",
            ));
        }

        if self.ledger.stipend_hour_utc > 23 {
            return Err(invalid(
                "ledger.stipend_hour_utc",
                self.ledger.stipend_hour_utc,
                "Hour must be between 0 and 23",
            ));
        }

        if self.ledger.beg_values.iter().any(|v| *v <= 0) {
            return Err(invalid(
                "ledger.beg_values",
                format!("{:?}", self.ledger.beg_values),
                "Beg values must be positive",
            ));
        }

        if self.scheduler.cycle_seconds == 0 {
            return Err(invalid(
                "scheduler.cycle_seconds",
                0,
                "Cycle length must be > 0",
            ));
        }

        if self.scheduler.closing_seconds >= self.scheduler.cycle_seconds {
            return Err(ConfigurationError::ValidationFailed(format!(
                "closing_seconds ({}) must be shorter than cycle_seconds ({})",
                self.scheduler.closing_seconds, self.scheduler.cycle_seconds
            ))
            .into());
        }

        if self.scheduler.poll_interval_ms == 0 {
            return Err(invalid(
                "scheduler.poll_interval_ms",
                0,
                "Poll interval must be > 0",
            ));
        }

        if !self.storage.in_memory && self.storage.data_directory.is_empty() {
            return Err(
                ConfigurationError::MissingRequired("storage.data_directory".to_string()).into(),
            );
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler.poll_interval_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.monitoring.stats_interval_seconds.max(1))
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> crate::errors::CasinoError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

/// Configuration loader with environment variable support
#[derive(Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> CasinoResult<CasinoConfig> {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => CasinoConfig::default(),
        };

        self.apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> CasinoResult<CasinoConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e))
        })?;

        toml::from_str(&content).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into()
        })
    }

    fn apply_env_overrides(&self, config: &mut CasinoConfig) -> CasinoResult<()> {
        if let Ok(data_dir) = env::var("CASINO_DATA_DIR") {
            config.storage.data_directory = data_dir;
        }

        if let Ok(balance) = env::var("CASINO_STARTING_BALANCE") {
            config.ledger.starting_balance = balance.parse().map_err(|_| {
                ConfigurationError::InvalidValue {
                    field: "CASINO_STARTING_BALANCE".to_string(),
                    value: balance,
                    reason: "Invalid amount in cents".to_string(),
                }
            })?;
        }

        if let Ok(interval) = env::var("CASINO_POLL_INTERVAL_MS") {
            config.scheduler.poll_interval_ms = interval.parse().map_err(|_| {
                ConfigurationError::InvalidValue {
                    field: "CASINO_POLL_INTERVAL_MS".to_string(),
                    value: interval,
                    reason: "Invalid interval".to_string(),
                }
            })?;
        }

        if let Ok(games) = env::var("CASINO_GAMES") {
            config.scheduler.games = games
                .split(',')
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty())
                .collect();
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, config: &CasinoConfig, path: &str) -> CasinoResult<()> {
        let toml_string = toml::to_string_pretty(config).map_err(|e| {
            ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, toml_string).map_err(|e| {
            ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = CasinoConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ledger.starting_balance, 200_000);
        assert_eq!(config.scheduler.cycle_seconds, 120);
        assert_eq!(config.scheduler.closing_seconds, 5);
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(CasinoConfig::testing().validate().is_ok());
        assert!(CasinoConfig::production().validate().is_ok());
        assert!(CasinoConfig::testing().storage.in_memory);
    }

    #[test]
    fn test_closing_window_must_fit_cycle() {
        let mut config = CasinoConfig::default();
        config.scheduler.closing_seconds = 120;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_amounts_rejected() {
        let mut config = CasinoConfig::default();
        config.ledger.daily_stipend = -1;
        assert!(config.validate().is_err());

        let mut config = CasinoConfig::default();
        config.ledger.beg_values = vec![100, 0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_conversions() {
        let config = CasinoConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(1_000));
    }

    #[test]
    fn test_save_and_load_config() -> CasinoResult<()> {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        let mut original = CasinoConfig::default();
        original.ledger.starting_balance = 5_000;
        original.scheduler.games = vec!["roulette".to_string(), "lobby".to_string()];

        let loader = ConfigLoader::new();
        loader.save(&original, path)?;

        let loaded = ConfigLoader::new().with_path(path).load()?;
        assert_eq!(loaded.ledger.starting_balance, 5_000);
        assert_eq!(loaded.scheduler.games.len(), 2);
        assert_eq!(loaded.storage.compression_type, CompressionType::Lz4);

        Ok(())
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: CasinoConfig = toml::from_str("[ledger]\nstarting_balance = 42\n").unwrap();
        assert_eq!(config.ledger.starting_balance, 42);
        assert_eq!(config.ledger.daily_stipend, 10_000);
        assert_eq!(config.scheduler.poll_interval_ms, 1_000);
    }
}
