use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use super::validator::ConfigValidator;
use crate::error::AppError;
use crate::models::Thresholds;
use crate::utils::math::PRICE_DECIMALS;

/// Environment variable naming an optional TOML settings file
pub const CONFIG_PATH_ENV: &str = "YIELD_ENGINE_CONFIG";
/// Prefix for environment overrides, e.g. `YIELD_ENGINE__ORACLE__TIMEOUT_MS`
pub const ENV_PREFIX: &str = "YIELD_ENGINE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub engine: EngineSettings,
    pub oracle: OracleSettings,
    pub monitoring: MonitoringSettings,
    pub persistence: PersistenceSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub min_reserve_ratio_bps: u32,
    pub default_threshold_bps: u32,
    pub admins: Vec<String>,
    pub operators: Vec<String>,
    /// Identity the monitoring loop acts as
    pub operator_identity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleSettings {
    pub price_feed_url: Option<String>,
    pub inflation_feed_url: Option<String>,
    pub timeout_ms: u64,
    pub max_staleness_seconds: u64,
    pub price_decimals: u32,
    /// Inflation feeds publish bps directly
    pub inflation_decimals: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringSettings {
    pub risk_check_interval_seconds: u64,
    pub refresh_prices: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceSettings {
    pub snapshot_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            engine: EngineSettings::default(),
            oracle: OracleSettings::default(),
            monitoring: MonitoringSettings::default(),
            persistence: PersistenceSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        let thresholds = Thresholds::default();
        EngineSettings {
            min_reserve_ratio_bps: thresholds.min_reserve_ratio,
            default_threshold_bps: thresholds.default_threshold,
            admins: Vec::new(),
            operators: vec!["risk-monitor".to_string()],
            operator_identity: "risk-monitor".to_string(),
        }
    }
}

impl Default for OracleSettings {
    fn default() -> Self {
        OracleSettings {
            price_feed_url: None,
            inflation_feed_url: None,
            timeout_ms: 5_000,
            max_staleness_seconds: 3_600,
            price_decimals: PRICE_DECIMALS,
            inflation_decimals: 0,
        }
    }
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        MonitoringSettings {
            risk_check_interval_seconds: 300,
            refresh_prices: true,
        }
    }
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        PersistenceSettings {
            snapshot_path: Some("yield_engine_snapshot.json".to_string()),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// Layers defaults, an optional TOML file and `YIELD_ENGINE__*`
    /// environment variables, then validates the result.
    pub fn new() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?);

        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(config::File::with_name(&path).required(true));
        }

        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("engine.admins")
                    .with_list_parse_key("engine.operators")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        ConfigValidator::new()
            .validate(self)
            .map_err(|e| AppError::ConfigError(e.to_string()))
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            min_reserve_ratio: self.engine.min_reserve_ratio_bps,
            default_threshold: self.engine.default_threshold_bps,
        }
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle.timeout_ms)
    }

    pub fn risk_check_interval(&self) -> Duration {
        Duration::from_secs(self.monitoring.risk_check_interval_seconds)
    }

    pub fn max_price_staleness(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.oracle.max_staleness_seconds as i64)
    }
}
