use thiserror::Error;
use url::Url;

use super::settings::Settings;
use crate::models::{MAX_THRESHOLD_BPS, MIN_THRESHOLD_BPS};

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Invalid URL: {field} - {url}")]
    InvalidUrl { field: String, url: String },
    #[error("Invalid range: {field} must be between {min} and {max}, got {value}")]
    InvalidRange { field: String, min: u64, max: u64, value: u64 },
    #[error("Invalid format: {field} - {message}")]
    InvalidFormat { field: String, message: String },
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Allowed ranges for numeric settings
#[derive(Debug, Clone)]
pub struct ValidationRules {
    pub threshold_range: (u64, u64),
    pub oracle_timeout_ms_range: (u64, u64),
    pub risk_interval_range: (u64, u64),
    pub decimals_range: (u64, u64),
    pub allowed_url_schemes: Vec<String>,
    pub log_levels: Vec<String>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            threshold_range: (MIN_THRESHOLD_BPS as u64, MAX_THRESHOLD_BPS as u64),
            oracle_timeout_ms_range: (100, 60_000),
            risk_interval_range: (1, 86_400),
            decimals_range: (0, 18),
            allowed_url_schemes: vec!["http".to_string(), "https".to_string()],
            log_levels: ["trace", "debug", "info", "warn", "error"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

pub struct ConfigValidator {
    rules: ValidationRules,
}

impl ConfigValidator {
    pub fn new() -> Self {
        Self {
            rules: ValidationRules::default(),
        }
    }

    pub fn validate(&self, settings: &Settings) -> ValidationResult<()> {
        self.validate_engine(settings)?;
        self.validate_oracle(settings)?;
        self.validate_range(
            settings.monitoring.risk_check_interval_seconds,
            self.rules.risk_interval_range,
            "monitoring.risk_check_interval_seconds",
        )?;
        if !self.rules.log_levels.contains(&settings.logging.level.to_lowercase()) {
            return Err(ValidationError::InvalidFormat {
                field: "logging.level".to_string(),
                message: format!("unknown level {}", settings.logging.level),
            });
        }
        Ok(())
    }

    fn validate_engine(&self, settings: &Settings) -> ValidationResult<()> {
        self.validate_range(
            settings.engine.min_reserve_ratio_bps as u64,
            self.rules.threshold_range,
            "engine.min_reserve_ratio_bps",
        )?;
        self.validate_range(
            settings.engine.default_threshold_bps as u64,
            self.rules.threshold_range,
            "engine.default_threshold_bps",
        )?;
        if settings.engine.operator_identity.trim().is_empty() {
            return Err(ValidationError::InvalidFormat {
                field: "engine.operator_identity".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    fn validate_oracle(&self, settings: &Settings) -> ValidationResult<()> {
        let oracle = &settings.oracle;
        if let Some(url) = &oracle.price_feed_url {
            self.validate_url(url, "oracle.price_feed_url")?;
        }
        if let Some(url) = &oracle.inflation_feed_url {
            self.validate_url(url, "oracle.inflation_feed_url")?;
        }
        self.validate_range(oracle.timeout_ms, self.rules.oracle_timeout_ms_range, "oracle.timeout_ms")?;
        self.validate_range(oracle.price_decimals as u64, self.rules.decimals_range, "oracle.price_decimals")?;
        self.validate_range(
            oracle.inflation_decimals as u64,
            self.rules.decimals_range,
            "oracle.inflation_decimals",
        )?;
        Ok(())
    }

    fn validate_url(&self, value: &str, field: &str) -> ValidationResult<()> {
        let url = Url::parse(value).map_err(|_| ValidationError::InvalidUrl {
            field: field.to_string(),
            url: value.to_string(),
        })?;
        if !self.rules.allowed_url_schemes.iter().any(|s| s == url.scheme()) {
            return Err(ValidationError::InvalidFormat {
                field: field.to_string(),
                message: format!("unsupported scheme: {}", url.scheme()),
            });
        }
        Ok(())
    }

    fn validate_range(&self, value: u64, (min, max): (u64, u64), field: &str) -> ValidationResult<()> {
        if value < min || value > max {
            return Err(ValidationError::InvalidRange {
                field: field.to_string(),
                min,
                max,
                value,
            });
        }
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
