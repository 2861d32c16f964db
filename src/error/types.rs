// Engine error taxonomy
use thiserror::Error;

use crate::models::{DistributionId, DistributionStatus};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Invalid state: distribution {id} is {status:?}, cannot {operation}")]
    InvalidState {
        id: DistributionId,
        status: DistributionStatus,
        operation: &'static str,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Holder {holder} not found in distribution {id}")]
    HolderNotFound { id: DistributionId, holder: String },

    #[error("Nothing to claim for holder {holder} in distribution {id}")]
    NothingToClaim { id: DistributionId, holder: String },

    #[error("Unauthorized: {caller} may not {action}")]
    Unauthorized { caller: String, action: &'static str },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Arity mismatch: {holders} holders but {balances} balances")]
    ArityMismatch { holders: usize, balances: usize },

    #[error("Duplicate holder {0} in distribution")]
    DuplicateHolder(String),

    #[error("Insufficient pool: requested {requested}, available {available}")]
    InsufficientPool { requested: u128, available: u128 },

    #[error("Price feed unavailable: {0}")]
    PriceFeedUnavailable(String),

    #[error("Invalid price feed: {0}")]
    InvalidPriceFeed(String),

    #[error("Division guard: {0} is zero")]
    DivisionGuard(&'static str),

    #[error("Arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),

    #[error("Invalid threshold: {field} must be between {min} and {max} bps, got {value}")]
    InvalidThreshold {
        field: &'static str,
        min: u32,
        max: u32,
        value: u32,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("External service error: {service} - {message}")]
    ExternalServiceError { service: String, message: String },

    #[error("Timeout error: {operation}")]
    Timeout { operation: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Transient failures a caller may retry without changing its inputs.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Timeout { .. }
                | AppError::ExternalServiceError { .. }
                | AppError::PriceFeedUnavailable(_)
        )
    }

    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::ExternalServiceError {
            service: service.into(),
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return AppError::Timeout {
                operation: "http request".to_string(),
            };
        }
        AppError::external("http", err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(format!("I/O error: {}", err))
    }
}

impl From<bigdecimal::ParseBigDecimalError> for AppError {
    fn from(err: bigdecimal::ParseBigDecimalError) -> Self {
        AppError::InvalidPriceFeed(format!("unparseable decimal: {}", err))
    }
}
