use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{Amount, PropertyId};

/// Lowest accepted threshold (10%)
pub const MIN_THRESHOLD_BPS: u32 = 1_000;
/// Highest accepted threshold (100%)
pub const MAX_THRESHOLD_BPS: u32 = 10_000;

/// Administrator-configurable risk thresholds, in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub min_reserve_ratio: u32,
    pub default_threshold: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_reserve_ratio: 1_500,
            default_threshold: 1_000,
        }
    }
}

/// Safeguard changes kept in `RiskState::safeguard_history`; older ones are dropped.
pub const MAX_SAFEGUARD_HISTORY: usize = 128;

/// Persisted risk counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskState {
    pub total_defaults: Amount,
    pub property_defaults: HashMap<PropertyId, Amount>,
    /// Ratio computed by the most recent recorded default
    pub default_ratio: u128,
    pub safeguard_active: bool,
    pub safeguard_reason: Option<String>,
    pub safeguard_history: Vec<SafeguardRecord>,
    pub last_risk_check: Option<DateTime<Utc>>,
}

impl RiskState {
    /// Appends to the safeguard history, keeping only the most recent
    /// `MAX_SAFEGUARD_HISTORY` records.
    pub fn record_safeguard(&mut self, record: SafeguardRecord) {
        self.safeguard_history.push(record);
        self.trim_safeguard_history();
    }

    pub fn trim_safeguard_history(&mut self) {
        let excess = self
            .safeguard_history
            .len()
            .saturating_sub(MAX_SAFEGUARD_HISTORY);
        if excess > 0 {
            self.safeguard_history.drain(..excess);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafeguardSource {
    /// Raised by a reserve or default check
    Automatic,
    /// Set or cleared by an administrator
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeguardRecord {
    pub active: bool,
    pub reason: String,
    pub source: SafeguardSource,
    pub at: DateTime<Utc>,
}

/// Outcome of a reserve health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveHealth {
    pub is_healthy: bool,
    pub total_reserve: Amount,
    pub required_reserve: Amount,
    /// True when this check raised the safeguard
    pub safeguard_triggered: bool,
}

/// Outcome of recording a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultAssessment {
    pub total_defaults: Amount,
    pub property_total: Amount,
    pub default_ratio: u128,
    pub safeguard_triggered: bool,
}

/// Point-in-time view of the risk counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub total_defaults: Amount,
    pub default_ratio: u128,
    pub safeguard_active: bool,
    pub safeguard_reason: Option<String>,
    pub last_risk_check: Option<DateTime<Utc>>,
    pub thresholds: Thresholds,
    /// Pool liquidity over claimed yield, in bps; `None` before any claim
    pub pool_coverage_ratio: Option<u128>,
}
