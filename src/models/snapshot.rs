use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Distribution, DistributionId, PriceSnapshot, RiskState, Thresholds, YieldPool};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything the engine persists between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub version: u32,
    pub taken_at: DateTime<Utc>,
    pub distributions: BTreeMap<DistributionId, Distribution>,
    pub distribution_count: u64,
    pub last_distribution_timestamp: Option<DateTime<Utc>>,
    pub pool: YieldPool,
    pub risk: RiskState,
    pub thresholds: Thresholds,
    pub prices: PriceSnapshot,
}

