use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, DistributionId, PropertyId};

/// Structured records emitted as part of each committed state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    DistributionCreated {
        distribution_id: DistributionId,
        property_id: PropertyId,
        total_yield: Amount,
        holder_count: usize,
        at: DateTime<Utc>,
    },
    DistributionStarted {
        distribution_id: DistributionId,
        property_id: PropertyId,
        total_yield: Amount,
        at: DateTime<Utc>,
    },
    DistributionPaused {
        distribution_id: DistributionId,
        at: DateTime<Utc>,
    },
    DistributionResumed {
        distribution_id: DistributionId,
        at: DateTime<Utc>,
    },
    DistributionCompleted {
        distribution_id: DistributionId,
        distributed_yield: Amount,
        at: DateTime<Utc>,
    },
    YieldClaimed {
        distribution_id: DistributionId,
        holder_id: String,
        amount: Amount,
        at: DateTime<Utc>,
    },
    YieldPoolUpdated {
        total_yield_pool: Amount,
        total_distributed_yield: Amount,
        at: DateTime<Utc>,
    },
    ReserveHealthCheck {
        is_healthy: bool,
        total_reserve: Amount,
        required_reserve: Amount,
        at: DateTime<Utc>,
    },
    DefaultRecorded {
        property_id: PropertyId,
        amount: Amount,
        total_defaults: Amount,
        default_ratio: u128,
        at: DateTime<Utc>,
    },
    RiskAlert {
        alert_type: RiskAlertType,
        message: String,
        at: DateTime<Utc>,
    },
    SafeguardTriggered {
        reason: String,
        at: DateTime<Utc>,
    },
    SafeguardDeactivated {
        at: DateTime<Utc>,
    },
    ThresholdsUpdated {
        min_reserve_ratio: u32,
        default_threshold: u32,
        at: DateTime<Utc>,
    },
    /// Either field may be absent when only one feed has been read.
    PriceFeedUpdated {
        price: Option<i128>,
        inflation_index: Option<i128>,
        updated_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskAlertType {
    ReserveBelowMinimum,
    DefaultThresholdExceeded,
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::DistributionCreated { .. } => "distribution_created",
            EngineEvent::DistributionStarted { .. } => "distribution_started",
            EngineEvent::DistributionPaused { .. } => "distribution_paused",
            EngineEvent::DistributionResumed { .. } => "distribution_resumed",
            EngineEvent::DistributionCompleted { .. } => "distribution_completed",
            EngineEvent::YieldClaimed { .. } => "yield_claimed",
            EngineEvent::YieldPoolUpdated { .. } => "yield_pool_updated",
            EngineEvent::ReserveHealthCheck { .. } => "reserve_health_check",
            EngineEvent::DefaultRecorded { .. } => "default_recorded",
            EngineEvent::RiskAlert { .. } => "risk_alert",
            EngineEvent::SafeguardTriggered { .. } => "safeguard_triggered",
            EngineEvent::SafeguardDeactivated { .. } => "safeguard_deactivated",
            EngineEvent::ThresholdsUpdated { .. } => "thresholds_updated",
            EngineEvent::PriceFeedUpdated { .. } => "price_feed_updated",
        }
    }

    pub fn distribution_id(&self) -> Option<DistributionId> {
        match self {
            EngineEvent::DistributionCreated { distribution_id, .. }
            | EngineEvent::DistributionStarted { distribution_id, .. }
            | EngineEvent::DistributionPaused { distribution_id, .. }
            | EngineEvent::DistributionResumed { distribution_id, .. }
            | EngineEvent::DistributionCompleted { distribution_id, .. }
            | EngineEvent::YieldClaimed { distribution_id, .. } => Some(*distribution_id),
            _ => None,
        }
    }
}
