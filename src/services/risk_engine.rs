use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::models::{
    Amount, DefaultAssessment, EngineEvent, PropertyId, ReserveHealth, RiskAlertType,
    RiskMetrics, RiskState, SafeguardRecord, SafeguardSource, Thresholds, MAX_THRESHOLD_BPS,
    MIN_THRESHOLD_BPS,
};
use crate::services::YieldPoolManager;
use crate::utils::math::{checked_add, mul_div, ratio_bps, BPS_DENOMINATOR};

pub const RESERVE_BELOW_MINIMUM: &str = "reserve ratio below minimum";
pub const DEFAULT_THRESHOLD_EXCEEDED: &str = "default threshold exceeded";

/// Computes reserve health and default ratios and owns the safeguard flag.
///
/// The safeguard is advisory: raising it never pauses a distribution. An
/// administrator has to pause affected distributions explicitly.
#[derive(Debug, Clone, Default)]
pub struct RiskEngine {
    state: RiskState,
    thresholds: Thresholds,
}

impl RiskEngine {
    pub fn new(thresholds: Thresholds) -> Result<Self, AppError> {
        validate_threshold("min_reserve_ratio", thresholds.min_reserve_ratio)?;
        validate_threshold("default_threshold", thresholds.default_threshold)?;
        Ok(Self {
            state: RiskState::default(),
            thresholds,
        })
    }

    pub fn restore(state: RiskState, thresholds: Thresholds) -> Result<Self, AppError> {
        let mut engine = Self::new(thresholds)?;
        engine.state = state;
        engine.state.trim_safeguard_history();
        Ok(engine)
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn safeguard_active(&self) -> bool {
        self.state.safeguard_active
    }

    /// Compares the reserve held against the share of all obligations that
    /// must stay covered.
    ///
    /// This has two effects: it returns the health figures, and when the
    /// reserve is short and the safeguard is not yet active it raises the
    /// safeguard. `ReserveHealth::safeguard_triggered` reports the second.
    pub fn check_reserve_health(
        &mut self,
        pool: &YieldPoolManager,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) -> Result<ReserveHealth, AppError> {
        let totals = pool.totals();
        let total_reserve = totals.total_yield_pool;
        let total_pending = checked_add(
            totals.total_distributed_yield,
            totals.total_yield_pool,
            "total pending",
        )?;
        let required_reserve = mul_div(
            total_pending,
            self.thresholds.min_reserve_ratio as u128,
            BPS_DENOMINATOR,
            "required reserve",
        )?;
        let is_healthy = total_reserve >= required_reserve;

        self.state.last_risk_check = Some(now);
        events.push(EngineEvent::ReserveHealthCheck {
            is_healthy,
            total_reserve,
            required_reserve,
            at: now,
        });

        let mut safeguard_triggered = false;
        if is_healthy {
            info!(
                "Reserve healthy: {} held, {} required",
                total_reserve, required_reserve
            );
        } else {
            warn!(
                "Reserve below minimum: {} held, {} required",
                total_reserve, required_reserve
            );
            events.push(EngineEvent::RiskAlert {
                alert_type: RiskAlertType::ReserveBelowMinimum,
                message: format!(
                    "reserve {} below required {}",
                    total_reserve, required_reserve
                ),
                at: now,
            });
            if !self.state.safeguard_active {
                self.trigger_safeguard(RESERVE_BELOW_MINIMUM, now, events);
                safeguard_triggered = true;
            }
        }

        Ok(ReserveHealth {
            is_healthy,
            total_reserve,
            required_reserve,
            safeguard_triggered,
        })
    }

    /// Adds a missed payment to the default counters and re-evaluates the
    /// default ratio against the pool. Raises the safeguard when the ratio
    /// exceeds the threshold.
    pub fn record_default(
        &mut self,
        pool: &YieldPoolManager,
        property_id: PropertyId,
        amount: Amount,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) -> Result<DefaultAssessment, AppError> {
        if amount == 0 {
            return Err(AppError::InvalidAmount("default amount must be positive".to_string()));
        }

        let previous_property = self.state.property_defaults.get(&property_id).copied().unwrap_or(0);
        let property_total = checked_add(previous_property, amount, "property defaults")?;
        let total_defaults = checked_add(self.state.total_defaults, amount, "total defaults")?;
        // +1 keeps the ratio defined for an empty pool
        let denominator = checked_add(pool.totals().total_yield_pool, 1, "default ratio denominator")?;
        let default_ratio = ratio_bps(total_defaults, denominator, "default ratio")?;

        self.state.property_defaults.insert(property_id, property_total);
        self.state.total_defaults = total_defaults;
        self.state.default_ratio = default_ratio;
        events.push(EngineEvent::DefaultRecorded {
            property_id,
            amount,
            total_defaults,
            default_ratio,
            at: now,
        });
        info!(
            "Recorded default of {} for property {} (ratio {} bps)",
            amount, property_id, default_ratio
        );

        let exceeded = default_ratio > self.thresholds.default_threshold as u128;
        if exceeded {
            events.push(EngineEvent::RiskAlert {
                alert_type: RiskAlertType::DefaultThresholdExceeded,
                message: format!(
                    "default ratio {} bps above threshold {} bps",
                    default_ratio, self.thresholds.default_threshold
                ),
                at: now,
            });
            self.trigger_safeguard(DEFAULT_THRESHOLD_EXCEEDED, now, events);
        }

        Ok(DefaultAssessment {
            total_defaults,
            property_total,
            default_ratio,
            safeguard_triggered: exceeded,
        })
    }

    /// Raises the safeguard. Every call is logged and recorded, including
    /// repeats while the flag is already up.
    pub fn trigger_safeguard(
        &mut self,
        reason: &str,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) {
        self.raise(reason, SafeguardSource::Automatic, now, events);
    }

    pub fn activate_safeguard(
        &mut self,
        reason: &str,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) {
        self.raise(reason, SafeguardSource::Manual, now, events);
    }

    pub fn deactivate_safeguard(&mut self, now: DateTime<Utc>, events: &mut Vec<EngineEvent>) {
        if self.state.safeguard_active {
            info!("Safeguard deactivated by administrator");
        }
        self.state.safeguard_active = false;
        self.state.safeguard_reason = None;
        self.state.record_safeguard(SafeguardRecord {
            active: false,
            reason: "deactivated".to_string(),
            source: SafeguardSource::Manual,
            at: now,
        });
        events.push(EngineEvent::SafeguardDeactivated { at: now });
    }

    /// False while the safeguard is up; otherwise compares the current
    /// default ratio (against the live pool) with the threshold.
    pub fn is_system_healthy(&self, pool: &YieldPoolManager) -> bool {
        if self.state.safeguard_active {
            return false;
        }
        let pool_size = pool.totals().total_yield_pool;
        if pool_size == 0 {
            return true;
        }
        match ratio_bps(self.state.total_defaults, pool_size, "default ratio") {
            Ok(ratio) => ratio <= self.thresholds.default_threshold as u128,
            Err(_) => false,
        }
    }

    pub fn set_min_reserve_ratio(
        &mut self,
        value: u32,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) -> Result<(), AppError> {
        validate_threshold("min_reserve_ratio", value)?;
        self.thresholds.min_reserve_ratio = value;
        self.thresholds_updated(now, events);
        Ok(())
    }

    pub fn set_default_threshold(
        &mut self,
        value: u32,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) -> Result<(), AppError> {
        validate_threshold("default_threshold", value)?;
        self.thresholds.default_threshold = value;
        self.thresholds_updated(now, events);
        Ok(())
    }

    pub fn property_defaults(&self, property_id: PropertyId) -> Amount {
        self.state.property_defaults.get(&property_id).copied().unwrap_or(0)
    }

    pub fn metrics(&self, pool: &YieldPoolManager) -> RiskMetrics {
        RiskMetrics {
            total_defaults: self.state.total_defaults,
            default_ratio: self.state.default_ratio,
            safeguard_active: self.state.safeguard_active,
            safeguard_reason: self.state.safeguard_reason.clone(),
            last_risk_check: self.state.last_risk_check,
            thresholds: self.thresholds,
            pool_coverage_ratio: pool.coverage_ratio_bps().ok(),
        }
    }

    fn raise(
        &mut self,
        reason: &str,
        source: SafeguardSource,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) {
        error!("Safeguard triggered ({:?}): {}", source, reason);
        self.state.safeguard_active = true;
        self.state.safeguard_reason = Some(reason.to_string());
        self.state.record_safeguard(SafeguardRecord {
            active: true,
            reason: reason.to_string(),
            source,
            at: now,
        });
        events.push(EngineEvent::SafeguardTriggered {
            reason: reason.to_string(),
            at: now,
        });
    }

    fn thresholds_updated(&self, now: DateTime<Utc>, events: &mut Vec<EngineEvent>) {
        info!(
            "Risk thresholds updated: min reserve {} bps, default threshold {} bps",
            self.thresholds.min_reserve_ratio, self.thresholds.default_threshold
        );
        events.push(EngineEvent::ThresholdsUpdated {
            min_reserve_ratio: self.thresholds.min_reserve_ratio,
            default_threshold: self.thresholds.default_threshold,
            at: now,
        });
    }
}

pub fn validate_threshold(field: &'static str, value: u32) -> Result<(), AppError> {
    if !(MIN_THRESHOLD_BPS..=MAX_THRESHOLD_BPS).contains(&value) {
        return Err(AppError::InvalidThreshold {
            field,
            min: MIN_THRESHOLD_BPS,
            max: MAX_THRESHOLD_BPS,
            value,
        });
    }
    Ok(())
}
