use chrono::Duration as ChronoDuration;
use std::time::Duration;
use tokio::time;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::error::AppError;
use crate::models::ReserveHealth;
use crate::services::YieldEngine;

/// Outcome of one monitoring pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringReport {
    pub prices_refreshed: bool,
    pub price_stale: bool,
    pub reserve: ReserveHealth,
    pub system_healthy: bool,
}

/// Periodically refreshes oracle prices and re-evaluates reserve health,
/// acting as a configured operator identity.
pub struct MonitoringService {
    engine: YieldEngine,
    operator: String,
    interval: Duration,
    refresh_prices: bool,
    max_staleness: ChronoDuration,
}

impl MonitoringService {
    pub fn new(engine: YieldEngine, settings: &Settings) -> Self {
        Self {
            engine,
            operator: settings.engine.operator_identity.clone(),
            interval: settings.risk_check_interval(),
            refresh_prices: settings.monitoring.refresh_prices,
            max_staleness: settings.max_price_staleness(),
        }
    }

    pub async fn start_monitoring(&self) -> Result<(), AppError> {
        info!(
            "Starting risk monitoring every {}s as {}",
            self.interval.as_secs(),
            self.operator
        );

        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            if let Err(e) = self.run_cycle().await {
                error!("Error during monitoring cycle: {}", e);
            }
        }
    }

    /// A failed price refresh is logged and the cached prices stay in use;
    /// the reserve check still runs.
    pub async fn run_cycle(&self) -> Result<MonitoringReport, AppError> {
        let mut prices_refreshed = false;
        if self.refresh_prices {
            match self.engine.refresh_prices(&self.operator).await {
                Ok(_) => prices_refreshed = true,
                Err(e) if e.is_retryable() => warn!("Price refresh failed, will retry: {}", e),
                Err(e) => error!("Price refresh failed: {}", e),
            }
        }

        let price_stale = self.engine.is_price_stale(self.max_staleness).await;
        if price_stale {
            warn!(
                "Cached price older than {}s or missing",
                self.max_staleness.num_seconds()
            );
        }

        let reserve = self.engine.check_reserve_health(&self.operator).await?;
        let system_healthy = self.engine.is_system_healthy().await;
        if reserve.is_healthy && system_healthy {
            info!(
                reserve = %reserve.total_reserve,
                required = %reserve.required_reserve,
                "Monitoring cycle complete"
            );
        } else {
            warn!(
                reserve = %reserve.total_reserve,
                required = %reserve.required_reserve,
                safeguard_triggered = reserve.safeguard_triggered,
                system_healthy,
                "Monitoring cycle found an unhealthy system"
            );
        }

        Ok(MonitoringReport {
            prices_refreshed,
            price_stale,
            reserve,
            system_healthy,
        })
    }
}
