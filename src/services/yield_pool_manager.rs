use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::AppError;
use crate::models::{Amount, EngineEvent, PoolTotals, YieldPool};
use crate::utils::math::{checked_add, fixed_to_decimal, ratio_bps, YIELD_DECIMALS};

/// Owns the aggregate pooled-yield counters.
#[derive(Debug, Clone, Default)]
pub struct YieldPoolManager {
    pool: YieldPool,
}

impl YieldPoolManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pool(pool: YieldPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &YieldPool {
        &self.pool
    }

    pub fn totals(&self) -> PoolTotals {
        PoolTotals::from(&self.pool)
    }

    /// Adds `amount` to the pool.
    pub fn credit(
        &mut self,
        amount: Amount,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) -> Result<(), AppError> {
        self.ensure_creditable(amount)?;
        self.pool.total_yield_pool += amount;
        info!(
            "Yield pool credited {} (pool now {})",
            fixed_to_decimal(amount, YIELD_DECIMALS),
            fixed_to_decimal(self.pool.total_yield_pool, YIELD_DECIMALS)
        );
        events.push(self.updated_event(now));
        Ok(())
    }

    /// Validates a credit without applying it.
    pub fn ensure_creditable(&self, amount: Amount) -> Result<(), AppError> {
        if amount == 0 {
            return Err(AppError::InvalidAmount("credit must be positive".to_string()));
        }
        checked_add(self.pool.total_yield_pool, amount, "yield pool credit")?;
        Ok(())
    }

    /// Validates a withdrawal without applying it. `committed` is yield still
    /// owed to holders and is never available for withdrawal.
    pub fn ensure_withdrawable(&self, amount: Amount, committed: Amount) -> Result<(), AppError> {
        if amount == 0 {
            return Err(AppError::InvalidAmount("withdrawal must be positive".to_string()));
        }
        let available = self.pool.total_yield_pool.saturating_sub(committed);
        if available < amount {
            return Err(AppError::InsufficientPool {
                requested: amount,
                available,
            });
        }
        Ok(())
    }

    /// Removes `amount` from the pool. The external transfer is the caller's
    /// job and must have succeeded before this is applied.
    pub fn withdraw(
        &mut self,
        amount: Amount,
        committed: Amount,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) -> Result<(), AppError> {
        self.ensure_withdrawable(amount, committed)?;
        self.pool.total_yield_pool -= amount;
        info!(
            "Yield pool withdrew {} (pool now {})",
            fixed_to_decimal(amount, YIELD_DECIMALS),
            fixed_to_decimal(self.pool.total_yield_pool, YIELD_DECIMALS)
        );
        events.push(self.updated_event(now));
        Ok(())
    }

    /// Validates that a claim of `amount` can be paid from the pool.
    pub fn ensure_payable(&self, amount: Amount) -> Result<(), AppError> {
        if self.pool.total_yield_pool < amount {
            return Err(AppError::InsufficientPool {
                requested: amount,
                available: self.pool.total_yield_pool,
            });
        }
        checked_add(self.pool.total_distributed_yield, amount, "distributed yield")?;
        Ok(())
    }

    /// Moves a claimed amount out of the pool into the distributed total.
    pub fn record_claim(
        &mut self,
        amount: Amount,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) -> Result<(), AppError> {
        self.ensure_payable(amount)?;
        self.pool.total_yield_pool -= amount;
        self.pool.total_distributed_yield += amount;
        debug!(
            "Claim of {} paid from pool ({} remaining)",
            amount, self.pool.total_yield_pool
        );
        events.push(self.updated_event(now));
        Ok(())
    }

    /// Pool liquidity over claimed yield in bps. Fails with `DivisionGuard`
    /// until something has been claimed.
    pub fn coverage_ratio_bps(&self) -> Result<u128, AppError> {
        ratio_bps(
            self.pool.total_yield_pool,
            self.pool.total_distributed_yield,
            "total distributed yield",
        )
    }

    fn updated_event(&self, now: DateTime<Utc>) -> EngineEvent {
        EngineEvent::YieldPoolUpdated {
            total_yield_pool: self.pool.total_yield_pool,
            total_distributed_yield: self.pool.total_distributed_yield,
            at: now,
        }
    }
}
