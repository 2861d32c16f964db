use serde::{Deserialize, Serialize};

use super::Amount;

/// Aggregate pooled-yield counters.
///
/// `total_yield_pool` is liquidity still held: credited on distribution
/// creation and deposit, debited on claim and withdrawal.
/// `total_distributed_yield` is everything ever claimed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldPool {
    pub total_yield_pool: Amount,
    pub total_distributed_yield: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolTotals {
    pub total_yield_pool: Amount,
    pub total_distributed_yield: Amount,
}

impl From<&YieldPool> for PoolTotals {
    fn from(pool: &YieldPool) -> Self {
        Self {
            total_yield_pool: pool.total_yield_pool,
            total_distributed_yield: pool.total_distributed_yield,
        }
    }
}
