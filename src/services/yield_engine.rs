use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::auth::{AccessControl, EngineAction};
use crate::error::AppError;
use crate::models::{
    Amount, CreateDistribution, DefaultAssessment, DistributionId, DistributionView,
    EngineEvent, EngineSnapshot, PoolTotals, PriceSnapshot, PropertyId, ReserveHealth,
    RiskMetrics, Thresholds, SNAPSHOT_VERSION,
};
use crate::services::price_oracle::{self, PriceOracleAdapter, PriceUpdate};
use crate::services::{
    DistributionLedger, EventSink, NoopTransfer, PayoutTransfer, RiskEngine, TracingEventSink,
    YieldPoolManager,
};
use crate::utils::time::{age, Clock, SystemClock};

/// All mutable engine state. Only ever touched through the engine's lock.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub ledger: DistributionLedger,
    pub pool: YieldPoolManager,
    pub risk: RiskEngine,
    pub prices: PriceSnapshot,
}

impl EngineState {
    fn new(thresholds: Thresholds) -> Result<Self, AppError> {
        Ok(Self {
            ledger: DistributionLedger::new(),
            pool: YieldPoolManager::new(),
            risk: RiskEngine::new(thresholds)?,
            prices: PriceSnapshot::default(),
        })
    }
}

/// Single-writer front door to the distribution ledger, yield pool, risk
/// engine and price cache.
///
/// Every mutating call is authorised, then runs to completion under the write
/// lock: it either commits all of its changes and publishes its events before
/// the lock is released, or fails without changing anything. Reads share the
/// lock and always see a fully applied state. Oracle I/O happens outside the
/// lock so a slow feed never blocks other calls.
#[derive(Clone)]
pub struct YieldEngine {
    state: Arc<RwLock<EngineState>>,
    oracle: PriceOracleAdapter,
    access: Arc<dyn AccessControl>,
    transfers: Arc<dyn PayoutTransfer>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl YieldEngine {
    pub fn new(
        thresholds: Thresholds,
        oracle: PriceOracleAdapter,
        access: Arc<dyn AccessControl>,
    ) -> Result<Self, AppError> {
        Ok(Self::from_state(EngineState::new(thresholds)?, oracle, access))
    }

    /// Rebuilds an engine from persisted state.
    pub fn restore(
        snapshot: EngineSnapshot,
        oracle: PriceOracleAdapter,
        access: Arc<dyn AccessControl>,
    ) -> Result<Self, AppError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(AppError::SerializationError(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        let state = EngineState {
            ledger: DistributionLedger::restore(
                snapshot.distributions,
                snapshot.distribution_count,
                snapshot.last_distribution_timestamp,
            )?,
            pool: YieldPoolManager::from_pool(snapshot.pool),
            risk: RiskEngine::restore(snapshot.risk, snapshot.thresholds)?,
            prices: snapshot.prices,
        };
        info!(
            "Restored engine with {} distributions",
            state.ledger.distribution_count()
        );
        Ok(Self::from_state(state, oracle, access))
    }

    fn from_state(
        state: EngineState,
        oracle: PriceOracleAdapter,
        access: Arc<dyn AccessControl>,
    ) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
            oracle,
            access,
            transfers: Arc::new(NoopTransfer),
            events: Arc::new(TracingEventSink),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_transfer(mut self, transfers: Arc<dyn PayoutTransfer>) -> Self {
        self.transfers = transfers;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Runs `op` atomically under the write lock after the access check.
    async fn mutate<T, F>(&self, caller: &str, action: EngineAction<'_>, op: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut EngineState, DateTime<Utc>, &mut Vec<EngineEvent>) -> Result<T, AppError>,
    {
        self.access.authorize(caller, action)?;
        let mut state = self.state.write().await;
        let now = self.clock.now();
        let mut events = Vec::new();
        let result = op(&mut *state, now, &mut events)?;
        for event in &events {
            self.events.publish(event);
        }
        debug!("{} committed {} events", caller, events.len());
        Ok(result)
    }

    // Distribution ledger

    pub async fn create_distribution(
        &self,
        caller: &str,
        request: CreateDistribution,
    ) -> Result<DistributionId, AppError> {
        self.mutate(caller, EngineAction::CreateDistribution, |state, now, events| {
            state.ledger.create(&mut state.pool, request, now, events)
        })
        .await
    }

    pub async fn start_distribution(&self, caller: &str, id: DistributionId) -> Result<(), AppError> {
        self.mutate(caller, EngineAction::ManageDistribution, |state, now, events| {
            state.ledger.start(id, now, events)
        })
        .await
    }

    pub async fn pause_distribution(&self, caller: &str, id: DistributionId) -> Result<(), AppError> {
        self.mutate(caller, EngineAction::ManageDistribution, |state, now, events| {
            state.ledger.pause(id, now, events)
        })
        .await
    }

    pub async fn resume_distribution(&self, caller: &str, id: DistributionId) -> Result<(), AppError> {
        self.mutate(caller, EngineAction::ManageDistribution, |state, now, events| {
            state.ledger.resume(id, now, events)
        })
        .await
    }

    /// Pays `holder` their remaining share. The safeguard does not block
    /// claims; pausing the distribution does.
    pub async fn claim(
        &self,
        caller: &str,
        id: DistributionId,
        holder: &str,
    ) -> Result<Amount, AppError> {
        self.mutate(caller, EngineAction::Claim { holder }, |state, now, events| {
            state.ledger.claim(&mut state.pool, id, holder, now, events)
        })
        .await
    }

    pub async fn get_distribution(&self, id: DistributionId) -> Result<DistributionView, AppError> {
        self.state.read().await.ledger.get(id)
    }

    pub async fn list_distributions(&self) -> Vec<DistributionView> {
        self.state.read().await.ledger.list()
    }

    pub async fn claimable(&self, id: DistributionId, holder: &str) -> Result<Amount, AppError> {
        self.state.read().await.ledger.claimable(id, holder)
    }

    pub async fn distribution_count(&self) -> u64 {
        self.state.read().await.ledger.distribution_count()
    }

    pub async fn last_distribution_timestamp(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.ledger.last_distribution_timestamp()
    }

    // Yield pool

    pub async fn deposit(&self, caller: &str, amount: Amount) -> Result<PoolTotals, AppError> {
        self.mutate(caller, EngineAction::ManagePool, |state, now, events| {
            state.pool.credit(amount, now, events)?;
            Ok(state.pool.totals())
        })
        .await
    }

    /// Withdraws uncommitted liquidity from the pool. Yield still owed to
    /// holders of unfinished distributions cannot be withdrawn. The external
    /// transfer runs before the decrement is applied; if it fails nothing
    /// changes.
    pub async fn withdraw(&self, caller: &str, amount: Amount) -> Result<PoolTotals, AppError> {
        let transfers = self.transfers.clone();
        self.mutate(caller, EngineAction::ManagePool, move |state, now, events| {
            let committed = state.ledger.outstanding_obligations();
            state.pool.ensure_withdrawable(amount, committed)?;
            transfers.transfer(amount, "yield pool withdrawal")?;
            state.pool.withdraw(amount, committed, now, events)?;
            Ok(state.pool.totals())
        })
        .await
    }

    pub async fn pool_totals(&self) -> PoolTotals {
        self.state.read().await.pool.totals()
    }

    /// Pool liquidity over total claimed yield, in bps.
    pub async fn pool_coverage_ratio_bps(&self) -> Result<u128, AppError> {
        self.state.read().await.pool.coverage_ratio_bps()
    }

    // Risk engine

    /// Recomputes reserve health. Besides returning the figures this may raise
    /// the safeguard; `ReserveHealth::safeguard_triggered` says whether it did
    /// and a `SafeguardTriggered` event is published when it does.
    pub async fn check_reserve_health(&self, caller: &str) -> Result<ReserveHealth, AppError> {
        self.mutate(caller, EngineAction::CheckReserveHealth, |state, now, events| {
            state.risk.check_reserve_health(&state.pool, now, events)
        })
        .await
    }

    /// Records a missed rental payment. May raise the safeguard, reported the
    /// same way as `check_reserve_health`.
    pub async fn record_default(
        &self,
        caller: &str,
        property_id: PropertyId,
        amount: Amount,
    ) -> Result<DefaultAssessment, AppError> {
        self.mutate(caller, EngineAction::RecordDefault, |state, now, events| {
            state.risk.record_default(&state.pool, property_id, amount, now, events)
        })
        .await
    }

    pub async fn trigger_safeguard(&self, caller: &str, reason: &str) -> Result<(), AppError> {
        self.mutate(caller, EngineAction::ManageSafeguard, |state, now, events| {
            state.risk.trigger_safeguard(reason, now, events);
            Ok(())
        })
        .await
    }

    pub async fn activate_safeguard(&self, caller: &str, reason: &str) -> Result<(), AppError> {
        self.mutate(caller, EngineAction::ManageSafeguard, |state, now, events| {
            state.risk.activate_safeguard(reason, now, events);
            Ok(())
        })
        .await
    }

    pub async fn deactivate_safeguard(&self, caller: &str) -> Result<(), AppError> {
        self.mutate(caller, EngineAction::ManageSafeguard, |state, now, events| {
            state.risk.deactivate_safeguard(now, events);
            Ok(())
        })
        .await
    }

    pub async fn set_min_reserve_ratio(&self, caller: &str, bps: u32) -> Result<(), AppError> {
        self.mutate(caller, EngineAction::ManageThresholds, |state, now, events| {
            state.risk.set_min_reserve_ratio(bps, now, events)
        })
        .await
    }

    pub async fn set_default_threshold(&self, caller: &str, bps: u32) -> Result<(), AppError> {
        self.mutate(caller, EngineAction::ManageThresholds, |state, now, events| {
            state.risk.set_default_threshold(bps, now, events)
        })
        .await
    }

    pub async fn is_system_healthy(&self) -> bool {
        let state = self.state.read().await;
        state.risk.is_system_healthy(&state.pool)
    }

    pub async fn safeguard_active(&self) -> bool {
        self.state.read().await.risk.safeguard_active()
    }

    pub async fn risk_metrics(&self) -> RiskMetrics {
        let state = self.state.read().await;
        state.risk.metrics(&state.pool)
    }

    pub async fn property_defaults(&self, property_id: PropertyId) -> Amount {
        self.state.read().await.risk.property_defaults(property_id)
    }

    pub async fn thresholds(&self) -> Thresholds {
        self.state.read().await.risk.thresholds()
    }

    // Price oracle

    /// Reads both feeds and replaces the cached snapshot. On any failure the
    /// cache keeps its previous values.
    pub async fn refresh_prices(&self, caller: &str) -> Result<PriceSnapshot, AppError> {
        self.access.authorize(caller, EngineAction::RefreshPrices)?;
        let update = self.oracle.fetch_update().await?;
        self.mutate(caller, EngineAction::RefreshPrices, |state, now, events| {
            apply_price_update(&mut state.prices, update, now, events);
            Ok(state.prices)
        })
        .await
    }

    /// Cached price, or a live read when nothing is cached yet.
    pub async fn price(&self) -> Result<i128, AppError> {
        let cached = self.state.read().await.prices.last_price;
        if let Some(price) = cached {
            return Ok(price);
        }

        let reading = self.oracle.read_price().await?;
        let mut state = self.state.write().await;
        if let Some(price) = state.prices.last_price {
            // Another caller filled the cache while we were reading.
            return Ok(price);
        }
        state.prices.apply_price(reading);
        self.events.publish(&EngineEvent::PriceFeedUpdated {
            price: Some(reading.value),
            inflation_index: state.prices.last_inflation_index,
            updated_at: reading.updated_at,
            at: self.clock.now(),
        });
        Ok(reading.value)
    }

    /// Cached inflation index, or a live read when nothing is cached yet.
    pub async fn inflation_index(&self) -> Result<i128, AppError> {
        let cached = self.state.read().await.prices.last_inflation_index;
        if let Some(index) = cached {
            return Ok(index);
        }

        let reading = self.oracle.read_inflation().await?;
        let mut state = self.state.write().await;
        if let Some(index) = state.prices.last_inflation_index {
            return Ok(index);
        }
        state.prices.apply_inflation(reading);
        self.events.publish(&EngineEvent::PriceFeedUpdated {
            price: state.prices.last_price,
            inflation_index: Some(reading.value),
            updated_at: reading.updated_at,
            at: self.clock.now(),
        });
        Ok(reading.value)
    }

    pub async fn to_quote_currency(&self, base_amount: Amount) -> Result<Amount, AppError> {
        let price = self.price().await?;
        price_oracle::to_quote_currency(base_amount, price)
    }

    pub async fn to_base_currency(&self, quote_amount: Amount) -> Result<Amount, AppError> {
        let price = self.price().await?;
        price_oracle::to_base_currency(quote_amount, price)
    }

    /// Scales `amount` by the cached inflation index over `months`. Returns
    /// the amount unchanged when no index is cached.
    pub async fn inflation_adjusted(&self, amount: Amount, months: u32) -> Result<Amount, AppError> {
        let prices = self.state.read().await.prices;
        price_oracle::inflation_adjusted(&prices, amount, months)
    }

    pub async fn price_snapshot(&self) -> PriceSnapshot {
        self.state.read().await.prices
    }

    /// Age of the cached price by the feed's own timestamp.
    pub async fn price_age(&self) -> Option<Duration> {
        let updated = self.state.read().await.prices.price_feed_update_time;
        updated.map(|updated| age(updated, self.clock.now()))
    }

    /// True when no price is cached or the feed's own timestamp is older
    /// than `max_age`.
    pub async fn is_price_stale(&self, max_age: Duration) -> bool {
        match self.price_age().await {
            Some(age) => age > max_age,
            None => true,
        }
    }

    // Persistence

    pub async fn snapshot(&self) -> EngineSnapshot {
        let state = self.state.read().await;
        EngineSnapshot {
            version: SNAPSHOT_VERSION,
            taken_at: self.clock.now(),
            distributions: state.ledger.distributions().clone(),
            distribution_count: state.ledger.distribution_count(),
            last_distribution_timestamp: state.ledger.last_distribution_timestamp(),
            pool: *state.pool.pool(),
            risk: state.risk.state().clone(),
            thresholds: state.risk.thresholds(),
            prices: state.prices,
        }
    }

    /// Writes a JSON snapshot, replacing `path` only once the write is complete.
    pub async fn save_snapshot(&self, path: &Path) -> Result<(), AppError> {
        let snapshot = self.snapshot().await;
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        info!(
            "Saved snapshot of {} distributions to {}",
            snapshot.distribution_count,
            path.display()
        );
        Ok(())
    }
}

pub async fn load_snapshot(path: &Path) -> Result<Option<EngineSnapshot>, AppError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("No snapshot at {}, starting empty", path.display());
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn apply_price_update(
    prices: &mut PriceSnapshot,
    update: PriceUpdate,
    now: DateTime<Utc>,
    events: &mut Vec<EngineEvent>,
) {
    prices.apply_price(update.price);
    if let Some(inflation) = update.inflation {
        prices.apply_inflation(inflation);
    }
    events.push(EngineEvent::PriceFeedUpdated {
        price: Some(update.price.value),
        inflation_index: prices.last_inflation_index,
        updated_at: update.price.updated_at,
        at: now,
    });
}
