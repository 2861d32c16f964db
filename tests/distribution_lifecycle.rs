mod common;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use common::{harness, request, ADMIN, OPERATOR};
use rental_yield_engine::{
    error::AppError,
    models::{DistributionStatus, EngineEvent},
    services::{PriceOracleAdapter, StaticPriceFeed},
    utils::{math::PRICE_SCALE, time::Clock},
};

#[tokio::test]
async fn test_full_lifecycle_completes_after_last_claim() {
    let h = harness(PriceOracleAdapter::disconnected());
    let id = h
        .engine
        .create_distribution(ADMIN, request(7, &[("A", 600), ("B", 400)]))
        .await
        .unwrap();
    assert_eq!(id, 1);
    assert_eq!(h.engine.pool_totals().await.total_yield_pool, 1_000);

    h.engine.start_distribution(ADMIN, id).await.unwrap();
    assert_eq!(h.engine.claim("A", id, "A").await.unwrap(), 600);

    let view = h.engine.get_distribution(id).await.unwrap();
    assert_eq!(view.status, DistributionStatus::Distributing);
    assert_eq!(view.distributed_yield, 600);

    assert_eq!(h.engine.claim("B", id, "B").await.unwrap(), 400);
    let view = h.engine.get_distribution(id).await.unwrap();
    assert_eq!(view.status, DistributionStatus::Completed);
    assert_eq!(view.distributed_yield, 1_000);
    assert!(view.completed_at.is_some());

    let totals = h.engine.pool_totals().await;
    assert_eq!(totals.total_yield_pool, 0);
    assert_eq!(totals.total_distributed_yield, 1_000);
}

#[tokio::test]
async fn test_double_claim_is_rejected() {
    let h = harness(PriceOracleAdapter::disconnected());
    let id = h
        .engine
        .create_distribution(ADMIN, request(1, &[("A", 600), ("B", 400)]))
        .await
        .unwrap();
    h.engine.start_distribution(ADMIN, id).await.unwrap();
    h.engine.claim("A", id, "A").await.unwrap();

    let events_before = h.trail.len();
    let err = h.engine.claim("A", id, "A").await.unwrap_err();
    assert!(matches!(err, AppError::NothingToClaim { .. }));
    assert_eq!(h.trail.len(), events_before);
    assert_eq!(h.engine.get_distribution(id).await.unwrap().distributed_yield, 600);
}

#[tokio::test]
async fn test_claim_requires_distributing_state() {
    let h = harness(PriceOracleAdapter::disconnected());
    let id = h
        .engine
        .create_distribution(ADMIN, request(1, &[("A", 100)]))
        .await
        .unwrap();

    assert!(matches!(
        h.engine.claim("A", id, "A").await,
        Err(AppError::InvalidState { .. })
    ));
    assert!(matches!(
        h.engine.claim(ADMIN, id, "Z").await,
        Err(AppError::HolderNotFound { .. })
    ));
    assert!(matches!(
        h.engine.claim(ADMIN, 99, "A").await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_holder_cannot_claim_for_someone_else() {
    let h = harness(PriceOracleAdapter::disconnected());
    let id = h
        .engine
        .create_distribution(ADMIN, request(1, &[("A", 600), ("B", 400)]))
        .await
        .unwrap();
    h.engine.start_distribution(ADMIN, id).await.unwrap();

    assert!(matches!(
        h.engine.claim("A", id, "B").await,
        Err(AppError::Unauthorized { .. })
    ));
    assert_eq!(h.engine.claimable(id, "B").await.unwrap(), 400);
}

#[tokio::test]
async fn test_pause_on_paused_distribution_leaves_it_unchanged() {
    let h = harness(PriceOracleAdapter::disconnected());
    let id = h
        .engine
        .create_distribution(ADMIN, request(1, &[("A", 100)]))
        .await
        .unwrap();
    h.engine.start_distribution(ADMIN, id).await.unwrap();
    h.engine.pause_distribution(ADMIN, id).await.unwrap();
    let before = h.engine.get_distribution(id).await.unwrap();

    let err = h.engine.pause_distribution(ADMIN, id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState { .. }));
    assert_eq!(h.engine.get_distribution(id).await.unwrap(), before);

    h.engine.resume_distribution(ADMIN, id).await.unwrap();
    assert_eq!(h.engine.claim("A", id, "A").await.unwrap(), 100);
}

#[tokio::test]
async fn test_mismatched_balances_create_nothing() {
    let h = harness(PriceOracleAdapter::disconnected());
    let mut bad = request(1, &[("A", 600), ("B", 400)]);
    bad.total_yield = 1_001;

    assert!(matches!(
        h.engine.create_distribution(ADMIN, bad).await,
        Err(AppError::InvalidAmount(_))
    ));
    assert_eq!(h.engine.distribution_count().await, 0);
    assert_eq!(h.engine.pool_totals().await.total_yield_pool, 0);
    assert!(h.trail.is_empty());
}

#[tokio::test]
async fn test_withdraw_cannot_take_yield_owed_to_holders() {
    let h = harness(PriceOracleAdapter::disconnected());
    let id = h
        .engine
        .create_distribution(ADMIN, request(1, &[("A", 600), ("B", 400)]))
        .await
        .unwrap();
    h.engine.start_distribution(ADMIN, id).await.unwrap();

    let err = h.engine.withdraw(ADMIN, 1_000).await.unwrap_err();
    assert_eq!(err, AppError::InsufficientPool { requested: 1_000, available: 0 });
    assert_eq!(h.engine.pool_totals().await.total_yield_pool, 1_000);

    // Surplus liquidity stays withdrawable while the distribution is paused.
    h.engine.deposit(ADMIN, 250).await.unwrap();
    h.engine.pause_distribution(ADMIN, id).await.unwrap();
    assert!(h.engine.withdraw(ADMIN, 251).await.is_err());
    h.engine.withdraw(ADMIN, 250).await.unwrap();
    h.engine.resume_distribution(ADMIN, id).await.unwrap();

    assert_eq!(h.engine.claim("A", id, "A").await.unwrap(), 600);
    assert_eq!(h.engine.claim("B", id, "B").await.unwrap(), 400);
    let view = h.engine.get_distribution(id).await.unwrap();
    assert_eq!(view.status, DistributionStatus::Completed);
    assert_eq!(h.engine.pool_totals().await.total_yield_pool, 0);
}

#[tokio::test]
async fn test_reserve_shortfall_triggers_safeguard() {
    let h = harness(PriceOracleAdapter::disconnected());
    let id = h
        .engine
        .create_distribution(ADMIN, request(1, &[("A", 9_000), ("B", 1_000)]))
        .await
        .unwrap();
    h.engine.start_distribution(ADMIN, id).await.unwrap();
    h.engine.claim("A", id, "A").await.unwrap();

    let health = h.engine.check_reserve_health(OPERATOR).await.unwrap();
    assert!(!health.is_healthy);
    assert_eq!(health.total_reserve, 1_000);
    assert_eq!(health.required_reserve, 1_500);
    assert!(health.safeguard_triggered);
    assert!(h.engine.safeguard_active().await);
    assert!(!h.engine.is_system_healthy().await);
    assert!(h
        .trail
        .events()
        .iter()
        .any(|e| matches!(e, EngineEvent::SafeguardTriggered { .. })));

    // Advisory only: the remaining holder can still claim.
    assert_eq!(h.engine.claim("B", id, "B").await.unwrap(), 1_000);
}

#[tokio::test]
async fn test_default_above_threshold_triggers_safeguard() {
    let h = harness(PriceOracleAdapter::disconnected());
    h.engine.deposit(ADMIN, 1_000).await.unwrap();

    let assessment = h.engine.record_default(OPERATOR, 3, 150).await.unwrap();
    assert_eq!(assessment.default_ratio, 1_498);
    assert_eq!(assessment.total_defaults, 150);
    assert!(assessment.safeguard_triggered);
    assert_eq!(h.engine.property_defaults(3).await, 150);
    assert!(h.engine.safeguard_active().await);

    h.engine.deactivate_safeguard(ADMIN).await.unwrap();
    assert!(!h.engine.safeguard_active().await);
    assert!(matches!(
        h.engine.deactivate_safeguard(OPERATOR).await,
        Err(AppError::Unauthorized { .. })
    ));
}

#[tokio::test]
async fn test_threshold_updates_are_bounded() {
    let h = harness(PriceOracleAdapter::disconnected());
    assert!(matches!(
        h.engine.set_min_reserve_ratio(ADMIN, 999).await,
        Err(AppError::InvalidThreshold { .. })
    ));
    h.engine.set_min_reserve_ratio(ADMIN, 2_000).await.unwrap();
    h.engine.set_default_threshold(ADMIN, 10_000).await.unwrap();

    let thresholds = h.engine.thresholds().await;
    assert_eq!(thresholds.min_reserve_ratio, 2_000);
    assert_eq!(thresholds.default_threshold, 10_000);
}

#[tokio::test]
async fn test_failed_refresh_keeps_cached_price() {
    let feed = Arc::new(StaticPriceFeed::new("price", 3_000 * PRICE_SCALE as i128, Utc::now()));
    let oracle = PriceOracleAdapter::new(Duration::from_secs(1)).with_price_feed(feed.clone());
    let h = harness(oracle);

    h.engine.refresh_prices(OPERATOR).await.unwrap();
    assert_eq!(h.engine.to_quote_currency(2).await.unwrap(), 6_000);

    feed.fail_with(AppError::external("price", "feed offline"));
    assert!(h.engine.refresh_prices(OPERATOR).await.is_err());
    assert_eq!(h.engine.price().await.unwrap(), 3_000 * PRICE_SCALE as i128);
    assert_eq!(h.engine.to_base_currency(6_000).await.unwrap(), 2);
}

#[tokio::test]
async fn test_price_staleness_follows_clock() {
    let feed = Arc::new(StaticPriceFeed::new("price", 5 * PRICE_SCALE as i128, Utc::now()));
    let oracle = PriceOracleAdapter::new(Duration::from_secs(1)).with_price_feed(feed.clone());
    let h = harness(oracle);

    let updated = h.clock.now();
    feed.set(5 * PRICE_SCALE as i128, updated);
    h.engine.refresh_prices(OPERATOR).await.unwrap();
    assert!(!h.engine.is_price_stale(chrono::Duration::minutes(10)).await);

    h.clock.advance(chrono::Duration::minutes(11));
    assert_eq!(h.engine.price_age().await, Some(chrono::Duration::minutes(11)));
    assert!(h.engine.is_price_stale(chrono::Duration::minutes(10)).await);
}
