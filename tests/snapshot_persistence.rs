mod common;

use std::sync::Arc;

use common::{harness, request, ADMIN, OPERATOR};
use rental_yield_engine::{
    auth::RoleRegistry,
    error::AppError,
    services::{load_snapshot, PriceOracleAdapter, YieldEngine},
};

#[tokio::test]
async fn test_snapshot_restores_full_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.json");

    let h = harness(PriceOracleAdapter::disconnected());
    let id = h
        .engine
        .create_distribution(ADMIN, request(4, &[("A", 600), ("B", 400)]))
        .await
        .unwrap();
    h.engine.start_distribution(ADMIN, id).await.unwrap();
    h.engine.claim("A", id, "A").await.unwrap();
    h.engine.record_default(OPERATOR, 4, 50).await.unwrap();
    h.engine.save_snapshot(&path).await.unwrap();

    let snapshot = load_snapshot(&path).await.unwrap().expect("snapshot written");
    let access = Arc::new(RoleRegistry::new().with_admin(ADMIN));
    let restored = YieldEngine::restore(snapshot, PriceOracleAdapter::disconnected(), access).unwrap();

    assert_eq!(restored.distribution_count().await, 1);
    assert_eq!(
        restored.get_distribution(id).await.unwrap(),
        h.engine.get_distribution(id).await.unwrap()
    );
    assert_eq!(restored.pool_totals().await, h.engine.pool_totals().await);
    assert_eq!(restored.property_defaults(4).await, 50);
    assert_eq!(restored.claimable(id, "B").await.unwrap(), 400);

    // Ids keep counting from the restored counter.
    let next = restored
        .create_distribution(ADMIN, request(5, &[("C", 10)]))
        .await
        .unwrap();
    assert_eq!(next, 2);
}

#[tokio::test]
async fn test_missing_snapshot_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_snapshot(&dir.path().join("absent.json")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_snapshot_version_rejected() {
    let h = harness(PriceOracleAdapter::disconnected());
    let mut snapshot = h.engine.snapshot().await;
    snapshot.version += 1;

    let access = Arc::new(RoleRegistry::new());
    let result = YieldEngine::restore(snapshot, PriceOracleAdapter::disconnected(), access);
    assert!(matches!(result, Err(AppError::SerializationError(_))));
}
