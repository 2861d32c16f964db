#![allow(dead_code)]

use std::sync::Arc;

use rental_yield_engine::{
    auth::RoleRegistry,
    models::{CreateDistribution, Thresholds},
    services::{AuditTrail, PriceOracleAdapter, YieldEngine},
    utils::time::ManualClock,
};

pub const ADMIN: &str = "admin";
pub const OPERATOR: &str = "risk-monitor";

pub struct Harness {
    pub engine: YieldEngine,
    pub trail: Arc<AuditTrail>,
    pub clock: Arc<ManualClock>,
}

pub fn harness(oracle: PriceOracleAdapter) -> Harness {
    let trail = Arc::new(AuditTrail::new());
    let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
    let access = Arc::new(RoleRegistry::new().with_admin(ADMIN).with_operator(OPERATOR));
    let engine = YieldEngine::new(Thresholds::default(), oracle, access)
        .unwrap()
        .with_event_sink(trail.clone())
        .with_clock(clock.clone());
    Harness { engine, trail, clock }
}

pub fn request(property_id: u64, shares: &[(&str, u128)]) -> CreateDistribution {
    CreateDistribution {
        property_id,
        total_yield: shares.iter().map(|(_, b)| *b).sum(),
        holders: shares.iter().map(|(h, _)| h.to_string()).collect(),
        balances: shares.iter().map(|(_, b)| *b).collect(),
    }
}
