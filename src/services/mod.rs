pub mod audit_service;
pub mod distribution_ledger;
pub mod monitoring_service;
pub mod payout_transfer;
pub mod price_feed;
pub mod price_oracle;
pub mod risk_engine;
pub mod yield_engine;
pub mod yield_pool_manager;

pub use audit_service::*;
pub use distribution_ledger::*;
pub use monitoring_service::*;
pub use payout_transfer::*;
pub use price_feed::*;
pub use price_oracle::{PriceOracleAdapter, PriceUpdate};
pub use risk_engine::*;
pub use yield_engine::*;
pub use yield_pool_manager::*;
