pub mod distribution;
pub mod events;
pub mod price_snapshot;
pub mod risk_metrics;
pub mod snapshot;
pub mod yield_pool;

pub use distribution::*;
pub use events::*;
pub use price_snapshot::*;
pub use risk_metrics::*;
pub use snapshot::*;
pub use yield_pool::*;
