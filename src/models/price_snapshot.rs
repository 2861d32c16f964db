use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One reading from an external feed: a signed fixed-point value and the
/// time the feed last updated it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedReading {
    pub value: i128,
    pub updated_at: DateTime<Utc>,
}

/// Read-through cache over the price and inflation feeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// Price at `PRICE_SCALE`, always positive once set
    pub last_price: Option<i128>,
    /// Annual inflation rate in basis points
    pub last_inflation_index: Option<i128>,
    pub price_feed_update_time: Option<DateTime<Utc>>,
    pub inflation_feed_update_time: Option<DateTime<Utc>>,
}

impl PriceSnapshot {
    pub fn apply_price(&mut self, reading: FeedReading) {
        self.last_price = Some(reading.value);
        self.price_feed_update_time = Some(reading.updated_at);
    }

    pub fn apply_inflation(&mut self, reading: FeedReading) {
        self.last_inflation_index = Some(reading.value);
        self.inflation_feed_update_time = Some(reading.updated_at);
    }
}
