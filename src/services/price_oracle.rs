use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::OracleSettings;
use crate::error::AppError;
use crate::models::{Amount, FeedReading, PriceSnapshot};
use crate::services::{HttpPriceFeed, PriceFeed};
use crate::utils::math::{mul_div, BPS_DENOMINATOR, PRICE_SCALE};

/// Readings fetched together by a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceUpdate {
    pub price: FeedReading,
    pub inflation: Option<FeedReading>,
}

/// Reads the external price and inflation feeds with a bounded timeout and
/// converts between value units using a cached snapshot.
///
/// The adapter never touches the snapshot itself; callers apply a fetched
/// update only after every read has succeeded, so a failed read leaves the
/// cache as it was.
#[derive(Clone)]
pub struct PriceOracleAdapter {
    price_feed: Option<Arc<dyn PriceFeed>>,
    inflation_feed: Option<Arc<dyn PriceFeed>>,
    read_timeout: Duration,
}

impl PriceOracleAdapter {
    pub fn new(read_timeout: Duration) -> Self {
        Self {
            price_feed: None,
            inflation_feed: None,
            read_timeout,
        }
    }

    /// Adapter with no feeds; only cached or restored values are available.
    pub fn disconnected() -> Self {
        Self::new(Duration::from_secs(5))
    }

    /// Wires HTTP feeds for whichever URLs are configured.
    pub fn from_settings(settings: &OracleSettings) -> Result<Self, AppError> {
        let timeout = Duration::from_millis(settings.timeout_ms);
        let mut adapter = Self::new(timeout);
        if let Some(url) = &settings.price_feed_url {
            adapter = adapter.with_price_feed(Arc::new(HttpPriceFeed::new(
                "price",
                url.clone(),
                settings.price_decimals,
                timeout,
            )?));
        }
        if let Some(url) = &settings.inflation_feed_url {
            adapter = adapter.with_inflation_feed(Arc::new(HttpPriceFeed::new(
                "inflation",
                url.clone(),
                settings.inflation_decimals,
                timeout,
            )?));
        }
        if !adapter.has_price_feed() {
            warn!("No price feed configured; conversions rely on restored prices");
        }
        Ok(adapter)
    }

    pub fn with_price_feed(mut self, feed: Arc<dyn PriceFeed>) -> Self {
        self.price_feed = Some(feed);
        self
    }

    pub fn with_inflation_feed(mut self, feed: Arc<dyn PriceFeed>) -> Self {
        self.inflation_feed = Some(feed);
        self
    }

    pub fn has_price_feed(&self) -> bool {
        self.price_feed.is_some()
    }

    pub fn has_inflation_feed(&self) -> bool {
        self.inflation_feed.is_some()
    }

    /// Reads both feeds. Fails if the price feed is missing, slow, or
    /// returns a non-positive price, or if a configured inflation feed fails.
    pub async fn fetch_update(&self) -> Result<PriceUpdate, AppError> {
        let price = self.read_price().await?;
        let inflation = match &self.inflation_feed {
            Some(feed) => Some(self.read(feed.as_ref()).await?),
            None => None,
        };
        Ok(PriceUpdate { price, inflation })
    }

    /// Live read of the price feed, validated positive.
    pub async fn read_price(&self) -> Result<FeedReading, AppError> {
        let feed = self
            .price_feed
            .as_ref()
            .ok_or_else(|| AppError::PriceFeedUnavailable("no price feed configured".to_string()))?;
        let reading = self.read(feed.as_ref()).await?;
        if reading.value <= 0 {
            warn!("{} feed returned non-positive price {}", feed.name(), reading.value);
            return Err(AppError::InvalidPriceFeed(format!(
                "price must be positive, got {}",
                reading.value
            )));
        }
        Ok(reading)
    }

    /// Live read of the inflation feed.
    pub async fn read_inflation(&self) -> Result<FeedReading, AppError> {
        let feed = self.inflation_feed.as_ref().ok_or_else(|| {
            AppError::PriceFeedUnavailable("no inflation feed configured".to_string())
        })?;
        self.read(feed.as_ref()).await
    }

    async fn read(&self, feed: &dyn PriceFeed) -> Result<FeedReading, AppError> {
        match timeout(self.read_timeout, feed.latest()).await {
            Ok(Ok(reading)) => {
                info!("{} feed read {} (updated {})", feed.name(), reading.value, reading.updated_at);
                Ok(reading)
            }
            Ok(Err(e)) => {
                warn!("{} feed read failed: {}", feed.name(), e);
                Err(e)
            }
            Err(_) => {
                warn!("{} feed timed out after {:?}", feed.name(), self.read_timeout);
                Err(AppError::Timeout {
                    operation: format!("{} feed read", feed.name()),
                })
            }
        }
    }
}

/// Converts a base-unit amount into quote units at `price` (PRICE_SCALE).
pub fn to_quote_currency(base_amount: Amount, price: i128) -> Result<Amount, AppError> {
    let price = positive_price(price)?;
    mul_div(base_amount, price, PRICE_SCALE, "quote conversion")
}

/// Converts a quote-unit amount back into base units at `price`.
pub fn to_base_currency(quote_amount: Amount, price: i128) -> Result<Amount, AppError> {
    let price = positive_price(price)?;
    mul_div(quote_amount, PRICE_SCALE, price, "price")
}

/// `amount * (10000 + index * months / 12) / 10000`, using the cached annual
/// inflation index in bps. Without a cached index the amount is returned as is.
/// A deflation large enough to push the factor below zero floors it at zero.
pub fn inflation_adjusted(
    snapshot: &PriceSnapshot,
    amount: Amount,
    months: u32,
) -> Result<Amount, AppError> {
    let index = match snapshot.last_inflation_index {
        Some(index) => index,
        None => return Ok(amount),
    };
    let accrued = index
        .checked_mul(months as i128)
        .map(|v| v / 12)
        .ok_or(AppError::ArithmeticOverflow("inflation accrual"))?;
    let factor = (BPS_DENOMINATOR as i128)
        .checked_add(accrued)
        .ok_or(AppError::ArithmeticOverflow("inflation factor"))?;
    if factor <= 0 {
        return Ok(0);
    }
    mul_div(amount, factor as u128, BPS_DENOMINATOR, "inflation adjustment")
}

fn positive_price(price: i128) -> Result<u128, AppError> {
    if price == 0 {
        return Err(AppError::DivisionGuard("price"));
    }
    if price < 0 {
        return Err(AppError::InvalidPriceFeed(format!("negative price {}", price)));
    }
    Ok(price as u128)
}
