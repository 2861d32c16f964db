use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::models::FeedReading;
use crate::utils::math::parse_fixed;

/// External feed returning a signed fixed-point value and its update time.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn latest(&self) -> Result<FeedReading, AppError>;

    /// Name used in logs and errors
    fn name(&self) -> &str;
}

/// JSON body served by an HTTP feed, e.g.
/// `{"value": "3000.25", "updated_at": 1700000000}`
#[derive(Debug, Deserialize)]
struct FeedPayload {
    value: FeedValue,
    updated_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedValue {
    Text(String),
    Number(serde_json::Number),
}

impl FeedValue {
    fn as_decimal_string(&self) -> String {
        match self {
            FeedValue::Text(text) => text.clone(),
            FeedValue::Number(number) => number.to_string(),
        }
    }
}

/// Feed served over HTTP as a JSON document.
pub struct HttpPriceFeed {
    client: Client,
    name: String,
    url: String,
    decimals: u32,
}

impl HttpPriceFeed {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        decimals: u32,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Rental-Yield-Engine/1.0")
            .build()
            .map_err(|e| AppError::external("http", format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            name: name.into(),
            url: url.into(),
            decimals,
        })
    }
}

#[async_trait]
impl PriceFeed for HttpPriceFeed {
    async fn latest(&self) -> Result<FeedReading, AppError> {
        debug!("Fetching {} feed from {}", self.name, self.url);

        let response = self.client.get(&self.url).send().await.map_err(|e| {
            warn!("{} feed request failed: {}", self.name, e);
            AppError::from(e)
        })?;

        if !response.status().is_success() {
            return Err(AppError::external(
                self.name.clone(),
                format!("feed returned status {}", response.status()),
            ));
        }

        let payload: FeedPayload = response.json().await.map_err(|e| {
            AppError::InvalidPriceFeed(format!("{} feed payload: {}", self.name, e))
        })?;

        let value = parse_fixed(&payload.value.as_decimal_string(), self.decimals)?;
        let updated_at = match payload.updated_at {
            Some(seconds) => Utc
                .timestamp_opt(seconds, 0)
                .single()
                .ok_or_else(|| AppError::InvalidPriceFeed(format!("bad timestamp {}", seconds)))?,
            None => Utc::now(),
        };

        Ok(FeedReading { value, updated_at })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Deterministic in-process feed. The reading can be replaced or made to
/// fail at any time, and an artificial delay simulates a slow oracle.
pub struct StaticPriceFeed {
    name: String,
    reading: Mutex<Result<FeedReading, AppError>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl StaticPriceFeed {
    pub fn new(name: impl Into<String>, value: i128, updated_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            reading: Mutex::new(Ok(FeedReading { value, updated_at })),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, value: i128, updated_at: DateTime<Utc>) {
        *self.reading.lock().unwrap_or_else(|e| e.into_inner()) = Ok(FeedReading { value, updated_at });
    }

    pub fn fail_with(&self, error: AppError) {
        *self.reading.lock().unwrap_or_else(|e| e.into_inner()) = Err(error);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceFeed for StaticPriceFeed {
    async fn latest(&self) -> Result<FeedReading, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.reading.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
