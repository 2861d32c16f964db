use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Mutex;

/// Source of timestamps for engine records and events.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used by tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    pub fn at_unix(seconds: i64) -> Self {
        let start = Utc
            .timestamp_opt(seconds, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self::new(start)
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Age of `timestamp` relative to `now`, zero if it lies in the future.
pub fn age(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    let diff = now - timestamp;
    if diff < Duration::zero() {
        Duration::zero()
    } else {
        diff
    }
}
