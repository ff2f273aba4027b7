//! Time utility functions

use chrono::{DateTime, SecondsFormat, Utc};

/// Source of "now" for query windows and log timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a single instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Convert DateTime<Utc> to milliseconds since Unix epoch
pub fn to_unix_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Format as RFC 3339 with second precision, `Z` suffix
pub fn to_rfc3339_secs(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// ISO 8601 duration for whole seconds (`PT10S`)
pub fn iso8601_seconds(secs: i64) -> String {
    format!("PT{}S", secs)
}
