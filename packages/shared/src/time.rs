//! Time-related utilities with clock abstraction for testability.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};

/// JST is UTC+9
const JST_OFFSET_SECS: i32 = 9 * 3600;

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Current Unix timestamp in milliseconds
    fn now_millis(&self) -> i64;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        now_millis()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: i64,
}

impl FixedClock {
    pub fn new(fixed_time_millis: i64) -> Self {
        Self {
            fixed_time: fixed_time_millis,
        }
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.fixed_time
    }
}

fn jst() -> FixedOffset {
    FixedOffset::east_opt(JST_OFFSET_SECS).expect("JST offset is within one day")
}

/// Current Unix timestamp in milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render a Unix timestamp (milliseconds) as RFC 3339 in JST.
///
/// Out-of-range values fall back to the Unix epoch instead of panicking.
pub fn to_jst_rfc3339(timestamp_millis: i64) -> String {
    let dt: DateTime<FixedOffset> = jst()
        .timestamp_millis_opt(timestamp_millis)
        .single()
        .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH.with_timezone(&jst()));
    dt.to_rfc3339()
}
