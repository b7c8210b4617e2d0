//! Timestamp utilities

use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert whole seconds to duration
pub fn secs_to_duration(secs: u64) -> std::time::Duration {
    std::time::Duration::from_secs(secs)
}

/// Inclusive `(start, end)` calendar window of `days` days ending at `end`,
/// formatted as `YYYY-MM-DD`
pub fn day_window(end: DateTime<Utc>, days: i64) -> (String, String) {
    let start = end - ChronoDuration::days(days);
    (
        start.format("%Y-%m-%d").to_string(),
        end.format("%Y-%m-%d").to_string(),
    )
}
