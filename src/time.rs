//! Wall-clock helpers for sample dates and commit timestamps.

use chrono::{DateTime, SecondsFormat, Utc};

/// Returns the current time in milliseconds since UNIX epoch
pub fn current_time_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

/// Formats epoch milliseconds as `YYYY-MM-DDTHH:MM:SSZ`.
///
/// Values past chrono's range are clamped to its maximum date.
pub fn rfc3339_utc(epoch_ms: u64) -> String {
    i64::try_from(epoch_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}
