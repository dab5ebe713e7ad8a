use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Wall clock as unix nanoseconds, the timestamp unit of every status leaf.
pub fn now_unix_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
