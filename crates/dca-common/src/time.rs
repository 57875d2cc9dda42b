use chrono::{Local, Utc};

/// Format of the `time` column in the purchase log.
pub const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Returns the current unix timestamp in whole seconds.
pub fn timestamp_secs() -> i64 {
    Utc::now().timestamp()
}

/// Returns the local wall-clock time formatted for the purchase log.
pub fn log_timestamp() -> String {
    Local::now().format(LOG_TIME_FORMAT).to_string()
}
