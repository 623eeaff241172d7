/// Days of history kept in sync when `sync.days_past` is not set
pub const DEFAULT_DAYS_PAST: i64 = 7;

/// Days ahead kept in sync when `sync.days_future` is not set
pub const DEFAULT_DAYS_FUTURE: i64 = 90;

/// Upper bound for `sync.days_past` and `sync.days_future`
pub const MAX_WINDOW_DAYS: i64 = 3650;

pub const DEFAULT_EVENT_PREFIX: &str = "[HA]";

/// Seconds between cycles in `run` mode (15 minutes)
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 900;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Seconds to wait once `MAX_RETRIES` consecutive cycles have failed
pub const DEFAULT_BACKOFF_SECS: u64 = 1800;

/// First retry delay after a failed cycle; doubles per consecutive failure
pub const INITIAL_RETRY_SECS: u64 = 60;
