//! Scheduling for the continuous `run` loop.
//!
//! After a failed cycle the next attempt comes sooner than the regular
//! interval: 60s, 120s, 240s, ... capped at the interval, for the first
//! `max_retries` consecutive failures. After that the loop waits
//! `backoff` until a cycle succeeds again.

use std::time::Duration;

use crate::constants::{
    DEFAULT_BACKOFF_SECS, DEFAULT_MAX_RETRIES, DEFAULT_SYNC_INTERVAL_SECS, INITIAL_RETRY_SECS,
};
use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Duration::from_secs(DEFAULT_BACKOFF_SECS),
        }
    }
}

impl RetryPolicy {
    /// Read `SYNC_INTERVAL`, `MAX_RETRIES` and `BACKOFF_TIME` from the environment.
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`RetryPolicy::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let interval = match lookup("SYNC_INTERVAL") {
            Some(value) => parse_duration("SYNC_INTERVAL", &value)?,
            None => defaults.interval,
        };
        let backoff = match lookup("BACKOFF_TIME") {
            Some(value) => parse_duration("BACKOFF_TIME", &value)?,
            None => defaults.backoff,
        };
        let max_retries = match lookup("MAX_RETRIES") {
            Some(value) => value.trim().parse::<u32>().map_err(|_| {
                SyncError::Config(format!("MAX_RETRIES must be a whole number, got '{value}'"))
            })?,
            None => defaults.max_retries,
        };

        if interval.is_zero() {
            return Err(SyncError::Config("SYNC_INTERVAL must be greater than zero".into()));
        }

        Ok(Self {
            interval,
            max_retries,
            backoff,
        })
    }

    /// Replace the regular interval, e.g. from `--interval`.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// How long to sleep before the next cycle.
    ///
    /// `consecutive_failures` is zero after a successful cycle.
    pub fn delay_after(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return self.interval;
        }
        if consecutive_failures > self.max_retries {
            return self.backoff;
        }

        let factor = 2u64.saturating_pow(consecutive_failures - 1);
        let retry = Duration::from_secs(INITIAL_RETRY_SECS.saturating_mul(factor));
        retry.min(self.interval)
    }
}

/// Seconds as a bare integer, or a humantime duration such as `15m`.
pub fn parse_duration(key: &str, value: &str) -> SyncResult<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(value)
        .map_err(|e| SyncError::Config(format!("{key} is not a valid duration '{value}': {e}")))
}
