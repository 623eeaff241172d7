//! The time window a sync cycle covers.

use chrono::{DateTime, Duration, Utc};

/// `[now - days_past, now + days_future]`, computed once per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SyncWindow {
    /// Bounds that would leave chrono's range are clamped to its limits.
    pub fn around(now: DateTime<Utc>, days_past: i64, days_future: i64) -> Self {
        let start = Duration::try_days(days_past)
            .and_then(|d| now.checked_sub_signed(d))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let end = Duration::try_days(days_future)
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        SyncWindow { start, end }
    }

    /// Whether the closed interval `[start, end]` overlaps the window.
    pub fn intersects(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start <= self.end && end >= self.start
    }

    pub fn start_rfc3339(&self) -> String {
        self.start.to_rfc3339()
    }

    pub fn end_rfc3339(&self) -> String {
        self.end.to_rfc3339()
    }
}
