//! Event types.
//!
//! `SourceEvent` is what Home Assistant reports, `SyncedEvent` is a managed
//! event already present in the Office 365 calendar, and `EventFields` is the
//! full field set written to Office 365 on create and update.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::marker;

/// One calendar occurrence read from Home Assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEvent {
    pub uid: String,
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    /// Entity id of the Home Assistant calendar (e.g. `calendar.family`)
    pub source_calendar: String,
}

/// A destination event that carries our prefix and uid marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncedEvent {
    /// Id assigned by Office 365, used for update and delete
    pub destination_id: String,
    /// Uid of the `SourceEvent` this event mirrors
    pub uid: String,
    /// Title as last written, prefix included
    pub title: String,
    /// Body with the uid marker removed
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Mutable fields written to the destination. Updates replace all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventFields {
    pub title: String,
    /// Description followed by the uid marker
    pub body: String,
    pub location: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
}

/// Structural checks every event must pass before reconciliation.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for SourceEvent {
    fn validate(&self) -> Result<(), ValidationError> {
        check(&self.uid, &self.summary, self.start, self.end)
    }
}

impl Validate for SyncedEvent {
    fn validate(&self) -> Result<(), ValidationError> {
        check(&self.uid, &self.title, self.start, self.end)
    }
}

fn check(
    uid: &str,
    label: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if uid.trim().is_empty() {
        return Err(ValidationError::MissingUid {
            summary: label.to_string(),
        });
    }
    if start > end {
        return Err(ValidationError::EndsBeforeStart {
            uid: uid.to_string(),
            start,
            end,
        });
    }
    Ok(())
}

impl EventFields {
    /// Fields for mirroring `event` under `prefix`.
    pub fn from_source(event: &SourceEvent, prefix: &str) -> Self {
        EventFields {
            title: marker::title_for(prefix, &event.summary),
            body: marker::compose_body(&event.description, &event.uid),
            location: event.location.clone(),
            start: event.start,
            end: event.end,
            all_day: event.all_day,
        }
    }
}

impl fmt::Display for SourceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary)
    }
}

impl fmt::Display for SyncedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

/// "2024-01-01 10:00 - 11:00", or the full end date when it falls on another day.
pub fn format_time_range(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    if start.date_naive() == end.date_naive() {
        format!("{} - {}", start.format("%Y-%m-%d %H:%M"), end.format("%H:%M"))
    } else {
        format!(
            "{} - {}",
            start.format("%Y-%m-%d %H:%M"),
            end.format("%Y-%m-%d %H:%M")
        )
    }
}
