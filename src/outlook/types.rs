//! Microsoft Graph event JSON and conversion to and from the core types.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use ha365_core::marker::Prefixes;
use ha365_core::{EventFields, SyncedEvent};
use serde::{Deserialize, Serialize};
use tracing::warn;

const GRAPH_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const HTML_WIDTH: usize = 1000;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeTimeZone {
    pub date_time: String,
    pub time_zone: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    pub content_type: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default)]
    pub display_name: Option<String>,
}

/// An event as read from `calendarView`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEvent {
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<ItemBody>,
    #[serde(default)]
    pub location: Option<Location>,
    pub start: DateTimeTimeZone,
    pub end: DateTimeTimeZone,
    #[serde(default)]
    pub is_all_day: bool,
}

/// One page of a collection response.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphCalendar {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Body of `POST events` and `PATCH events/{id}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventWrite {
    pub subject: String,
    pub body: ItemBody,
    pub location: Location,
    pub start: DateTimeTimeZone,
    pub end: DateTimeTimeZone,
    pub is_all_day: bool,
}

impl EventWrite {
    /// All-day events are written as midnight in `timezone`; everything else in UTC.
    pub fn from_fields(fields: &EventFields, timezone: Tz) -> Self {
        let time = |instant: DateTime<Utc>| {
            if fields.all_day {
                DateTimeTimeZone {
                    date_time: instant
                        .with_timezone(&timezone)
                        .format(GRAPH_TIME_FORMAT)
                        .to_string(),
                    time_zone: timezone.name().to_string(),
                }
            } else {
                DateTimeTimeZone {
                    date_time: instant.format(GRAPH_TIME_FORMAT).to_string(),
                    time_zone: "UTC".to_string(),
                }
            }
        };

        EventWrite {
            subject: fields.title.clone(),
            body: ItemBody {
                content_type: "text".to_string(),
                content: fields.body.clone(),
            },
            location: Location {
                display_name: Some(fields.location.clone()),
            },
            start: time(fields.start),
            end: time(fields.end),
            is_all_day: fields.all_day,
        }
    }
}

impl GraphEvent {
    /// Body as plain text with LF line endings.
    pub fn body_text(&self) -> String {
        let Some(body) = &self.body else {
            return String::new();
        };

        let text = if body.content_type.eq_ignore_ascii_case("html") {
            match html2text::from_read(body.content.as_bytes(), HTML_WIDTH) {
                Ok(text) => text,
                Err(e) => {
                    warn!(id = %self.id, "Could not convert HTML body: {e}");
                    body.content.clone()
                }
            }
        } else {
            body.content.clone()
        };

        text.replace("\r\n", "\n")
    }

    /// The managed view of this event, or `None` when it is not ours.
    ///
    /// All-day times are floating in Graph and are read back in `timezone`.
    pub fn to_synced(&self, prefixes: &Prefixes, timezone: Tz) -> Option<SyncedEvent> {
        let title = self.subject.clone().unwrap_or_default();
        let recognized = prefixes.recognize(&title, &self.body_text())?;

        let start = parse_graph_time(&self.start, self.is_all_day, timezone);
        let end = parse_graph_time(&self.end, self.is_all_day, timezone);
        let (Some(start), Some(end)) = (start, end) else {
            warn!(id = %self.id, %title, "Skipping managed event with unreadable times");
            return None;
        };

        Some(SyncedEvent {
            destination_id: self.id.clone(),
            uid: recognized.uid,
            title,
            description: recognized.description,
            location: self
                .location
                .as_ref()
                .and_then(|l| l.display_name.clone())
                .unwrap_or_default(),
            start,
            end,
        })
    }
}

fn parse_graph_time(value: &DateTimeTimeZone, all_day: bool, timezone: Tz) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(&value.date_time, "%Y-%m-%dT%H:%M:%S%.f").ok()?;

    let zone = if all_day {
        timezone
    } else if value.time_zone.eq_ignore_ascii_case("UTC") {
        return Some(Utc.from_utc_datetime(&naive));
    } else {
        value.time_zone.parse::<Tz>().unwrap_or(Tz::UTC)
    };

    zone.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
