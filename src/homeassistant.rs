//! Home Assistant REST client (the sync source).

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, TimeZone, Utc};
use chrono_tz::Tz;
use ha365_core::adapter::Source;
use ha365_core::error::{SyncError, SyncResult};
use ha365_core::window::SyncWindow;
use ha365_core::SourceEvent;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CALENDAR_DOMAIN: &str = "calendar.";

pub struct HomeAssistantClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    timezone: Tz,
}

/// An event as returned by `GET /api/calendars/{entity}`.
#[derive(Debug, Deserialize)]
struct HaEvent {
    #[serde(default)]
    uid: Option<String>,
    #[serde(default)]
    recurrence_id: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<String>,
    start: HaTime,
    end: HaTime,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HaTime {
    DateTime {
        #[serde(rename = "dateTime")]
        date_time: String,
    },
    Date {
        date: NaiveDate,
    },
}

/// `family` -> `calendar.family`; full entity ids pass through.
pub fn entity_id(calendar: &str) -> String {
    if calendar.starts_with(CALENDAR_DOMAIN) {
        calendar.to_string()
    } else {
        format!("{CALENDAR_DOMAIN}{calendar}")
    }
}

impl HomeAssistantClient {
    pub fn new(url: &str, token: &str, timezone: Tz) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            timezone,
        }
    }

    fn unavailable(calendar: &str, cause: impl ToString) -> SyncError {
        SyncError::SourceUnavailable {
            calendar: calendar.to_string(),
            cause: cause.to_string(),
        }
    }

    /// `GET /api/`, which answers when the instance is up and the token is valid.
    pub async fn test_connection(&self) -> SyncResult<()> {
        let url = format!("{}/api/", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| Self::unavailable(&self.base_url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::unavailable(&self.base_url, status));
        }

        info!("Connected to Home Assistant at {}", self.base_url);
        Ok(())
    }

    /// Events of one calendar entity within `window`.
    #[instrument(skip(self, window), level = "debug")]
    pub async fn fetch_calendar(
        &self,
        calendar: &str,
        window: &SyncWindow,
    ) -> SyncResult<Vec<SourceEvent>> {
        let entity = entity_id(calendar);
        let url = format!("{}/api/calendars/{}", self.base_url, entity);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[
                ("start", window.start_rfc3339()),
                ("end", window.end_rfc3339()),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| Self::unavailable(&entity, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::unavailable(&entity, format!("{status}: {text}")));
        }

        let raw: Vec<HaEvent> = response
            .json()
            .await
            .map_err(|e| Self::unavailable(&entity, format!("invalid response: {e}")))?;

        debug!(calendar = %entity, count = raw.len(), "Fetched Home Assistant events");

        Ok(raw
            .into_iter()
            .filter_map(|event| self.to_source_event(event, calendar))
            .collect())
    }

    fn to_source_event(&self, event: HaEvent, calendar: &str) -> Option<SourceEvent> {
        let summary = event.summary.unwrap_or_default();

        let (start, all_day) = match self.resolve(&event.start) {
            Some(resolved) => resolved,
            None => {
                warn!(%calendar, %summary, "Skipping event with unreadable start time");
                return None;
            }
        };
        let (end, _) = match self.resolve(&event.end) {
            Some(resolved) => resolved,
            None => {
                warn!(%calendar, %summary, "Skipping event with unreadable end time");
                return None;
            }
        };

        let uid = match (event.uid, event.recurrence_id) {
            (Some(uid), Some(recurrence_id)) if !recurrence_id.is_empty() => {
                format!("{uid}/{recurrence_id}")
            }
            (uid, _) => uid.unwrap_or_default(),
        };

        Some(SourceEvent {
            uid,
            summary,
            description: normalize_text(event.description.as_deref()),
            location: normalize_text(event.location.as_deref()),
            start,
            end,
            all_day,
            source_calendar: calendar.to_string(),
        })
    }

    /// UTC instant plus whether the value was a bare date.
    fn resolve(&self, time: &HaTime) -> Option<(DateTime<Utc>, bool)> {
        match time {
            HaTime::DateTime { date_time } => {
                parse_date_time(date_time, self.timezone).map(|dt| (dt, false))
            }
            HaTime::Date { date } => {
                let midnight = date.and_hms_opt(0, 0, 0)?;
                let local = self.timezone.from_local_datetime(&midnight).earliest()?;
                Some((local.with_timezone(&Utc), true))
            }
        }
    }
}

/// RFC 3339, or a naive timestamp read in `timezone`. Truncated to whole
/// seconds, the precision Office 365 stores.
fn parse_date_time(value: &str, timezone: Tz) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc).trunc_subsecs(0));
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .ok()?;
    timezone
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc).trunc_subsecs(0))
}

fn normalize_text(value: Option<&str>) -> String {
    value
        .unwrap_or_default()
        .replace("\r\n", "\n")
        .trim_end()
        .to_string()
}

impl Source for HomeAssistantClient {
    async fn fetch_events(
        &self,
        calendars: &[String],
        window: &SyncWindow,
    ) -> SyncResult<Vec<SourceEvent>> {
        let mut events = Vec::new();
        for calendar in calendars {
            events.extend(self.fetch_calendar(calendar, window).await?);
        }
        Ok(events)
    }
}
