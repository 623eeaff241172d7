//! Office 365 calendar (the sync destination) over Microsoft Graph.

pub mod api;
pub mod auth;
pub mod session;
pub mod types;

use chrono_tz::Tz;
use ha365_core::adapter::Destination;
use ha365_core::error::DestinationError;
use ha365_core::marker::Prefixes;
use ha365_core::window::SyncWindow;
use ha365_core::{EventFields, SyncedEvent};
use tracing::debug;

use api::GraphClient;
use types::EventWrite;

/// The one calendar events are mirrored into. Only managed events are ever exposed.
pub struct OutlookCalendar {
    graph: GraphClient,
    prefixes: Prefixes,
    timezone: Tz,
}

impl OutlookCalendar {
    pub fn new(graph: GraphClient, prefixes: Prefixes, timezone: Tz) -> Self {
        Self {
            graph,
            prefixes,
            timezone,
        }
    }

    /// Display name of the calendar; doubles as an access check.
    pub async fn name(&self) -> Result<String, DestinationError> {
        let calendar = self.graph.get_calendar().await?;
        Ok(if calendar.name.is_empty() {
            calendar.id
        } else {
            calendar.name
        })
    }
}

impl Destination for OutlookCalendar {
    async fn list_managed_events(
        &self,
        window: &SyncWindow,
    ) -> Result<Vec<SyncedEvent>, DestinationError> {
        let events = self.graph.calendar_view(window).await?;
        let total = events.len();

        let managed: Vec<SyncedEvent> = events
            .iter()
            .filter_map(|event| event.to_synced(&self.prefixes, self.timezone))
            .collect();

        debug!(total, managed = managed.len(), "Filtered Office 365 events");

        Ok(managed)
    }

    async fn create_event(&self, fields: &EventFields) -> Result<String, DestinationError> {
        let created = self
            .graph
            .create_event(&EventWrite::from_fields(fields, self.timezone))
            .await?;
        Ok(created.id)
    }

    async fn update_event(
        &self,
        destination_id: &str,
        fields: &EventFields,
    ) -> Result<(), DestinationError> {
        self.graph
            .update_event(destination_id, &EventWrite::from_fields(fields, self.timezone))
            .await
    }

    async fn delete_event(&self, destination_id: &str) -> Result<(), DestinationError> {
        self.graph.delete_event(destination_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ha365_core::config::Office365Config;
    use ha365_core::cycle::run_cycle;
    use ha365_core::reconcile::{ReconcileSettings, changed_fields};
    use ha365_core::SourceEvent;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::homeassistant::HomeAssistantClient;

    fn config() -> Office365Config {
        Office365Config {
            client_id: "client".to_string(),
            client_secret: None,
            tenant_id: "common".to_string(),
            calendar_id: "primary".to_string(),
            user_principal_name: None,
            token_cache: None,
        }
    }

    fn settings() -> ReconcileSettings {
        ReconcileSettings {
            window: SyncWindow::around(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(), 7, 90),
            prefixes: Prefixes::new("[HA]"),
            delete_removed_events: true,
        }
    }

    #[tokio::test]
    async fn test_list_managed_events_filters_foreign() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/me/calendar/calendarView"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [
                    {
                        "id": "mine",
                        "subject": "[HA] Dentist",
                        "body": {"contentType": "text", "content": "[HA_UID:evt-1]"},
                        "start": {"dateTime": "2024-06-03T09:00:00.0000000", "timeZone": "UTC"},
                        "end": {"dateTime": "2024-06-03T10:00:00.0000000", "timeZone": "UTC"}
                    },
                    {
                        "id": "theirs",
                        "subject": "Team lunch",
                        "body": {"contentType": "html", "content": "<p>Pizza</p>"},
                        "start": {"dateTime": "2024-06-03T12:00:00.0000000", "timeZone": "UTC"},
                        "end": {"dateTime": "2024-06-03T13:00:00.0000000", "timeZone": "UTC"}
                    }
                ]
            })))
            .mount(&mock_server)
            .await;

        let graph = GraphClient::new_with_base_url("t", &config(), &mock_server.uri());
        let calendar = OutlookCalendar::new(graph, Prefixes::new("[HA]"), Tz::UTC);
        let events = calendar.list_managed_events(&settings().window).await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].destination_id, "mine");
        assert_eq!(events[0].uid, "evt-1");
    }

    #[tokio::test]
    async fn test_full_cycle_creates_missing_event() {
        let ha = MockServer::start().await;
        let graph_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/calendars/calendar.family"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "uid": "evt-1",
                "summary": "Dentist",
                "start": {"dateTime": "2024-06-03T09:00:00+00:00"},
                "end": {"dateTime": "2024-06-03T10:00:00+00:00"}
            }])))
            .mount(&ha)
            .await;

        Mock::given(method("GET"))
            .and(path("/me/calendar/calendarView"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": []})))
            .mount(&graph_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/me/calendar/events"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "AAMkNew",
                "subject": "[HA] Dentist",
                "start": {"dateTime": "2024-06-03T09:00:00.0000000", "timeZone": "UTC"},
                "end": {"dateTime": "2024-06-03T10:00:00.0000000", "timeZone": "UTC"}
            })))
            .expect(1)
            .mount(&graph_server)
            .await;

        let source = HomeAssistantClient::new(&ha.uri(), "ha", Tz::UTC);
        let graph = GraphClient::new_with_base_url("t", &config(), &graph_server.uri());
        let destination = OutlookCalendar::new(graph, Prefixes::new("[HA]"), Tz::UTC);

        let report = run_cycle(&source, &destination, &["calendar.family".to_string()], &settings())
            .await
            .unwrap();

        assert_eq!(report.sync.created, 1);
        assert!(report.succeeded());
    }

    #[tokio::test]
    async fn test_sub_second_source_time_is_unchanged_after_write() {
        let ha = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/calendars/calendar.family"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "uid": "evt-1",
                "summary": "Standup",
                "start": {"dateTime": "2024-06-03T09:00:00.500+00:00"},
                "end": {"dateTime": "2024-06-03T09:15:00.250+00:00"}
            }])))
            .mount(&ha)
            .await;

        let source = HomeAssistantClient::new(&ha.uri(), "ha", Tz::UTC);
        let events = source.fetch_calendar("calendar.family", &settings().window).await.unwrap();
        let event = &events[0];

        let write = EventWrite::from_fields(&EventFields::from_source(event, "[HA]"), Tz::UTC);
        let mut json = serde_json::to_value(&write).unwrap();
        json["id"] = serde_json::json!("AAMk1");
        let stored: types::GraphEvent = serde_json::from_value(json).unwrap();

        let synced = stored.to_synced(&Prefixes::new("[HA]"), Tz::UTC).unwrap();
        assert!(changed_fields(&synced, event, "[HA]").is_empty());
    }

    #[test]
    fn test_write_carries_marker_in_body() {
        let event = SourceEvent {
            uid: "evt-1".to_string(),
            summary: "Dentist".to_string(),
            description: "Bring card".to_string(),
            location: String::new(),
            start: Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap(),
            all_day: false,
            source_calendar: "calendar.family".to_string(),
        };
        let write = EventWrite::from_fields(&EventFields::from_source(&event, "[HA]"), Tz::UTC);

        assert_eq!(write.subject, "[HA] Dentist");
        assert_eq!(write.body.content, "Bring card\n\n[HA_UID:evt-1]");
    }
}
