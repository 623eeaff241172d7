//! Microsoft Graph calendar endpoints.

use ha365_core::config::Office365Config;
use ha365_core::error::{DestinationError, DestinationOperation};
use ha365_core::window::SyncWindow;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::outlook::types::{EventWrite, GraphCalendar, GraphEvent, Page};

const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";
const PREFER: &str = "outlook.timezone=\"UTC\", outlook.body-content-type=\"text\"";
const PAGE_SIZE: &str = "100";
const SELECT: &str = "id,subject,body,location,start,end,isAllDay";

pub struct GraphClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    /// `/me/calendar`, `/me/calendars/{id}` or the `/users/{upn}` equivalents
    calendar_path: String,
}

/// Path of the configured calendar relative to the Graph root.
pub fn calendar_path(config: &Office365Config) -> String {
    let owner = match &config.user_principal_name {
        Some(upn) => format!("/users/{}", encode(upn)),
        None => "/me".to_string(),
    };

    if config.calendar_id == "primary" {
        format!("{owner}/calendar")
    } else {
        format!("{owner}/calendars/{}", encode(&config.calendar_id))
    }
}

fn encode(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

impl GraphClient {
    pub fn new(access_token: &str, config: &Office365Config) -> Self {
        Self::new_with_base_url(access_token, config, GRAPH_API_BASE)
    }

    pub fn new_with_base_url(access_token: &str, config: &Office365Config, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            calendar_path: calendar_path(config),
        }
    }

    fn calendar_url(&self, suffix: &str) -> String {
        format!("{}{}{}", self.base_url, self.calendar_path, suffix)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.access_token).header("Prefer", PREFER)
    }

    /// Metadata of the configured calendar; fails when it does not exist or is not accessible.
    pub async fn get_calendar(&self) -> Result<GraphCalendar, DestinationError> {
        let op = DestinationOperation::List;
        let url = self.calendar_url("");

        let response = self.send(self.authorized(self.client.get(&url)), op, "calendar").await?;
        parse(response, op, "calendar").await
    }

    /// Every event intersecting `window`, following `@odata.nextLink` until exhausted.
    #[instrument(skip_all, level = "debug")]
    pub async fn calendar_view(&self, window: &SyncWindow) -> Result<Vec<GraphEvent>, DestinationError> {
        let op = DestinationOperation::List;

        let first = Url::parse_with_params(
            &self.calendar_url("/calendarView"),
            &[
                ("startDateTime", window.start_rfc3339()),
                ("endDateTime", window.end_rfc3339()),
                ("$top", PAGE_SIZE.to_string()),
                ("$select", SELECT.to_string()),
            ],
        )
        .map_err(|e| DestinationError::new(op, "calendarView", e.to_string()))?;

        let mut events = Vec::new();
        let mut next = Some(first.to_string());
        let mut pages = 0;

        while let Some(url) = next {
            let response = self
                .send(self.authorized(self.client.get(&url)), op, "calendarView")
                .await?;
            let page: Page<GraphEvent> = parse(response, op, "calendarView").await?;

            pages += 1;
            events.extend(page.value);
            next = page.next_link;
        }

        debug!(pages, events = events.len(), "Listed Office 365 events");

        Ok(events)
    }

    pub async fn create_event(&self, event: &EventWrite) -> Result<GraphEvent, DestinationError> {
        let op = DestinationOperation::Create;
        let url = self.calendar_url("/events");

        let response = self
            .send(self.authorized(self.client.post(&url)).json(event), op, &event.subject)
            .await?;
        parse(response, op, &event.subject).await
    }

    pub async fn update_event(&self, event_id: &str, event: &EventWrite) -> Result<(), DestinationError> {
        let op = DestinationOperation::Update;
        let url = self.calendar_url(&format!("/events/{}", encode(event_id)));

        self.send(self.authorized(self.client.patch(&url)).json(event), op, &event.subject)
            .await?;
        Ok(())
    }

    /// An event that is already gone counts as deleted.
    pub async fn delete_event(&self, event_id: &str) -> Result<(), DestinationError> {
        let op = DestinationOperation::Delete;
        let url = self.calendar_url(&format!("/events/{}", encode(event_id)));

        let response = self
            .authorized(self.client.delete(&url))
            .send()
            .await
            .map_err(|e| DestinationError::new(op, event_id, e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(event_id, "Event already deleted");
            return Ok(());
        }

        check(response, op, event_id).await?;
        Ok(())
    }

    async fn send(
        &self,
        request: RequestBuilder,
        op: DestinationOperation,
        event: &str,
    ) -> Result<Response, DestinationError> {
        let response = request
            .send()
            .await
            .map_err(|e| DestinationError::new(op, event, e.to_string()))?;

        check(response, op, event).await
    }
}

/// Pass successful responses through; 401 is flagged as an auth failure.
async fn check(
    response: Response,
    op: DestinationOperation,
    event: &str,
) -> Result<Response, DestinationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let cause = format!("{} {}", status.as_str(), text.trim());

    if status == StatusCode::UNAUTHORIZED {
        Err(DestinationError::unauthorized(op, event, cause))
    } else {
        Err(DestinationError::new(op, event, cause))
    }
}

async fn parse<T: DeserializeOwned>(
    response: Response,
    op: DestinationOperation,
    event: &str,
) -> Result<T, DestinationError> {
    response
        .json()
        .await
        .map_err(|e| DestinationError::new(op, event, format!("JSON parse error: {e}")))
}
