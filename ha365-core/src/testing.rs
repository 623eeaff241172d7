//! In-memory adapters for tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, TimeZone, Utc};

use crate::adapter::{Destination, Source};
use crate::error::{DestinationError, DestinationOperation, SyncError, SyncResult};
use crate::event::{EventFields, SourceEvent, SyncedEvent};
use crate::marker;
use crate::window::SyncWindow;

pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
}

pub fn source_event(uid: &str, summary: &str, start: u32, end: u32) -> SourceEvent {
    SourceEvent {
        uid: uid.to_string(),
        summary: summary.to_string(),
        description: String::new(),
        location: String::new(),
        start: at(start),
        end: at(end),
        all_day: false,
        source_calendar: "calendar.home".to_string(),
    }
}

pub fn synced_copy(event: &SourceEvent, prefix: &str) -> SyncedEvent {
    SyncedEvent {
        destination_id: format!("o365-{}", event.uid),
        uid: event.uid.clone(),
        title: marker::title_for(prefix, &event.summary),
        description: event.description.clone(),
        location: event.location.clone(),
        start: event.start,
        end: event.end,
    }
}

pub struct FakeSource {
    events: Vec<SourceEvent>,
    unavailable: bool,
}

impl FakeSource {
    pub fn with_events(events: Vec<SourceEvent>) -> Self {
        FakeSource {
            events,
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        FakeSource {
            events: Vec::new(),
            unavailable: true,
        }
    }
}

impl Source for FakeSource {
    async fn fetch_events(
        &self,
        calendars: &[String],
        _window: &SyncWindow,
    ) -> SyncResult<Vec<SourceEvent>> {
        if self.unavailable {
            return Err(SyncError::SourceUnavailable {
                calendar: calendars.join(", "),
                cause: "connection refused".into(),
            });
        }
        Ok(self.events.clone())
    }
}

/// Keeps written fields by destination id and records the order of calls.
#[derive(Default)]
pub struct FakeDestination {
    listed: RefCell<Vec<SyncedEvent>>,
    stored: RefCell<BTreeMap<String, EventFields>>,
    calls: RefCell<Vec<&'static str>>,
    failing: RefCell<HashSet<String>>,
    list_fails: bool,
    next_id: RefCell<usize>,
}

impl FakeDestination {
    pub fn with_events(events: Vec<SyncedEvent>) -> Self {
        FakeDestination {
            listed: RefCell::new(events),
            ..FakeDestination::default()
        }
    }

    pub fn broken() -> Self {
        FakeDestination {
            list_fails: true,
            ..FakeDestination::default()
        }
    }

    pub fn fail_delete(&self, destination_id: &str) {
        self.failing.borrow_mut().insert(destination_id.to_string());
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    pub fn stored(&self, destination_id: &str) -> Option<EventFields> {
        self.stored.borrow().get(destination_id).cloned()
    }
}

impl Destination for FakeDestination {
    async fn list_managed_events(
        &self,
        _window: &SyncWindow,
    ) -> Result<Vec<SyncedEvent>, DestinationError> {
        if self.list_fails {
            return Err(DestinationError::new(
                DestinationOperation::List,
                "calendar",
                "503 Service Unavailable",
            ));
        }
        Ok(self.listed.borrow().clone())
    }

    async fn create_event(&self, fields: &EventFields) -> Result<String, DestinationError> {
        self.calls.borrow_mut().push("create");
        let mut next_id = self.next_id.borrow_mut();
        *next_id += 1;
        let id = format!("new-{next_id}");
        self.stored.borrow_mut().insert(id.clone(), fields.clone());
        Ok(id)
    }

    async fn update_event(
        &self,
        destination_id: &str,
        fields: &EventFields,
    ) -> Result<(), DestinationError> {
        self.calls.borrow_mut().push("update");
        self.stored
            .borrow_mut()
            .insert(destination_id.to_string(), fields.clone());
        Ok(())
    }

    async fn delete_event(&self, destination_id: &str) -> Result<(), DestinationError> {
        self.calls.borrow_mut().push("delete");
        if self.failing.borrow().contains(destination_id) {
            return Err(DestinationError::new(
                DestinationOperation::Delete,
                destination_id,
                "500 Internal Server Error",
            ));
        }
        self.stored.borrow_mut().remove(destination_id);
        Ok(())
    }
}
