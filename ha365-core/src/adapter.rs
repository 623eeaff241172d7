//! Seams between the sync cycle and the outside world.
//!
//! The Home Assistant and Office 365 clients implement these traits; tests
//! implement them with in-memory fakes.

use crate::error::{DestinationError, SyncResult};
use crate::event::{EventFields, SourceEvent, SyncedEvent};
use crate::window::SyncWindow;

/// Where events come from.
#[allow(async_fn_in_trait)]
pub trait Source {
    /// Events of every listed calendar entity within `window`.
    ///
    /// Fails with `SyncError::SourceUnavailable` on network or auth failure.
    async fn fetch_events(
        &self,
        calendars: &[String],
        window: &SyncWindow,
    ) -> SyncResult<Vec<SourceEvent>>;
}

/// The single calendar events are mirrored into.
#[allow(async_fn_in_trait)]
pub trait Destination {
    /// Managed events within `window`. Foreign events never leave the adapter.
    async fn list_managed_events(
        &self,
        window: &SyncWindow,
    ) -> Result<Vec<SyncedEvent>, DestinationError>;

    /// Returns the destination-assigned id.
    async fn create_event(&self, fields: &EventFields) -> Result<String, DestinationError>;

    async fn update_event(
        &self,
        destination_id: &str,
        fields: &EventFields,
    ) -> Result<(), DestinationError>;

    async fn delete_event(&self, destination_id: &str) -> Result<(), DestinationError>;
}
