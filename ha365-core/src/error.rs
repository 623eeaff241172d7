//! Error types for ha365-sync.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// A single malformed event. The event is skipped; the cycle continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Event '{summary}' has no uid")]
    MissingUid { summary: String },

    #[error("Event '{uid}' ends before it starts ({start} > {end})")]
    EndsBeforeStart {
        uid: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// The destination call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationOperation {
    List,
    Create,
    Update,
    Delete,
}

impl fmt::Display for DestinationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DestinationOperation::List => "list",
            DestinationOperation::Create => "create",
            DestinationOperation::Update => "update",
            DestinationOperation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// A failed call against the destination calendar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed for '{event}': {cause}")]
pub struct DestinationError {
    pub operation: DestinationOperation,
    /// Title or id of the event the call was about
    pub event: String,
    pub cause: String,
    /// The destination rejected our credential (HTTP 401)
    pub unauthorized: bool,
}

impl DestinationError {
    pub fn new(
        operation: DestinationOperation,
        event: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        DestinationError {
            operation,
            event: event.into(),
            cause: cause.into(),
            unauthorized: false,
        }
    }

    pub fn unauthorized(
        operation: DestinationOperation,
        event: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        DestinationError {
            unauthorized: true,
            ..DestinationError::new(operation, event, cause)
        }
    }
}

/// Errors that end a sync cycle.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Home Assistant unavailable ({calendar}): {cause}")]
    SourceUnavailable { calendar: String, cause: String },

    #[error(transparent)]
    Destination(#[from] DestinationError),

    #[error("Office 365 authentication required: {0}")]
    Authentication(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// True when the operator has to re-authenticate instead of waiting for a retry.
    pub fn is_authentication(&self) -> bool {
        match self {
            SyncError::Authentication(_) => true,
            SyncError::Destination(e) => e.unauthorized,
            _ => false,
        }
    }
}

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
