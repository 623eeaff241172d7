//! Applying a plan to the destination.

use std::fmt;

use tracing::{debug, info, warn};

use crate::adapter::Destination;
use crate::error::DestinationError;
use crate::event::{EventFields, format_time_range};
use crate::marker::Prefixes;
use crate::reconcile::OperationPlan;

/// What happened when a plan was applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failures: Vec<DestinationError>,
}

impl SyncReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Any operation was refused because our credential is no longer valid.
    pub fn has_auth_failure(&self) -> bool {
        self.failures.iter().any(|f| f.unauthorized)
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} updated={} deleted={} failed={}",
            self.created,
            self.updated,
            self.deleted,
            self.failed()
        )
    }
}

/// Apply `plan` as three batches: creates, then updates, then deletes.
///
/// Every operation is attempted; a failure is recorded in the report and
/// the next operation proceeds.
pub async fn apply_plan<D: Destination>(
    destination: &D,
    plan: &OperationPlan,
    prefixes: &Prefixes,
) -> SyncReport {
    let mut report = SyncReport::default();

    for event in &plan.to_create {
        let fields = EventFields::from_source(event, prefixes.for_calendar(&event.source_calendar));
        match destination.create_event(&fields).await {
            Ok(destination_id) => {
                info!(
                    uid = %event.uid,
                    %destination_id,
                    "Created {} ({})",
                    fields.title,
                    format_time_range(event.start, event.end)
                );
                report.created += 1;
            }
            Err(e) => {
                warn!(uid = %event.uid, "{e}");
                report.failures.push(e);
            }
        }
    }

    for (existing, event) in &plan.to_update {
        let fields = EventFields::from_source(event, prefixes.for_calendar(&event.source_calendar));
        match destination
            .update_event(&existing.destination_id, &fields)
            .await
        {
            Ok(()) => {
                info!(uid = %event.uid, "Updated {}", fields.title);
                report.updated += 1;
            }
            Err(e) => {
                warn!(uid = %event.uid, "{e}");
                report.failures.push(e);
            }
        }
    }

    for existing in &plan.to_delete {
        match destination.delete_event(&existing.destination_id).await {
            Ok(()) => {
                info!(uid = %existing.uid, "Deleted {}", existing.title);
                report.deleted += 1;
            }
            Err(e) => {
                warn!(uid = %existing.uid, "{e}");
                report.failures.push(e);
            }
        }
    }

    debug!(%report, "Plan applied");

    report
}
