//! One reconciliation cycle: fetch, diff, apply.

use std::fmt;

use tracing::{debug, info, warn};

use crate::adapter::{Destination, Source};
use crate::error::{SyncError, SyncResult, ValidationError};
use crate::reconcile::{OperationPlan, ReconcileSettings, SyncReport, apply_plan, reconcile, retain_valid};

/// Outcome of a full cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub sync: SyncReport,
    /// Events dropped before reconciling because they were malformed
    pub skipped: Vec<ValidationError>,
}

impl CycleReport {
    /// A cycle with failed operations counts as failed for retry purposes.
    pub fn succeeded(&self) -> bool {
        self.sync.is_clean()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} skipped={}", self.sync, self.skipped.len())
    }
}

/// A computed plan together with the events skipped while computing it.
#[derive(Debug, Clone, Default)]
pub struct PlannedCycle {
    pub plan: OperationPlan,
    pub skipped: Vec<ValidationError>,
}

/// Fetch both sides and compute the plan without touching the destination.
///
/// Either side failing aborts before anything is reconciled.
pub async fn plan_cycle<S: Source, D: Destination>(
    source: &S,
    destination: &D,
    calendars: &[String],
    settings: &ReconcileSettings,
) -> SyncResult<PlannedCycle> {
    let window = &settings.window;
    debug!(start = %window.start_rfc3339(), end = %window.end_rfc3339(), "Sync window");

    let source_events = source.fetch_events(calendars, window).await?;
    let destination_events = destination.list_managed_events(window).await?;
    debug!(
        source = source_events.len(),
        destination = destination_events.len(),
        "Fetched events"
    );

    let (source_events, mut skipped) = retain_valid(source_events);
    let (destination_events, rejected) = retain_valid(destination_events);
    skipped.extend(rejected);

    for reason in &skipped {
        warn!("Skipping event: {reason}");
    }

    let plan = reconcile(&source_events, &destination_events, settings)
        .map_err(SyncError::Validation)?;

    Ok(PlannedCycle { plan, skipped })
}

/// Run one cycle end to end.
pub async fn run_cycle<S: Source, D: Destination>(
    source: &S,
    destination: &D,
    calendars: &[String],
    settings: &ReconcileSettings,
) -> SyncResult<CycleReport> {
    let PlannedCycle { plan, skipped } =
        plan_cycle(source, destination, calendars, settings).await?;

    if plan.is_empty() {
        debug!("Nothing to change");
    }

    let sync = apply_plan(destination, &plan, &settings.prefixes).await;
    let report = CycleReport { sync, skipped };

    info!("{report}");

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DestinationOperation;
    use crate::marker::Prefixes;
    use crate::testing::{FakeDestination, FakeSource, at, source_event, synced_copy};
    use crate::window::SyncWindow;

    fn settings() -> ReconcileSettings {
        ReconcileSettings {
            window: SyncWindow::around(at(12), 7, 90),
            prefixes: Prefixes::new("[HA]"),
            delete_removed_events: true,
        }
    }

    fn calendars() -> Vec<String> {
        vec!["calendar.home".to_string()]
    }

    #[tokio::test]
    async fn test_source_unavailable_aborts_without_writes() {
        let existing = synced_copy(&source_event("A", "Kept", 9, 10), "[HA]");
        let destination = FakeDestination::with_events(vec![existing]);

        let result = run_cycle(&FakeSource::unavailable(), &destination, &calendars(), &settings()).await;

        assert!(matches!(result, Err(SyncError::SourceUnavailable { .. })));
        assert!(destination.calls().is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_cycle() {
        let source = FakeSource::with_events(vec![source_event("A", "New", 9, 10)]);
        let destination = FakeDestination::broken();

        let result = run_cycle(&source, &destination, &calendars(), &settings()).await;

        match result {
            Err(SyncError::Destination(e)) => assert_eq!(e.operation, DestinationOperation::List),
            other => panic!("expected listing failure, got {other:?}"),
        }
        assert!(destination.calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_events_are_skipped() {
        let good = source_event("A", "Good", 9, 10);
        let mut missing_uid = source_event("", "No uid", 9, 10);
        missing_uid.uid = "  ".to_string();
        let backwards = source_event("C", "Backwards", 11, 10);
        let source = FakeSource::with_events(vec![good, missing_uid, backwards]);
        let destination = FakeDestination::default();

        let report = run_cycle(&source, &destination, &calendars(), &settings())
            .await
            .unwrap();

        assert_eq!(report.sync.created, 1);
        assert_eq!(report.skipped.len(), 2);
        assert!(report.succeeded());
        assert_eq!(report.to_string(), "created=1 updated=0 deleted=0 failed=0 skipped=2");
    }

    #[tokio::test]
    async fn test_second_cycle_is_a_no_op() {
        let event = source_event("A", "Stable", 9, 10);
        let source = FakeSource::with_events(vec![event.clone()]);
        let destination = FakeDestination::with_events(vec![synced_copy(&event, "[HA]")]);

        let report = run_cycle(&source, &destination, &calendars(), &settings())
            .await
            .unwrap();

        assert_eq!(report, CycleReport::default());
        assert!(destination.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_operation_marks_cycle_failed() {
        let orphan = synced_copy(&source_event("A", "Gone", 9, 10), "[HA]");
        let destination = FakeDestination::with_events(vec![orphan.clone()]);
        destination.fail_delete(&orphan.destination_id);

        let report = run_cycle(&FakeSource::with_events(vec![]), &destination, &calendars(), &settings())
            .await
            .unwrap();

        assert!(!report.succeeded());
        assert_eq!(report.sync.failed(), 1);
    }

    #[tokio::test]
    async fn test_plan_cycle_does_not_write() {
        let source = FakeSource::with_events(vec![source_event("A", "New", 9, 10)]);
        let destination = FakeDestination::default();

        let planned = plan_cycle(&source, &destination, &calendars(), &settings())
            .await
            .unwrap();

        assert_eq!(planned.plan.to_create.len(), 1);
        assert!(destination.calls().is_empty());
    }
}
