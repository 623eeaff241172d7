//! Plan computation.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::ValidationError;
use crate::event::{SourceEvent, SyncedEvent, Validate};
use crate::marker::{self, Prefixes};
use crate::reconcile::OperationPlan;
use crate::window::SyncWindow;

/// Everything the reconciler needs besides the two event snapshots.
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    pub window: SyncWindow,
    pub prefixes: Prefixes,
    pub delete_removed_events: bool,
}

impl ReconcileSettings {
    pub fn from_config(config: &SyncConfig, now: DateTime<Utc>) -> Self {
        ReconcileSettings {
            window: config.window(now),
            prefixes: config.prefixes(),
            delete_removed_events: config.sync.delete_removed_events,
        }
    }
}

/// A field whose destination value differs from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old: String,
    pub new: String,
}

/// Fields of `existing` that no longer match `source` (title compared with `prefix` applied).
pub fn changed_fields(existing: &SyncedEvent, source: &SourceEvent, prefix: &str) -> Vec<FieldChange> {
    let title = marker::title_for(prefix, &source.summary);

    let candidates = [
        ("summary", existing.title.clone(), title),
        ("start", existing.start.to_rfc3339(), source.start.to_rfc3339()),
        ("end", existing.end.to_rfc3339(), source.end.to_rfc3339()),
        ("description", existing.description.clone(), source.description.clone()),
        ("location", existing.location.clone(), source.location.clone()),
    ];

    candidates
        .into_iter()
        .filter(|(_, old, new)| old != new)
        .map(|(field, old, new)| FieldChange { field, old, new })
        .collect()
}

/// Split `events` into the valid ones and the reasons the others were rejected.
pub fn retain_valid<T: Validate>(events: Vec<T>) -> (Vec<T>, Vec<ValidationError>) {
    let mut valid = Vec::with_capacity(events.len());
    let mut rejected = Vec::new();

    for event in events {
        match event.validate() {
            Ok(()) => valid.push(event),
            Err(e) => rejected.push(e),
        }
    }

    (valid, rejected)
}

/// Compute the operations that make `destination` mirror `source` within the window.
///
/// `destination` must already be restricted to managed events. Pure: no I/O.
/// Rejects the whole input on the first malformed event; use [`retain_valid`]
/// beforehand to skip malformed events instead.
pub fn reconcile(
    source: &[SourceEvent],
    destination: &[SyncedEvent],
    settings: &ReconcileSettings,
) -> Result<OperationPlan, ValidationError> {
    for event in source {
        event.validate()?;
    }
    for event in destination {
        event.validate()?;
    }

    let mut source_by_uid: HashMap<&str, &SourceEvent> = HashMap::new();
    for event in source
        .iter()
        .filter(|e| settings.window.intersects(e.start, e.end))
    {
        if let Some(previous) = source_by_uid.insert(event.uid.as_str(), event) {
            warn!(
                uid = %event.uid,
                first = %previous.source_calendar,
                second = %event.source_calendar,
                "Same uid reported twice by Home Assistant, keeping the last one"
            );
        }
    }

    let mut destination_by_uid: HashMap<&str, &SyncedEvent> = HashMap::new();
    let mut duplicates = Vec::new();
    for event in destination {
        match destination_by_uid.entry(event.uid.as_str()) {
            Entry::Vacant(slot) => {
                slot.insert(event);
            }
            Entry::Occupied(kept) => {
                warn!(
                    uid = %event.uid,
                    kept = %kept.get().destination_id,
                    duplicate = %event.destination_id,
                    "Duplicate synced event in Office 365"
                );
                duplicates.push(event);
            }
        }
    }

    let mut plan = OperationPlan::default();

    for (uid, source_event) in &source_by_uid {
        match destination_by_uid.get(uid) {
            None => plan.to_create.push((*source_event).clone()),
            Some(existing) => {
                let prefix = settings.prefixes.for_calendar(&source_event.source_calendar);
                let changes = changed_fields(existing, source_event, prefix);
                if changes.is_empty() {
                    continue;
                }
                debug!(
                    uid = %uid,
                    fields = ?changes.iter().map(|c| c.field).collect::<Vec<_>>(),
                    "Event changed"
                );
                plan.to_update
                    .push(((*existing).clone(), (*source_event).clone()));
            }
        }
    }

    let orphans = destination_by_uid
        .iter()
        .filter(|(uid, _)| !source_by_uid.contains_key(*uid))
        .map(|(_, event)| *event);

    if settings.delete_removed_events {
        plan.to_delete.extend(orphans.cloned());
        plan.to_delete.extend(duplicates.into_iter().cloned());
    } else {
        for orphan in orphans {
            debug!(uid = %orphan.uid, "Source event gone, leaving destination event in place");
        }
    }

    plan.to_create
        .sort_by(|a, b| (a.start, &a.uid).cmp(&(b.start, &b.uid)));
    plan.to_update
        .sort_by(|(_, a), (_, b)| (a.start, &a.uid).cmp(&(b.start, &b.uid)));
    plan.to_delete.sort_by(|a, b| {
        (a.start, &a.destination_id).cmp(&(b.start, &b.destination_id))
    });

    Ok(plan)
}
