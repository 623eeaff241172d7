//! The output of one reconciliation.

use chrono::{DateTime, Utc};

use crate::event::{SourceEvent, SyncedEvent};
use crate::reconcile::OperationKind;

/// Three disjoint lists. Apply them as separate batches: create, update, delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationPlan {
    pub to_create: Vec<SourceEvent>,
    /// Existing destination event paired with the source event it must match
    pub to_update: Vec<(SyncedEvent, SourceEvent)>,
    pub to_delete: Vec<SyncedEvent>,
}

/// A borrowed view of one planned operation, for display.
#[derive(Debug, Clone, Copy)]
pub enum PlannedOperation<'a> {
    Create(&'a SourceEvent),
    Update {
        existing: &'a SyncedEvent,
        source: &'a SourceEvent,
    },
    Delete(&'a SyncedEvent),
}

impl OperationPlan {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len()
    }

    /// (creates, updates, deletes)
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.to_create.len(), self.to_update.len(), self.to_delete.len())
    }

    /// Operations in application order.
    pub fn operations(&self) -> impl Iterator<Item = PlannedOperation<'_>> {
        let creates = self.to_create.iter().map(PlannedOperation::Create);
        let updates = self
            .to_update
            .iter()
            .map(|(existing, source)| PlannedOperation::Update { existing, source });
        let deletes = self.to_delete.iter().map(PlannedOperation::Delete);
        creates.chain(updates).chain(deletes)
    }
}

impl PlannedOperation<'_> {
    pub fn kind(&self) -> OperationKind {
        match self {
            PlannedOperation::Create(_) => OperationKind::Create,
            PlannedOperation::Update { .. } => OperationKind::Update,
            PlannedOperation::Delete(_) => OperationKind::Delete,
        }
    }

    /// Source summary for creates and updates, destination title for deletes.
    pub fn label(&self) -> &str {
        match self {
            PlannedOperation::Create(event) => &event.summary,
            PlannedOperation::Update { source, .. } => &source.summary,
            PlannedOperation::Delete(event) => &event.title,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        match self {
            PlannedOperation::Create(event) => event.start,
            PlannedOperation::Update { source, .. } => source.start,
            PlannedOperation::Delete(event) => event.start,
        }
    }

    pub fn end(&self) -> DateTime<Utc> {
        match self {
            PlannedOperation::Create(event) => event.end,
            PlannedOperation::Update { source, .. } => source.end,
            PlannedOperation::Delete(event) => event.end,
        }
    }
}
