//! Reconciliation: what to create, update and delete in the destination.

mod apply;
mod operation_kind;
mod plan;
mod reconciler;

pub use apply::{SyncReport, apply_plan};
pub use operation_kind::OperationKind;
pub use plan::{OperationPlan, PlannedOperation};
pub use reconciler::{FieldChange, ReconcileSettings, changed_fields, reconcile, retain_valid};
