//! Per-sender answer ledger: store, reconciliation, snapshot persistence.

pub mod reconcile;
pub mod snapshot;
pub mod store;

pub use reconcile::{ReconcileOutcome, Reconciler, reconcile};
pub use snapshot::{SaveOutcome, load_snapshot, save_snapshot};
pub use store::RecordStore;
