//! Last-write-wins merge of observed answers into the record store.
//!
//! Each message is compared only against the store's current state, in the
//! order the mail source enumerates them. A message with an older or equal
//! timestamp than the stored record is ignored, even if an even later
//! message would have been superseded by it in a fully sorted replay.

use tracing::debug;

use crate::answers::types::{Answer, Message, Record};
use crate::ledger::store::RecordStore;

/// What a single reconcile call did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// First record for this sender.
    Inserted,
    /// Strictly newer message replaced the stored record.
    Updated,
    /// Stored record is as new or newer; nothing changed.
    Unchanged,
}

impl ReconcileOutcome {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Merge one answered message into `store`.
pub fn reconcile(store: &mut RecordStore, message: &Message, answer: Answer) -> ReconcileOutcome {
    let candidate = Record::from_message(message, answer);
    let key = candidate.key();

    let outcome = match store.get(&key) {
        None => ReconcileOutcome::Inserted,
        Some(existing) if candidate.last_updated > existing.last_updated => {
            ReconcileOutcome::Updated
        }
        Some(_) => ReconcileOutcome::Unchanged,
    };

    debug!(
        uid = %message.id,
        sender = %key,
        outcome = outcome.label(),
        "Reconciled answer"
    );

    if outcome.is_mutation() {
        store.upsert(key, candidate);
    }
    outcome
}

/// Owns the store for the length of a run and tracks whether it changed.
#[derive(Debug, Default)]
pub struct Reconciler {
    store: RecordStore,
    changed: bool,
}

impl Reconciler {
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            changed: false,
        }
    }

    pub fn reconcile(&mut self, message: &Message, answer: Answer) -> ReconcileOutcome {
        let outcome = reconcile(&mut self.store, message, answer);
        self.changed |= outcome.is_mutation();
        outcome
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Hand the store and change flag over for persistence.
    pub fn finish(self) -> (RecordStore, bool) {
        (self.store, self.changed)
    }
}
