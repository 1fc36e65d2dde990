//! In-memory record store keyed by canonical sender address.

use std::collections::BTreeMap;

use crate::answers::types::{Record, SenderKey};

/// At most one [`Record`] per [`SenderKey`]; iterates in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordStore {
    records: BTreeMap<SenderKey, Record>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from previously persisted records.
    ///
    /// Later rows win when a snapshot holds the same address twice.
    pub fn load(rows: impl IntoIterator<Item = Record>) -> Self {
        let mut store = Self::new();
        for record in rows {
            store.upsert(record.key(), record);
        }
        store
    }

    pub fn get(&self, key: &SenderKey) -> Option<&Record> {
        self.records.get(key)
    }

    /// Insert or replace unconditionally under `key`, which must be
    /// `record.key()`. Ordering policy lives in the reconciler.
    pub fn upsert(&mut self, key: SenderKey, record: Record) {
        debug_assert_eq!(key, record.key());
        self.records.insert(key, record);
    }

    /// Records ordered by canonical address ascending.
    pub fn all(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
