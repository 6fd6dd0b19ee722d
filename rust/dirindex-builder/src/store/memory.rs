use std::{
    collections::BTreeMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use dirindex_common::Result;
use dirindex_entry_id_set::EntryIdSet;

use super::{IndexStore, LockMode};

/// A write performed through a [`MemoryTransaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalRecord {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
    SetTrusted(bool),
}

/// Transaction handle of [`MemoryIndexStore`].
///
/// Writes are applied to the store immediately; the transaction only keeps the
/// ordered journal of what was written through it.
#[derive(Debug, Default)]
pub struct MemoryTransaction {
    journal: Mutex<Vec<JournalRecord>>,
}

impl MemoryTransaction {
    pub fn new() -> MemoryTransaction {
        MemoryTransaction::default()
    }

    pub fn journal(&self) -> Vec<JournalRecord> {
        self.journal.lock().unwrap().clone()
    }

    /// Keys of the journal's `Put` records, in write order.
    pub fn put_keys(&self) -> Vec<Vec<u8>> {
        self.journal
            .lock()
            .unwrap()
            .iter()
            .filter_map(|record| match record {
                JournalRecord::Put { key, .. } => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, record: JournalRecord) {
        self.journal.lock().unwrap().push(record);
    }
}

/// In-memory index store ordered by unsigned key bytes.
#[derive(Debug)]
pub struct MemoryIndexStore {
    data: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
    trusted: AtomicBool,
    entry_limit_exceeded: AtomicU64,
}

impl Default for MemoryIndexStore {
    fn default() -> Self {
        MemoryIndexStore {
            data: Default::default(),
            trusted: AtomicBool::new(false),
            entry_limit_exceeded: AtomicU64::new(0),
        }
    }
}

impl MemoryIndexStore {
    pub fn new() -> MemoryIndexStore {
        MemoryIndexStore::default()
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decodes the set stored under `key`.
    pub fn get_set(&self, key: &[u8]) -> Result<Option<EntryIdSet>> {
        self.data
            .lock()
            .unwrap()
            .get(key)
            .map(|bytes| EntryIdSet::decode(bytes))
            .transpose()
    }

    /// Copy of the raw contents, in key order.
    pub fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.data.lock().unwrap().clone()
    }
}

impl IndexStore for MemoryIndexStore {
    type Txn = MemoryTransaction;

    fn read(
        &self,
        _txn: Option<&MemoryTransaction>,
        key: &[u8],
        _lock_mode: LockMode,
    ) -> Result<Option<Vec<u8>>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    fn put(&self, txn: Option<&MemoryTransaction>, key: &[u8], value: &[u8]) -> Result<()> {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_vec(), value.to_vec());
        if let Some(txn) = txn {
            txn.record(JournalRecord::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            });
        }
        Ok(())
    }

    fn delete(&self, txn: Option<&MemoryTransaction>, key: &[u8]) -> Result<bool> {
        let removed = self.data.lock().unwrap().remove(key).is_some();
        if let Some(txn) = txn {
            txn.record(JournalRecord::Delete { key: key.to_vec() });
        }
        Ok(removed)
    }

    fn set_trusted(&self, txn: Option<&MemoryTransaction>, trusted: bool) -> Result<()> {
        self.trusted.store(trusted, Ordering::Release);
        if let Some(txn) = txn {
            txn.record(JournalRecord::SetTrusted(trusted));
        }
        Ok(())
    }

    fn is_trusted(&self) -> bool {
        self.trusted.load(Ordering::Acquire)
    }

    fn increment_entry_limit_exceeded_count(&self) {
        self.entry_limit_exceeded.fetch_add(1, Ordering::Relaxed);
    }

    fn entry_limit_exceeded_count(&self) -> u64 {
        self.entry_limit_exceeded.load(Ordering::Relaxed)
    }
}
