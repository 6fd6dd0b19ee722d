//! Persistent index store contract.
//!
//! One `IndexStore` holds a single index: keys in comparator order mapped to
//! encoded entry ID sets, plus the index's trusted flag and its
//! entry-limit-exceeded counter. Every data operation runs inside an optional
//! ambient transaction.

use std::sync::Arc;

use dirindex_common::Result;
use dirindex_entry_id_set::EntryIdSet;

pub mod memory;

pub use memory::{JournalRecord, MemoryIndexStore, MemoryTransaction};

/// Lock requested by a read.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LockMode {
    #[default]
    Default,
    /// The value will be written back; the store may take a write lock up front.
    ReadModifyWrite,
}

pub trait IndexStore: Send + Sync {
    /// Transaction handle of the store.
    type Txn;

    /// Returns the raw value stored under `key`.
    fn read(
        &self,
        txn: Option<&Self::Txn>,
        key: &[u8],
        lock_mode: LockMode,
    ) -> Result<Option<Vec<u8>>>;

    fn put(&self, txn: Option<&Self::Txn>, key: &[u8], value: &[u8]) -> Result<()>;

    /// Removes `key`, returning whether it was present.
    fn delete(&self, txn: Option<&Self::Txn>, key: &[u8]) -> Result<bool>;

    /// Marks the index as usable (or not) for query evaluation.
    fn set_trusted(&self, txn: Option<&Self::Txn>, trusted: bool) -> Result<()>;

    fn is_trusted(&self) -> bool;

    fn increment_entry_limit_exceeded_count(&self);

    fn entry_limit_exceeded_count(&self) -> u64;
}

impl<T> IndexStore for Arc<T>
where
    T: IndexStore + ?Sized,
{
    type Txn = T::Txn;

    fn read(
        &self,
        txn: Option<&Self::Txn>,
        key: &[u8],
        lock_mode: LockMode,
    ) -> Result<Option<Vec<u8>>> {
        self.as_ref().read(txn, key, lock_mode)
    }

    fn put(&self, txn: Option<&Self::Txn>, key: &[u8], value: &[u8]) -> Result<()> {
        self.as_ref().put(txn, key, value)
    }

    fn delete(&self, txn: Option<&Self::Txn>, key: &[u8]) -> Result<bool> {
        self.as_ref().delete(txn, key)
    }

    fn set_trusted(&self, txn: Option<&Self::Txn>, trusted: bool) -> Result<()> {
        self.as_ref().set_trusted(txn, trusted)
    }

    fn is_trusted(&self) -> bool {
        self.as_ref().is_trusted()
    }

    fn increment_entry_limit_exceeded_count(&self) {
        self.as_ref().increment_entry_limit_exceeded_count()
    }

    fn entry_limit_exceeded_count(&self) -> u64 {
        self.as_ref().entry_limit_exceeded_count()
    }
}

/// Reads and decodes the set stored under `key`.
pub fn read_set<S>(
    store: &S,
    txn: Option<&S::Txn>,
    key: &[u8],
    lock_mode: LockMode,
) -> Result<Option<EntryIdSet>>
where
    S: IndexStore + ?Sized,
{
    store
        .read(txn, key, lock_mode)?
        .map(|bytes| EntryIdSet::decode(&bytes))
        .transpose()
}

/// Encodes `set` into `scratch` and stores it under `key`. A set holding an ID
/// above `MAX_ENTRY_ID` is rejected with `InvalidArgument`.
pub fn write_set<S>(
    store: &S,
    txn: Option<&S::Txn>,
    key: &[u8],
    set: &EntryIdSet,
    scratch: &mut Vec<u8>,
) -> Result<()>
where
    S: IndexStore + ?Sized,
{
    set.verify_ids()?;
    store.put(txn, key, set.encode(scratch))
}
