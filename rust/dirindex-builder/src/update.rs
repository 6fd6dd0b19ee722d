//! Single-entry index maintenance.
//!
//! Each affected key is updated with a read-modify-write through the store, so
//! concurrent updates are as isolated as the store's transactions make them.

use dirindex_common::Result;
use dirindex_entry_id_set::{EntryId, EntryIdSet, verify_entry_id};

use crate::{
    config::IndexConfig,
    entry::{IndexableEntry, Modification},
    entry_limit::enforce_entry_limit,
    indexer::{IndexKeys, Indexer, KeyDelta},
    store::{IndexStore, LockMode, read_set, write_set},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Change {
    Insert,
    Remove,
}

/// Applies the key changes of single entries to one index.
pub struct IncrementalUpdater<'a, S: IndexStore + ?Sized> {
    indexer: &'a dyn Indexer,
    store: &'a S,
    config: &'a IndexConfig,
}

impl<'a, S> IncrementalUpdater<'a, S>
where
    S: IndexStore + ?Sized,
{
    pub fn new(indexer: &'a dyn Indexer, store: &'a S, config: &'a IndexConfig) -> Self {
        IncrementalUpdater {
            indexer,
            store,
            config,
        }
    }

    /// Files a new entry under all of its keys. Returns the number of keys whose
    /// stored value changed.
    pub fn add_entry(
        &self,
        txn: Option<&S::Txn>,
        id: EntryId,
        entry: &dyn IndexableEntry,
    ) -> Result<usize> {
        let keys = self.indexer.generate_keys(entry);
        self.update_keys(txn, id, &keys, Change::Insert)
    }

    /// Removes a deleted entry from all of its keys.
    pub fn delete_entry(
        &self,
        txn: Option<&S::Txn>,
        id: EntryId,
        entry: &dyn IndexableEntry,
    ) -> Result<usize> {
        let keys = self.indexer.generate_keys(entry);
        self.update_keys(txn, id, &keys, Change::Remove)
    }

    /// Moves an entry from the keys of `old` to the keys of `new`.
    pub fn replace_entry(
        &self,
        txn: Option<&S::Txn>,
        id: EntryId,
        old: &dyn IndexableEntry,
        new: &dyn IndexableEntry,
    ) -> Result<usize> {
        let delta = self.indexer.diff_keys(Some(old), Some(new));
        self.apply_delta(txn, id, &delta)
    }

    /// Applies a modify operation; `new` is `old` with `mods` applied.
    pub fn modify_entry(
        &self,
        txn: Option<&S::Txn>,
        id: EntryId,
        old: &dyn IndexableEntry,
        new: &dyn IndexableEntry,
        mods: &[Modification],
    ) -> Result<usize> {
        let delta = self.indexer.modify_keys(old, new, mods);
        self.apply_delta(txn, id, &delta)
    }

    fn apply_delta(&self, txn: Option<&S::Txn>, id: EntryId, delta: &KeyDelta) -> Result<usize> {
        // Checked up front so a rejected ID never leaves the deletes applied alone.
        verify_entry_id(id)?;
        let removed = self.update_keys(txn, id, &delta.delete, Change::Remove)?;
        let inserted = self.update_keys(txn, id, &delta.add, Change::Insert)?;
        Ok(removed + inserted)
    }

    fn update_keys(
        &self,
        txn: Option<&S::Txn>,
        id: EntryId,
        keys: &IndexKeys,
        change: Change,
    ) -> Result<usize> {
        verify_entry_id(id)?;
        let mut scratch = Vec::new();
        let mut touched = 0;
        for key in keys.iter() {
            if self.update_key(txn, id, key, change, &mut scratch)? {
                touched += 1;
            }
        }
        Ok(touched)
    }

    fn update_key(
        &self,
        txn: Option<&S::Txn>,
        id: EntryId,
        key: &[u8],
        change: Change,
        scratch: &mut Vec<u8>,
    ) -> Result<bool> {
        let stored = read_set(self.store, txn, key, LockMode::ReadModifyWrite)?;
        let set = match (change, stored) {
            (Change::Insert, stored) => {
                let mut set = stored.unwrap_or_default();
                if !set.add(id)? && set.is_defined() {
                    return Ok(false);
                }
                set
            }
            (Change::Remove, None) => return Ok(false),
            (Change::Remove, Some(mut set)) => {
                // Membership of an undefined set is unknown; the entry is
                // assumed present.
                if !set.remove(id) && set.is_defined() {
                    return Ok(false);
                }
                if set.is_empty() {
                    self.store.delete(txn, key)?;
                    return Ok(true);
                }
                set
            }
        };
        self.store_set(txn, key, set, scratch)?;
        Ok(true)
    }

    fn store_set(
        &self,
        txn: Option<&S::Txn>,
        key: &[u8],
        set: EntryIdSet,
        scratch: &mut Vec<u8>,
    ) -> Result<()> {
        let (set, exceeded) = enforce_entry_limit(set, self.config);
        if exceeded {
            self.store.increment_entry_limit_exceeded_count();
        }
        write_set(self.store, txn, key, &set, scratch)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dirindex_common::error::ErrorKind;
    use dirindex_entry_id_set::MAX_ENTRY_ID;

    use super::*;
    use crate::{
        entry::{AttributeType, Entry, ModificationType},
        indexer::EqualityIndexer,
        matching_rules::CaseIgnoreMatch,
        store::MemoryIndexStore,
    };

    fn indexer() -> EqualityIndexer {
        EqualityIndexer::new(AttributeType::new("cn", Arc::new(CaseIgnoreMatch)))
    }

    fn ids(store: &MemoryIndexStore, key: &str) -> Option<Vec<u64>> {
        store
            .get_set(key.as_bytes())
            .unwrap()
            .and_then(EntryIdSet::into_ids)
    }

    #[test]
    fn test_add_and_delete_entry() {
        let (indexer, store, config) = (indexer(), MemoryIndexStore::new(), IndexConfig::default());
        let updater = IncrementalUpdater::new(&indexer, &store, &config);
        let entry = Entry::new().with_value("cn", "Smith").with_value("cn", "J Smith");

        assert_eq!(updater.add_entry(None, 4, &entry).unwrap(), 2);
        assert_eq!(updater.add_entry(None, 2, &entry).unwrap(), 2);
        // Already present
        assert_eq!(updater.add_entry(None, 2, &entry).unwrap(), 0);
        assert_eq!(ids(&store, "smith").unwrap(), vec![2, 4]);

        assert_eq!(updater.delete_entry(None, 4, &entry).unwrap(), 2);
        assert_eq!(ids(&store, "j smith").unwrap(), vec![2]);
        assert_eq!(updater.delete_entry(None, 2, &entry).unwrap(), 2);
        assert!(store.is_empty());
        assert_eq!(updater.delete_entry(None, 2, &entry).unwrap(), 0);
    }

    #[test]
    fn test_add_crosses_entry_limit() {
        let (indexer, store) = (indexer(), MemoryIndexStore::new());
        let config = IndexConfig::default().with_entry_limit(2);
        let updater = IncrementalUpdater::new(&indexer, &store, &config);
        let entry = Entry::new().with_value("cn", "common");
        for id in [10, 11, 12] {
            updater.add_entry(None, id, &entry).unwrap();
        }
        let set = store.get_set(b"common").unwrap().unwrap();
        assert!(!set.is_defined());
        assert_eq!(set.size(), 3);
        assert_eq!(store.entry_limit_exceeded_count(), 1);

        // Undefined keys only track the count
        updater.add_entry(None, 13, &entry).unwrap();
        updater.delete_entry(None, 10, &entry).unwrap();
        updater.delete_entry(None, 11, &entry).unwrap();
        let set = store.get_set(b"common").unwrap().unwrap();
        assert!(!set.is_defined());
        assert_eq!(set.size(), 2);
        assert_eq!(store.entry_limit_exceeded_count(), 1);
    }

    #[test]
    fn test_modify_entry() {
        let (indexer, store, config) = (indexer(), MemoryIndexStore::new(), IndexConfig::default());
        let updater = IncrementalUpdater::new(&indexer, &store, &config);
        let old = Entry::new().with_value("cn", "a").with_value("cn", "b");
        updater.add_entry(None, 1, &old).unwrap();

        let mods = vec![
            Modification::new(ModificationType::Delete, "cn", ["a"]),
            Modification::new(ModificationType::Add, "cn", ["c"]),
        ];
        let mut new = old.clone();
        mods.iter().for_each(|m| new.apply(m));

        assert_eq!(updater.modify_entry(None, 1, &old, &new, &mods).unwrap(), 2);
        assert!(ids(&store, "a").is_none());
        assert_eq!(ids(&store, "b").unwrap(), vec![1]);
        assert_eq!(ids(&store, "c").unwrap(), vec![1]);

        let renamed = Entry::new().with_value("cn", "D");
        assert_eq!(updater.replace_entry(None, 1, &new, &renamed).unwrap(), 3);
        assert_eq!(store.len(), 1);
        assert_eq!(ids(&store, "d").unwrap(), vec![1]);
    }

    #[test]
    fn test_reserved_entry_ids_rejected() {
        let (indexer, store, config) = (indexer(), MemoryIndexStore::new(), IndexConfig::default());
        let updater = IncrementalUpdater::new(&indexer, &store, &config);
        let entry = Entry::new().with_value("cn", "Smith");

        assert_eq!(updater.add_entry(None, MAX_ENTRY_ID, &entry).unwrap(), 1);
        let err = updater.add_entry(None, MAX_ENTRY_ID + 1, &entry).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));
        assert_eq!(ids(&store, "smith").unwrap(), vec![MAX_ENTRY_ID]);

        let renamed = Entry::new().with_value("cn", "Jones");
        assert!(updater.replace_entry(None, 1 << 63, &entry, &renamed).is_err());
        assert!(updater.delete_entry(None, u64::MAX, &entry).is_err());
        assert_eq!(ids(&store, "smith").unwrap(), vec![MAX_ENTRY_ID]);
        assert!(ids(&store, "jones").is_none());
    }
}
