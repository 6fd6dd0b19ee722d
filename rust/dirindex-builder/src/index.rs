use dirindex_common::Result;
use dirindex_entry_id_set::{EntryId, EntryIdSet};

use crate::{
    config::{ImportConfig, IndexConfig},
    entry::{AttributeType, IndexableEntry, Modification},
    indexer::{IndexKind, Indexer, IndexerType, create_indexer},
    merge::{IndexMerger, MergeStats},
    store::{IndexStore, LockMode, read_set},
    update::IncrementalUpdater,
};

/// One attribute index: its indexer, its store and its settings.
pub struct AttributeIndex<S> {
    indexer: IndexerType,
    store: S,
    config: IndexConfig,
}

impl<S: IndexStore> AttributeIndex<S> {
    pub fn new(
        kind: IndexKind,
        attribute: AttributeType,
        store: S,
        config: IndexConfig,
    ) -> Result<AttributeIndex<S>> {
        config.validate()?;
        Ok(AttributeIndex {
            indexer: create_indexer(kind, attribute)?,
            store,
            config,
        })
    }

    /// Index name, e.g. `cn.equality`.
    pub fn name(&self) -> String {
        self.indexer.name()
    }

    pub fn indexer(&self) -> &IndexerType {
        &self.indexer
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn is_trusted(&self) -> bool {
        self.store.is_trusted()
    }

    /// Reads the set stored under an already normalized key.
    pub fn entry_ids(&self, txn: Option<&S::Txn>, key: &[u8]) -> Result<Option<EntryIdSet>> {
        read_set(&self.store, txn, key, LockMode::Default)
    }

    /// Merges this index's intermediate files from the import's temporary
    /// directory into the store.
    pub fn merge(&self, txn: Option<&S::Txn>, import_config: &ImportConfig) -> Result<MergeStats> {
        self.merger(import_config).merge_from_temp_directory(txn)
    }

    pub fn merger<'a>(&'a self, import_config: &'a ImportConfig) -> IndexMerger<'a, S> {
        IndexMerger::new(&self.indexer, &self.store, &self.config, import_config)
    }

    pub fn add_entry(
        &self,
        txn: Option<&S::Txn>,
        id: EntryId,
        entry: &dyn IndexableEntry,
    ) -> Result<usize> {
        self.updater().add_entry(txn, id, entry)
    }

    pub fn delete_entry(
        &self,
        txn: Option<&S::Txn>,
        id: EntryId,
        entry: &dyn IndexableEntry,
    ) -> Result<usize> {
        self.updater().delete_entry(txn, id, entry)
    }

    pub fn replace_entry(
        &self,
        txn: Option<&S::Txn>,
        id: EntryId,
        old: &dyn IndexableEntry,
        new: &dyn IndexableEntry,
    ) -> Result<usize> {
        self.updater().replace_entry(txn, id, old, new)
    }

    pub fn modify_entry(
        &self,
        txn: Option<&S::Txn>,
        id: EntryId,
        old: &dyn IndexableEntry,
        new: &dyn IndexableEntry,
        mods: &[Modification],
    ) -> Result<usize> {
        self.updater().modify_entry(txn, id, old, new, mods)
    }

    fn updater(&self) -> IncrementalUpdater<'_, S> {
        IncrementalUpdater::new(&self.indexer, &self.store, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{entry::Entry, matching_rules::IntegerMatch, store::MemoryIndexStore};

    #[test]
    fn test_attribute_index() {
        let index = AttributeIndex::new(
            IndexKind::Equality,
            AttributeType::new("uidNumber", Arc::new(IntegerMatch)),
            MemoryIndexStore::new(),
            IndexConfig::default(),
        )
        .unwrap();
        assert_eq!(index.name(), "uidnumber.equality");

        let entry = Entry::new().with_value("uidNumber", "007");
        assert_eq!(index.add_entry(None, 3, &entry).unwrap(), 1);
        let set = index.entry_ids(None, b"7").unwrap().unwrap();
        assert_eq!(set.ids().unwrap(), &[3]);
    }

    #[test]
    fn test_rejects_unsupported_kind() {
        let result = AttributeIndex::new(
            IndexKind::Substring,
            AttributeType::new("cn", Arc::new(IntegerMatch)),
            MemoryIndexStore::new(),
            IndexConfig::default(),
        );
        assert!(result.is_err());
    }
}
