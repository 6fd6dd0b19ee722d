use std::{collections::BTreeSet, sync::Arc};

use dirindex_builder::{
    AttributeIndex, ImportConfig, IndexConfig, IndexKind, IndexStore, Indexer,
    entry::{AttributeType, Entry, Modification, ModificationType},
    matching_rules::CaseIgnoreMatch,
    record::RecordWriter,
    store::{JournalRecord, MemoryIndexStore, MemoryTransaction},
};
use dirindex_entry_id_set::EntryIdSet;

fn cn_index(config: IndexConfig) -> AttributeIndex<Arc<MemoryIndexStore>> {
    AttributeIndex::new(
        IndexKind::Equality,
        AttributeType::new("cn", Arc::new(CaseIgnoreMatch)),
        Arc::new(MemoryIndexStore::new()),
        config,
    )
    .unwrap()
}

fn ids(index: &AttributeIndex<Arc<MemoryIndexStore>>, key: &str) -> Option<Vec<u64>> {
    index
        .entry_ids(None, key.as_bytes())
        .unwrap()
        .and_then(EntryIdSet::into_ids)
}

#[test]
fn test_incremental_after_bulk_load() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = RecordWriter::create(dir.path().join("cn.equality_0"), false).unwrap();
    writer
        .write_record(b"smith", &EntryIdSet::from_iter([1, 2]), &EntryIdSet::new())
        .unwrap();
    writer.finish().unwrap();

    let index = cn_index(IndexConfig::default());
    index.merge(None, &ImportConfig::new(dir.path())).unwrap();
    assert!(index.is_trusted());

    let entry = Entry::new().with_value("cn", "SMITH");
    assert_eq!(index.add_entry(None, 3, &entry).unwrap(), 1);
    assert_eq!(index.delete_entry(None, 1, &entry).unwrap(), 1);
    assert_eq!(ids(&index, "smith").unwrap(), vec![2, 3]);
}

#[test]
fn test_modify_writes_only_changed_keys() {
    let index = cn_index(IndexConfig::default());
    let old = Entry::new()
        .with_value("cn", "Barbara Jensen")
        .with_value("cn", "Babs Jensen")
        .with_value("sn", "Jensen");
    index.add_entry(None, 7, &old).unwrap();

    let mods = vec![
        Modification::new(ModificationType::Replace, "cn", ["Barbara Jensen", "Bjensen"]),
        Modification::new(ModificationType::Replace, "sn", ["Smith"]),
    ];
    let mut new = old.clone();
    for modification in &mods {
        new.apply(modification);
    }

    let txn = MemoryTransaction::new();
    assert_eq!(index.modify_entry(Some(&txn), 7, &old, &new, &mods).unwrap(), 2);
    assert_eq!(
        txn.journal(),
        vec![
            JournalRecord::Delete {
                key: b"babs jensen".to_vec()
            },
            JournalRecord::Put {
                key: b"bjensen".to_vec(),
                value: 7u64.to_be_bytes().to_vec()
            },
        ]
    );
    assert_eq!(ids(&index, "barbara jensen").unwrap(), vec![7]);
    assert!(ids(&index, "babs jensen").is_none());
}

#[test]
fn test_entry_limit_in_place() {
    let index = cn_index(IndexConfig::default().with_entry_limit(2).with_maintain_count(false));
    let entry = Entry::new().with_value("cn", "common");
    for id in 10..13 {
        index.add_entry(None, id, &entry).unwrap();
    }
    let set = index.entry_ids(None, b"common").unwrap().unwrap();
    assert_eq!(set, EntryIdSet::undefined_unknown());
    assert_eq!(index.store().entry_limit_exceeded_count(), 1);

    // Deletes cannot shrink an untracked set back to a defined one
    index.delete_entry(None, 10, &entry).unwrap();
    let set = index.entry_ids(None, b"common").unwrap().unwrap();
    assert_eq!(set, EntryIdSet::undefined_unknown());
}

#[test]
fn test_random_diff_matches_set_difference() {
    fastrand::seed(1234);
    let index = cn_index(IndexConfig::default());
    let indexer = index.indexer();
    let random_entry = || {
        let mut entry = Entry::new();
        let mut values = BTreeSet::new();
        for _ in 0..fastrand::usize(0..6) {
            let value = format!("name{}", fastrand::u8(0..10));
            entry.add_value("cn", &value);
            values.insert(value.into_bytes());
        }
        (entry, values)
    };

    for _ in 0..200 {
        let (old, old_values) = random_entry();
        let (new, new_values) = random_entry();
        let delta = indexer.diff_keys(Some(&old), Some(&new));

        let add = delta.add.iter().map(<[u8]>::to_vec).collect::<BTreeSet<_>>();
        let delete = delta.delete.iter().map(<[u8]>::to_vec).collect::<BTreeSet<_>>();
        assert_eq!(add, &new_values - &old_values);
        assert_eq!(delete, &old_values - &new_values);
    }
}
