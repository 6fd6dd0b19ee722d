//! External k-way merge of intermediate record streams into an index store.
//!
//! All streams of one index are read in parallel, positioned in a heap keyed by
//! the indexer's comparator. Each step pops the smallest key together with every
//! other stream positioned at an equal key, combines their ID lists (and the
//! stored value when appending), applies the entry limit, and writes the result.
//! Keys therefore reach the store in ascending order.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, binary_heap::PeekMut},
    io::Read,
};

use dirindex_common::Result;
use dirindex_entry_id_set::EntryIdSet;
use log::{debug, info, warn};

use crate::{
    config::{ImportConfig, IndexConfig},
    entry_limit::enforce_entry_limit,
    indexer::Indexer,
    key_pool::KeyBufferPool,
    record::{IntermediateRecord, RecordReader},
    store::{IndexStore, LockMode, read_set, write_set},
};

mod cursor;
pub mod files;
pub mod scheduler;

use cursor::MergeCursor;
pub use files::IntermediateFiles;
pub use scheduler::merge_indexes;

/// Counters of one merge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Intermediate streams consumed.
    pub streams: usize,
    pub records_read: u64,
    /// Keys put to the store, including undefined keys updated in place.
    pub keys_written: u64,
    /// Keys removed because replace-mode deletes emptied them.
    pub keys_deleted: u64,
    /// Keys that crossed the entry limit during this pass.
    pub keys_over_limit: u64,
    /// Stored undefined keys whose count was adjusted.
    pub undefined_updated: u64,
}

/// Merges the intermediate data of one index into its store.
pub struct IndexMerger<'a, S: IndexStore + ?Sized> {
    indexer: &'a dyn Indexer,
    store: &'a S,
    index_config: &'a IndexConfig,
    import_config: &'a ImportConfig,
}

impl<'a, S> IndexMerger<'a, S>
where
    S: IndexStore + ?Sized,
{
    pub fn new(
        indexer: &'a dyn Indexer,
        store: &'a S,
        index_config: &'a IndexConfig,
        import_config: &'a ImportConfig,
    ) -> Self {
        IndexMerger {
            indexer,
            store,
            index_config,
            import_config,
        }
    }

    /// Merges every file of this index found in the import's temporary directory.
    pub fn merge_from_temp_directory(&self, txn: Option<&S::Txn>) -> Result<MergeStats> {
        let temp_directory = &self.import_config.temp_directory;
        match IntermediateFiles::discover(temp_directory, &self.indexer.name()) {
            Ok(files) => self.merge_files(txn, files),
            Err(e) => self.complete(txn, Err(e)),
        }
    }

    /// Merges `files`, then deletes them regardless of the outcome.
    ///
    /// Without files a fresh build only marks the index trusted; an append leaves
    /// the index untouched. Any failure, an invalid configuration included, marks
    /// the index untrusted.
    pub fn merge_files(
        &self,
        txn: Option<&S::Txn>,
        files: IntermediateFiles,
    ) -> Result<MergeStats> {
        let result = self.validate().and_then(|()| {
            if files.is_empty() {
                debug!("{}: no intermediate data to merge", files.index_name());
                return Ok(MergeStats::default());
            }
            debug!(
                "{}: merging {} intermediate files in {} key order",
                files.index_name(),
                files.len(),
                self.indexer.comparator().name()
            );
            files
                .open_readers(
                    self.import_config.input_buffer_size,
                    self.import_config.replace_existing(),
                )
                .and_then(|readers| self.merge_streams(txn, readers))
        });
        // Readers are closed by now; dropping the guard deletes the files.
        drop(files);
        self.complete(txn, result)
    }

    /// Merges already opened streams. The streams must carry delete lists exactly
    /// when the import runs in replace-existing mode.
    pub fn merge_readers<R: Read>(
        &self,
        txn: Option<&S::Txn>,
        readers: Vec<RecordReader<R>>,
    ) -> Result<MergeStats> {
        let result = self
            .validate()
            .and_then(|()| self.merge_streams(txn, readers));
        self.complete(txn, result)
    }

    fn validate(&self) -> Result<()> {
        self.index_config.validate()?;
        self.import_config.validate()
    }

    fn complete(&self, txn: Option<&S::Txn>, result: Result<MergeStats>) -> Result<MergeStats> {
        let index_name = self.indexer.name();
        match result {
            Ok(stats) => {
                if !self.import_config.append_to_existing_data {
                    self.store.set_trusted(txn, true)?;
                }
                info!(
                    "{index_name}: merged {} records from {} streams, {} keys written, \
                     {} deleted, {} over entry limit",
                    stats.records_read,
                    stats.streams,
                    stats.keys_written,
                    stats.keys_deleted,
                    stats.keys_over_limit
                );
                Ok(stats)
            }
            Err(e) => {
                if let Err(mark_err) = self.store.set_trusted(txn, false) {
                    warn!(
                        "{index_name}: failed to mark index untrusted after merge error: \
                         {mark_err}"
                    );
                }
                Err(e)
            }
        }
    }

    fn merge_streams<R: Read>(
        &self,
        txn: Option<&S::Txn>,
        readers: Vec<RecordReader<R>>,
    ) -> Result<MergeStats> {
        let comparator = self.indexer.comparator();
        let mut stats = MergeStats {
            streams: readers.len(),
            ..Default::default()
        };
        let mut pool = KeyBufferPool::new();

        let mut heap = BinaryHeap::with_capacity(readers.len());
        for (stream, reader) in readers.into_iter().enumerate() {
            if let Some(cursor) =
                MergeCursor::open(stream, reader, comparator.clone_boxed(), &mut pool)?
            {
                stats.records_read += 1;
                heap.push(cursor);
            }
        }

        let mut value = MergeValue::default();
        let mut contributors = Vec::with_capacity(heap.len());
        let mut scratch = Vec::new();
        while let Some(mut top) = heap.pop() {
            value.start(top.stream(), top.take_record());
            contributors.push(top);

            // Pull every other stream positioned at the same key.
            while let Some(next) = heap.peek_mut() {
                if comparator.compare(next.key(), value.key()) != Ordering::Equal {
                    break;
                }
                let mut next = PeekMut::pop(next);
                value.absorb(next.stream(), next.take_record(), &mut pool);
                contributors.push(next);
            }

            self.commit(txn, &value, &mut scratch, &mut stats)?;

            for mut cursor in contributors.drain(..) {
                if cursor.advance(value.key(), &mut pool)? {
                    stats.records_read += 1;
                    heap.push(cursor);
                }
            }
            value.release(&mut pool);
        }
        debug!(
            "{}: key buffers allocated {}, reused {}",
            self.indexer.name(),
            pool.allocated(),
            pool.reused()
        );
        pool.clear();
        Ok(stats)
    }

    fn commit(
        &self,
        txn: Option<&S::Txn>,
        value: &MergeValue,
        scratch: &mut Vec<u8>,
        stats: &mut MergeStats,
    ) -> Result<()> {
        let append = self.import_config.append_to_existing_data;
        let key = value.key();

        let mut set = if append {
            read_set(self.store, txn, key, LockMode::ReadModifyWrite)?.unwrap_or_default()
        } else {
            EntryIdSet::new()
        };

        if !set.is_defined() {
            // Only the count of an undefined key is maintained.
            value.apply_to(&mut set, self.import_config.replace_existing())?;
            write_set(self.store, txn, key, &set, scratch)?;
            stats.undefined_updated += 1;
            stats.keys_written += 1;
            return Ok(());
        }

        value.apply_to(&mut set, self.import_config.replace_existing())?;
        if set.is_empty() {
            if append && self.store.delete(txn, key)? {
                stats.keys_deleted += 1;
            }
            return Ok(());
        }

        let (set, exceeded) = enforce_entry_limit(set, self.index_config);
        if exceeded {
            self.store.increment_entry_limit_exceeded_count();
            stats.keys_over_limit += 1;
        }
        write_set(self.store, txn, key, &set, scratch)?;
        stats.keys_written += 1;
        Ok(())
    }
}

/// The records of all streams positioned at one key.
#[derive(Debug, Default)]
struct MergeValue {
    key: Vec<u8>,
    adds: Vec<EntryIdSet>,
    deletes: Vec<EntryIdSet>,
    streams: Vec<usize>,
}

impl MergeValue {
    fn start(&mut self, stream: usize, record: IntermediateRecord) {
        self.adds.clear();
        self.deletes.clear();
        self.streams.clear();
        self.key = record.key;
        self.push(stream, record.add, record.delete);
    }

    /// Adds the lists of another record with an equal key, recycling its key.
    fn absorb(&mut self, stream: usize, record: IntermediateRecord, pool: &mut KeyBufferPool) {
        pool.release(record.key);
        self.push(stream, record.add, record.delete);
    }

    fn push(&mut self, stream: usize, add: EntryIdSet, delete: EntryIdSet) {
        self.streams.push(stream);
        if !add.is_empty() {
            self.adds.push(add);
        }
        if !delete.is_empty() {
            self.deletes.push(delete);
        }
    }

    fn key(&self) -> &[u8] {
        &self.key
    }

    /// Adds every add list to `set`, then removes every delete list when
    /// `apply_deletes` is set. An undefined `set` only adjusts its count.
    fn apply_to(&self, set: &mut EntryIdSet, apply_deletes: bool) -> Result<()> {
        for add in &self.adds {
            set.add_all(add.ids().unwrap_or_default())?;
        }
        if apply_deletes {
            for delete in &self.deletes {
                set.delete_all(delete.ids().unwrap_or_default());
            }
        }
        Ok(())
    }

    fn release(&mut self, pool: &mut KeyBufferPool) {
        pool.release(std::mem::take(&mut self.key));
    }
}
