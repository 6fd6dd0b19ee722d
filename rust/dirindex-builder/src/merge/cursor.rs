use std::{cmp::Ordering, io::Read};

use dirindex_common::{Result, error::Error};

use crate::{
    comparator::KeyComparator,
    key_pool::KeyBufferPool,
    record::{IntermediateRecord, RecordReader},
};

/// One intermediate stream positioned at its current record.
///
/// The merge heap is a max-heap, so `Ord` is reversed: the cursor with the
/// smallest key compares greatest. Equal keys fall back to the stream index,
/// which makes the pop order deterministic.
pub(crate) struct MergeCursor<R: Read> {
    stream: usize,
    comparator: Box<dyn KeyComparator>,
    reader: RecordReader<R>,
    record: IntermediateRecord,
}

impl<R: Read> MergeCursor<R> {
    /// Reads the first record of `reader`. Returns `None` for an empty stream.
    pub fn open(
        stream: usize,
        mut reader: RecordReader<R>,
        comparator: Box<dyn KeyComparator>,
        pool: &mut KeyBufferPool,
    ) -> Result<Option<Self>> {
        Ok(reader
            .read_record_with(pool)?
            .map(|record| MergeCursor {
                stream,
                comparator,
                reader,
                record,
            }))
    }

    #[inline]
    pub fn key(&self) -> &[u8] {
        &self.record.key
    }

    pub fn stream(&self) -> usize {
        self.stream
    }

    /// Moves the current record out, leaving an empty placeholder.
    pub fn take_record(&mut self) -> IntermediateRecord {
        std::mem::take(&mut self.record)
    }

    /// Reads the next record. The new key must sort strictly after
    /// `previous_key`, the key of the record just consumed. Returns `false` when
    /// the stream is exhausted.
    pub fn advance(&mut self, previous_key: &[u8], pool: &mut KeyBufferPool) -> Result<bool> {
        let Some(record) = self.reader.read_record_with(pool)? else {
            return Ok(false);
        };
        if self.comparator.compare(&record.key, previous_key) != Ordering::Greater {
            return Err(Error::corrupt_intermediate(
                self.reader.source_name(),
                "keys are not in ascending order",
            ));
        }
        self.record = record;
        Ok(true)
    }
}

impl<R: Read> PartialEq for MergeCursor<R> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<R: Read> Eq for MergeCursor<R> {}

impl<R: Read> Ord for MergeCursor<R> {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.comparator
            .compare(self.key(), other.key())
            .then_with(|| self.stream.cmp(&other.stream))
            .reverse()
    }
}

impl<R: Read> PartialOrd for MergeCursor<R> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
