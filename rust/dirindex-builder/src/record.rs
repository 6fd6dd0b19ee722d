//! Intermediate record streams.
//!
//! Each import partition produces one stream per index, sorted by the index's key
//! comparator. A record is
//!
//! ```text
//! [u32 key length][key bytes][add list][delete list]
//! ```
//!
//! where each ID list is `[u32 count][count x u64]` (the canonical defined
//! `EntryIdSet` encoding behind a count prefix). The delete list is present only
//! when the import runs in replace-existing mode. All integers are big-endian. A
//! stream ends with a clean end of file in front of a key length field.

use std::{
    fs::File,
    io::{BufReader, BufWriter, ErrorKind, Read, Write},
    path::Path,
};

use dirindex_common::{Result, error::Error, try_or_ret_some_err, verify_arg};
use dirindex_entry_id_set::{ENCODED_ID_SIZE, EntryIdSet};

use crate::key_pool::KeyBufferPool;

const LEN_SIZE: usize = std::mem::size_of::<u32>();

/// One decoded record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntermediateRecord {
    pub key: Vec<u8>,
    pub add: EntryIdSet,
    /// Always empty unless the stream carries delete lists.
    pub delete: EntryIdSet,
}

/// Writes records to an intermediate stream.
///
/// Keys are written as given; ordering the records is the producer's job.
pub struct RecordWriter<W: Write> {
    writer: W,
    with_deletes: bool,
    scratch: Vec<u8>,
    records: u64,
}

impl RecordWriter<BufWriter<File>> {
    /// Creates (or truncates) an intermediate file.
    pub fn create(path: impl AsRef<Path>, with_deletes: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::io(path.display().to_string(), e))?;
        Ok(RecordWriter::new(BufWriter::new(file), with_deletes))
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn new(writer: W, with_deletes: bool) -> Self {
        RecordWriter {
            writer,
            with_deletes,
            scratch: Vec::new(),
            records: 0,
        }
    }

    /// Appends one record. Both sets must be defined; `delete` must be empty
    /// unless the stream carries delete lists.
    pub fn write_record(
        &mut self,
        key: &[u8],
        add: &EntryIdSet,
        delete: &EntryIdSet,
    ) -> Result<()> {
        verify_arg!(add, add.is_defined());
        verify_arg!(delete, delete.is_defined());
        verify_arg!(delete, self.with_deletes || delete.is_empty());
        add.verify_ids()?;
        delete.verify_ids()?;
        let key_len = u32::try_from(key.len())
            .map_err(|_| Error::invalid_arg("key", "key longer than u32::MAX bytes"))?;

        self.writer.write_all(&key_len.to_be_bytes())?;
        self.writer.write_all(key)?;
        self.write_list(add)?;
        if self.with_deletes {
            self.write_list(delete)?;
        }
        self.records += 1;
        Ok(())
    }

    fn write_list(&mut self, set: &EntryIdSet) -> Result<()> {
        let count = u32::try_from(set.size())
            .map_err(|_| Error::invalid_arg("set", "ID list longer than u32::MAX"))?;
        self.writer.write_all(&count.to_be_bytes())?;
        self.writer.write_all(set.encode(&mut self.scratch))?;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Reads records from an intermediate stream.
///
/// Truncated fields, incomplete payloads, and ID lists that are not strictly
/// ascending are reported as `CorruptIntermediateData`.
pub struct RecordReader<R: Read> {
    reader: R,
    source_name: String,
    with_deletes: bool,
    scratch: Vec<u8>,
}

impl RecordReader<BufReader<File>> {
    /// Opens an intermediate file with a read buffer of `buffer_size` bytes.
    pub fn open(path: impl AsRef<Path>, buffer_size: usize, with_deletes: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path.display().to_string(), e))?;
        let source_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(RecordReader::new(
            BufReader::with_capacity(buffer_size, file),
            source_name,
            with_deletes,
        ))
    }
}

impl<R: Read> RecordReader<R> {
    pub fn new(reader: R, source_name: impl Into<String>, with_deletes: bool) -> Self {
        RecordReader {
            reader,
            source_name: source_name.into(),
            with_deletes,
            scratch: Vec::new(),
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Reads the next record, allocating its key. Returns `None` at the end of
    /// the stream.
    pub fn read_record(&mut self) -> Result<Option<IntermediateRecord>> {
        self.read_record_with(&mut KeyBufferPool::new())
    }

    /// Reads the next record, taking the key buffer from `pool`.
    pub fn read_record_with(
        &mut self,
        pool: &mut KeyBufferPool,
    ) -> Result<Option<IntermediateRecord>> {
        let Some(key_len) = self.read_len("key length", true)? else {
            return Ok(None);
        };
        let mut key = pool.acquire(key_len);
        self.read_payload(&mut key, key_len, "key")?;

        let add = self.read_list("add list")?;
        let delete = if self.with_deletes {
            self.read_list("delete list")?
        } else {
            EntryIdSet::new()
        };
        Ok(Some(IntermediateRecord { key, add, delete }))
    }

    fn read_list(&mut self, what: &str) -> Result<EntryIdSet> {
        let Some(count) = self.read_len(what, false)? else {
            return Err(self.corrupt(format!("missing {what}")));
        };
        let byte_len = count
            .checked_mul(ENCODED_ID_SIZE)
            .ok_or_else(|| self.corrupt(format!("{what} count {count} overflows")))?;

        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        let result = self.read_payload(&mut scratch, byte_len, what).and_then(|()| {
            match EntryIdSet::decode(&scratch) {
                Ok(set) if set.is_defined() => Ok(set),
                Ok(_) => Err(self.corrupt(format!("{what} has an undefined encoding"))),
                Err(e) => Err(self.corrupt(format!("{what}: {e}"))),
            }
        });
        self.scratch = scratch;
        result
    }

    /// Reads a `u32` length. A clean end of stream before the first byte yields
    /// `None` when `eof_ok` is set.
    fn read_len(&mut self, what: &str, eof_ok: bool) -> Result<Option<usize>> {
        let mut buf = [0u8; LEN_SIZE];
        let mut filled = 0;
        while filled < LEN_SIZE {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::io(self.source_name.clone(), e)),
            }
        }
        match filled {
            0 if eof_ok => Ok(None),
            LEN_SIZE => Ok(Some(u32::from_be_bytes(buf) as usize)),
            _ => Err(self.corrupt(format!("truncated {what}: {filled} of {LEN_SIZE} bytes"))),
        }
    }

    /// Appends exactly `len` bytes to `buf`. Memory grows with the bytes actually
    /// present, so a corrupt length cannot force a huge allocation.
    fn read_payload(&mut self, buf: &mut Vec<u8>, len: usize, what: &str) -> Result<()> {
        let start = buf.len();
        (&mut self.reader)
            .take(len as u64)
            .read_to_end(buf)
            .map_err(|e| Error::io(self.source_name.clone(), e))?;
        let read = buf.len() - start;
        if read < len {
            return Err(self.corrupt(format!("incomplete {what}: {read} of {len} bytes")));
        }
        Ok(())
    }

    fn corrupt(&self, message: String) -> Error {
        Error::corrupt_intermediate(self.source_name.clone(), message)
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<IntermediateRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = try_or_ret_some_err!(self.read_record());
        record.map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use dirindex_entry_id_set::MAX_ENTRY_ID;

    use super::*;

    fn set(ids: &[u64]) -> EntryIdSet {
        EntryIdSet::from_iter(ids.iter().copied())
    }

    fn write_stream(records: &[(&str, &[u64], &[u64])], with_deletes: bool) -> Vec<u8> {
        let mut writer = RecordWriter::new(Vec::new(), with_deletes);
        for (key, add, delete) in records {
            writer
                .write_record(key.as_bytes(), &set(add), &set(delete))
                .unwrap();
        }
        assert_eq!(writer.records_written(), records.len() as u64);
        writer.finish().unwrap()
    }

    #[test]
    fn test_record_layout() {
        let bytes = write_stream(&[("ab", &[1, 2], &[])], false);
        let mut expected = vec![0, 0, 0, 2, b'a', b'b', 0, 0, 0, 2];
        expected.extend_from_slice(&1u64.to_be_bytes());
        expected.extend_from_slice(&2u64.to_be_bytes());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_read_stream() {
        let bytes = write_stream(
            &[("jones", &[4], &[9]), ("smith", &[1, 2], &[]), ("", &[], &[3])],
            true,
        );
        let records = RecordReader::new(Cursor::new(bytes), "sn.equality_0", true)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].key, b"jones");
        assert_eq!(records[0].delete, set(&[9]));
        assert_eq!(records[1].add, set(&[1, 2]));
        assert!(records[2].key.is_empty());
        assert!(records[2].add.is_empty());
    }

    #[test]
    fn test_delete_lists_only_in_replace_mode() {
        let mut writer = RecordWriter::new(Vec::new(), false);
        assert!(writer.write_record(b"k", &set(&[1]), &set(&[2])).is_err());
        assert!(
            writer
                .write_record(b"k", &EntryIdSet::undefined(3), &set(&[]))
                .is_err()
        );
    }

    #[test]
    fn test_reserved_ids_rejected_before_writing() {
        let mut writer = RecordWriter::new(Vec::new(), true);
        let reserved = EntryIdSet::from_iter([1, 1 << 63]);
        assert!(writer.write_record(b"k", &reserved, &set(&[])).is_err());
        assert!(writer.write_record(b"k", &set(&[1]), &reserved).is_err());
        writer
            .write_record(b"k", &set(&[MAX_ENTRY_ID]), &set(&[]))
            .unwrap();
        assert_eq!(writer.records_written(), 1);
        assert_eq!(writer.finish().unwrap().len(), 4 + 1 + 4 + 8 + 4);
    }

    #[test]
    fn test_empty_stream() {
        let mut reader = RecordReader::new(Cursor::new(Vec::new()), "empty", false);
        assert!(reader.read_record().unwrap().is_none());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_truncation_is_corrupt() {
        let bytes = write_stream(&[("smith", &[1, 2, 3], &[])], false);
        // Every proper prefix past the first byte is a truncated record
        for cut in 1..bytes.len() {
            let mut reader = RecordReader::new(Cursor::new(&bytes[..cut]), "cn.equality_1", false);
            let err = reader.read_record().unwrap_err();
            assert!(err.is_corrupt_intermediate_data(), "cut at {cut}: {err}");
        }
    }

    #[test]
    fn test_oversized_lengths_are_corrupt() {
        let bytes = vec![0xff, 0xff, 0xff, 0xf0, b'a'];
        let mut reader = RecordReader::new(Cursor::new(bytes), "cn.equality_4", false);
        let err = reader.read_record().unwrap_err();
        assert!(err.is_corrupt_intermediate_data(), "{err}");
        assert!(err.to_string().contains("incomplete key"));

        let bytes = vec![0, 0, 0, 1, b'k', 0xff, 0xff, 0xff, 0xff, 0, 0, 0];
        let mut reader = RecordReader::new(Cursor::new(bytes), "cn.equality_5", false);
        assert!(reader.read_record().unwrap_err().is_corrupt_intermediate_data());
    }

    #[test]
    fn test_unsorted_ids_are_corrupt() {
        let mut bytes = vec![0, 0, 0, 1, b'k', 0, 0, 0, 2];
        bytes.extend_from_slice(&5u64.to_be_bytes());
        bytes.extend_from_slice(&3u64.to_be_bytes());
        let mut reader = RecordReader::new(Cursor::new(bytes), "cn.equality_2", false);
        let err = reader.read_record().unwrap_err();
        assert!(err.is_corrupt_intermediate_data());
        assert!(err.to_string().contains("cn.equality_2"));
    }

    #[test]
    fn test_undefined_list_is_corrupt() {
        let mut bytes = vec![0, 0, 0, 1, b'k', 0, 0, 0, 1];
        bytes.extend_from_slice(&(1u64 << 63 | 7).to_be_bytes());
        let mut reader = RecordReader::new(Cursor::new(bytes), "cn.equality_3", false);
        assert!(reader.read_record().unwrap_err().is_corrupt_intermediate_data());
    }

    #[test]
    fn test_pooled_keys() {
        let bytes = write_stream(&[("aa", &[1], &[]), ("bb", &[2], &[])], false);
        let mut reader = RecordReader::new(Cursor::new(bytes), "pooled", false);
        let mut pool = KeyBufferPool::new();

        let first = reader.read_record_with(&mut pool).unwrap().unwrap();
        pool.release(first.key);
        let second = reader.read_record_with(&mut pool).unwrap().unwrap();
        assert_eq!(second.key, b"bb");
        assert_eq!(pool.reused(), 1);
        assert!(reader.read_record_with(&mut pool).unwrap().is_none());
    }
}
