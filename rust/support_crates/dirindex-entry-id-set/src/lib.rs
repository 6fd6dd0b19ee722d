//! Sorted sets of directory entry identifiers, as stored under a single index key.

pub mod entry_id_set;

pub use entry_id_set::{ENCODED_ID_SIZE, EntryId, EntryIdSet, MAX_ENTRY_ID, verify_entry_id};
