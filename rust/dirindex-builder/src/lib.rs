//! Bulk build, merge, and incremental maintenance of directory attribute indexes.
//!
//! An attribute index maps normalized attribute values (keys) to the sets of
//! entries holding them. During an import, partition workers write sorted
//! intermediate record streams; the merge engine combines all streams of an index
//! into its store. Outside imports, single entries are maintained in place.

pub mod comparator;
pub mod config;
pub mod entry;
pub mod entry_limit;
pub mod index;
pub mod indexer;
pub mod key_pool;
pub mod matching_rules;
pub mod merge;
pub mod record;
pub mod store;
pub mod update;

pub use config::{ImportConfig, IndexConfig};
pub use index::AttributeIndex;
pub use indexer::{IndexKind, Indexer, IndexerType, create_indexer};
pub use merge::{IndexMerger, IntermediateFiles, MergeStats, merge_indexes};
pub use store::{IndexStore, LockMode};
