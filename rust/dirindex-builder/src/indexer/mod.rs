//! Index key generation.
//!
//! An indexer turns the attribute values of an entry into the set of keys under
//! which the entry is filed, and computes the key delta between two versions of an
//! entry for incremental maintenance. Indexers are stateless and never touch the
//! store.

use std::cmp::Ordering;

use dirindex_common::{Result, error::Error};

use crate::{
    comparator::KeyComparator,
    entry::{AttributeType, IndexableEntry, Modification},
};

pub mod equality;

pub use equality::EqualityIndexer;

/// Index flavors known to the backend. Only equality indexes are built here.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum IndexKind {
    Equality,
    Substring,
    Ordering,
    Presence,
    Approximate,
}

impl IndexKind {
    pub const fn name(&self) -> &'static str {
        match self {
            IndexKind::Equality => "equality",
            IndexKind::Substring => "substring",
            IndexKind::Ordering => "ordering",
            IndexKind::Presence => "presence",
            IndexKind::Approximate => "approximate",
        }
    }
}

impl TryFrom<&str> for IndexKind {
    type Error = Error;

    fn try_from(name: &str) -> Result<Self> {
        match name {
            "equality" => Ok(IndexKind::Equality),
            "substring" => Ok(IndexKind::Substring),
            "ordering" => Ok(IndexKind::Ordering),
            "presence" => Ok(IndexKind::Presence),
            "approximate" => Ok(IndexKind::Approximate),
            _ => Err(Error::invalid_arg(
                "name",
                format!("Unrecognized index kind: {name}"),
            )),
        }
    }
}

/// Keys of one entry, sorted by the indexer's comparator and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexKeys {
    keys: Vec<Vec<u8>>,
}

impl IndexKeys {
    pub fn new() -> IndexKeys {
        IndexKeys::default()
    }

    /// Sorts `keys` with `comparator` and collapses equal keys.
    pub fn from_unsorted(mut keys: Vec<Vec<u8>>, comparator: &dyn KeyComparator) -> IndexKeys {
        keys.sort_by(|a, b| comparator.compare(a, b));
        keys.dedup_by(|a, b| comparator.compare(a, b) == Ordering::Equal);
        IndexKeys { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.keys.iter().map(Vec::as_slice)
    }

    pub fn contains(&self, key: &[u8], comparator: &dyn KeyComparator) -> bool {
        self.keys
            .binary_search_by(|probe| comparator.compare(probe, key))
            .is_ok()
    }

    /// Keys of `self` that are absent from `other`, in order.
    pub fn difference(&self, other: &IndexKeys, comparator: &dyn KeyComparator) -> IndexKeys {
        let mut keys = Vec::new();
        let mut rest = other.keys.as_slice();
        for key in &self.keys {
            while let Some((head, tail)) = rest.split_first() {
                if comparator.compare(head, key) == Ordering::Less {
                    rest = tail;
                } else {
                    break;
                }
            }
            let present = rest
                .first()
                .is_some_and(|head| comparator.compare(head, key) == Ordering::Equal);
            if !present {
                keys.push(key.clone());
            }
        }
        IndexKeys { keys }
    }

    pub fn into_vec(self) -> Vec<Vec<u8>> {
        self.keys
    }
}

/// Keys an entry gains and loses between two of its versions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDelta {
    pub add: IndexKeys,
    pub delete: IndexKeys,
}

impl KeyDelta {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.delete.is_empty()
    }
}

/// Key generation strategy of one index.
pub trait Indexer: Send + Sync + 'static {
    fn kind(&self) -> IndexKind;

    /// The indexed attribute.
    fn attribute(&self) -> &AttributeType;

    /// Index name, `<attribute>.<kind>`. Intermediate files of this index are
    /// named with this prefix.
    fn name(&self) -> String {
        format!("{}.{}", self.attribute().name(), self.kind().name())
    }

    /// Total order of this index's keys, on disk and during merges.
    fn comparator(&self) -> &dyn KeyComparator;

    /// Generates the keys of `entry`. Values that fail normalization are skipped.
    fn generate_keys(&self, entry: &dyn IndexableEntry) -> IndexKeys;

    /// Computes the key delta from `old` to `new`. A missing side contributes no
    /// keys, so a deleted entry loses all of its keys and a new entry gains all
    /// of them.
    fn diff_keys(
        &self,
        old: Option<&dyn IndexableEntry>,
        new: Option<&dyn IndexableEntry>,
    ) -> KeyDelta {
        let old_keys = old.map(|e| self.generate_keys(e)).unwrap_or_default();
        let new_keys = new.map(|e| self.generate_keys(e)).unwrap_or_default();
        if old_keys.is_empty() || new_keys.is_empty() {
            return KeyDelta {
                add: new_keys,
                delete: old_keys,
            };
        }
        let comparator = self.comparator();
        KeyDelta {
            add: new_keys.difference(&old_keys, comparator),
            delete: old_keys.difference(&new_keys, comparator),
        }
    }

    /// Computes the key delta of a modify operation. Flavors whose keys do not
    /// depend on the modification list fall back to [`Indexer::diff_keys`].
    fn modify_keys(
        &self,
        old: &dyn IndexableEntry,
        new: &dyn IndexableEntry,
        _mods: &[Modification],
    ) -> KeyDelta {
        self.diff_keys(Some(old), Some(new))
    }
}

/// Creates the indexer of `kind` for `attribute`.
pub fn create_indexer(kind: IndexKind, attribute: AttributeType) -> Result<IndexerType> {
    match kind {
        IndexKind::Equality => Ok(IndexerType::Equality(EqualityIndexer::new(attribute))),
        _ => Err(Error::not_implemented(format!(
            "{} index for '{}'",
            kind.name(),
            attribute.name()
        ))),
    }
}

pub enum IndexerType {
    Equality(EqualityIndexer),
}

impl Indexer for IndexerType {
    fn kind(&self) -> IndexKind {
        match self {
            IndexerType::Equality(indexer) => indexer.kind(),
        }
    }

    fn attribute(&self) -> &AttributeType {
        match self {
            IndexerType::Equality(indexer) => indexer.attribute(),
        }
    }

    fn comparator(&self) -> &dyn KeyComparator {
        match self {
            IndexerType::Equality(indexer) => indexer.comparator(),
        }
    }

    fn generate_keys(&self, entry: &dyn IndexableEntry) -> IndexKeys {
        match self {
            IndexerType::Equality(indexer) => indexer.generate_keys(entry),
        }
    }

    fn diff_keys(
        &self,
        old: Option<&dyn IndexableEntry>,
        new: Option<&dyn IndexableEntry>,
    ) -> KeyDelta {
        match self {
            IndexerType::Equality(indexer) => indexer.diff_keys(old, new),
        }
    }

    fn modify_keys(
        &self,
        old: &dyn IndexableEntry,
        new: &dyn IndexableEntry,
        mods: &[Modification],
    ) -> KeyDelta {
        match self {
            IndexerType::Equality(indexer) => indexer.modify_keys(old, new, mods),
        }
    }
}
