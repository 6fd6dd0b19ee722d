//! Set of entry identifiers associated with one index key.
//!
//! An `EntryIdSet` is either *defined* (an explicit, sorted, duplicate-free list of
//! entry IDs) or *undefined* (only a cardinality is tracked). Keys whose membership
//! would exceed the configured entry limit are stored undefined: very common values
//! are useless for equality lookups, only their count matters for planning.
//!
//! Canonical encoding (all integers big-endian):
//! - Defined: `len * 8` bytes, one `u64` per ID in ascending order. The empty set
//!   encodes to zero bytes.
//! - Undefined: exactly 8 bytes with the top bit set; the low 63 bits hold the
//!   count. All ones denotes an unknown count (the index does not maintain counts
//!   for overflowed keys).
//!
//! Because an 8-byte value with the top bit set always decodes as undefined,
//! defined sets may only contain IDs up to [`MAX_ENTRY_ID`].

use dirindex_common::{Result, error::Error, verify_encoding};

/// Identifier of a directory entry within its backend.
pub type EntryId = u64;

/// Largest representable entry ID; the top bit is reserved by the encoding.
pub const MAX_ENTRY_ID: EntryId = (1 << 63) - 1;

/// Encoded width of a single entry ID.
pub const ENCODED_ID_SIZE: usize = std::mem::size_of::<u64>();

const UNDEFINED_FLAG: u64 = 1 << 63;

/// Low 63 bits all set: the unknown-count marker of an undefined set.
const UNKNOWN_COUNT: u64 = MAX_ENTRY_ID;

/// Largest exact count an undefined set can carry without colliding with
/// [`UNKNOWN_COUNT`].
const MAX_EXACT_COUNT: u64 = UNKNOWN_COUNT - 1;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Repr {
    Defined(Vec<EntryId>),
    Undefined { count: Option<u64> },
}

/// Sorted, duplicate-free set of entry IDs, or a count-only placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryIdSet {
    repr: Repr,
}

impl EntryIdSet {
    /// Creates an empty defined set.
    pub fn new() -> EntryIdSet {
        EntryIdSet {
            repr: Repr::Defined(Vec::new()),
        }
    }

    /// Creates a defined set from IDs that are already sorted and unique.
    ///
    /// Fails with `InvalidArgument` when the input is unsorted, contains duplicates,
    /// or holds an ID above [`MAX_ENTRY_ID`].
    pub fn from_sorted(ids: Vec<EntryId>) -> Result<EntryIdSet> {
        if !is_strictly_ascending(&ids) {
            return Err(Error::invalid_arg(
                "ids",
                "entry IDs must be sorted ascending and unique",
            ));
        }
        if let Some(&last) = ids.last() {
            verify_entry_id(last)?;
        }
        Ok(EntryIdSet {
            repr: Repr::Defined(ids),
        })
    }

    /// Creates an undefined set carrying an exact count.
    pub fn undefined(count: u64) -> EntryIdSet {
        EntryIdSet {
            repr: Repr::Undefined {
                count: Some(count.min(MAX_EXACT_COUNT)),
            },
        }
    }

    /// Creates an undefined set whose count is not tracked.
    pub fn undefined_unknown() -> EntryIdSet {
        EntryIdSet {
            repr: Repr::Undefined { count: None },
        }
    }

    /// Returns `true` if the set holds an explicit member list.
    #[inline]
    pub fn is_defined(&self) -> bool {
        matches!(self.repr, Repr::Defined(_))
    }

    /// Returns `true` for a defined set with an explicit list or an undefined set
    /// that still tracks its count.
    pub fn has_count(&self) -> bool {
        !matches!(self.repr, Repr::Undefined { count: None })
    }

    /// Returns the member list of a defined set, `None` if undefined.
    pub fn ids(&self) -> Option<&[EntryId]> {
        match &self.repr {
            Repr::Defined(ids) => Some(ids),
            Repr::Undefined { .. } => None,
        }
    }

    /// Consumes the set, returning its member list if defined.
    pub fn into_ids(self) -> Option<Vec<EntryId>> {
        match self.repr {
            Repr::Defined(ids) => Some(ids),
            Repr::Undefined { .. } => None,
        }
    }

    /// Exact cardinality if defined, otherwise the tracked count.
    ///
    /// An undefined set with an unknown count reports [`MAX_ENTRY_ID`].
    pub fn size(&self) -> u64 {
        match &self.repr {
            Repr::Defined(ids) => ids.len() as u64,
            Repr::Undefined { count } => count.unwrap_or(UNKNOWN_COUNT),
        }
    }

    /// Returns `true` only for a defined set with no members.
    pub fn is_empty(&self) -> bool {
        matches!(&self.repr, Repr::Defined(ids) if ids.is_empty())
    }

    /// Membership test. Undefined sets report `false` for every ID.
    pub fn contains(&self, id: EntryId) -> bool {
        match &self.repr {
            Repr::Defined(ids) => ids.binary_search(&id).is_ok(),
            Repr::Undefined { .. } => false,
        }
    }

    /// Iterates the members of a defined set in ascending order; an undefined set
    /// yields nothing.
    pub fn iter(&self) -> impl Iterator<Item = EntryId> + '_ {
        self.ids().unwrap_or_default().iter().copied()
    }

    /// Merges sorted, unique `ids` into the set.
    ///
    /// Already present IDs are ignored. For an undefined set the tracked count is
    /// incremented by `ids.len()`; overlap with the unknown membership cannot be
    /// detected and is not accounted for.
    ///
    /// Fails with `InvalidArgument`, leaving the set unchanged, when an ID is
    /// above [`MAX_ENTRY_ID`].
    pub fn add_all(&mut self, ids: &[EntryId]) -> Result<()> {
        debug_assert!(is_strictly_ascending(ids));
        let Some(&last) = ids.last() else {
            return Ok(());
        };
        verify_entry_id(last)?;
        match &mut self.repr {
            Repr::Defined(current) => merge_into(current, ids),
            Repr::Undefined { count } => {
                if let Some(count) = count {
                    *count = count.saturating_add(ids.len() as u64).min(MAX_EXACT_COUNT);
                }
            }
        }
        Ok(())
    }

    /// Removes sorted, unique `ids` from the set.
    ///
    /// Absent IDs are ignored. For an undefined set the tracked count is decremented
    /// by `ids.len()`, saturating at zero.
    pub fn delete_all(&mut self, ids: &[EntryId]) {
        debug_assert!(is_strictly_ascending(ids));
        if ids.is_empty() {
            return;
        }
        match &mut self.repr {
            Repr::Defined(current) => {
                let mut next = 0;
                current.retain(|id| {
                    while next < ids.len() && ids[next] < *id {
                        next += 1;
                    }
                    !(next < ids.len() && ids[next] == *id)
                });
            }
            Repr::Undefined { count } => {
                if let Some(count) = count {
                    *count = count.saturating_sub(ids.len() as u64);
                }
            }
        }
    }

    /// Adds a single ID. Returns `true` if a defined set gained a member.
    ///
    /// Fails with `InvalidArgument` when `id` is above [`MAX_ENTRY_ID`].
    pub fn add(&mut self, id: EntryId) -> Result<bool> {
        verify_entry_id(id)?;
        let added = match &mut self.repr {
            Repr::Defined(current) => match current.binary_search(&id) {
                Ok(_) => false,
                Err(pos) => {
                    current.insert(pos, id);
                    true
                }
            },
            Repr::Undefined { count } => {
                if let Some(count) = count {
                    *count = count.saturating_add(1).min(MAX_EXACT_COUNT);
                }
                false
            }
        };
        Ok(added)
    }

    /// Removes a single ID. Returns `true` if a defined set lost a member.
    pub fn remove(&mut self, id: EntryId) -> bool {
        match &mut self.repr {
            Repr::Defined(current) => match current.binary_search(&id) {
                Ok(pos) => {
                    current.remove(pos);
                    true
                }
                Err(_) => false,
            },
            Repr::Undefined { count } => {
                if let Some(count) = count {
                    *count = count.saturating_sub(1);
                }
                false
            }
        }
    }

    /// Fails with `InvalidArgument` when a defined set holds an ID above
    /// [`MAX_ENTRY_ID`], which the canonical encoding cannot represent.
    pub fn verify_ids(&self) -> Result<()> {
        match &self.repr {
            Repr::Defined(ids) => ids.last().map_or(Ok(()), |&last| verify_entry_id(last)),
            Repr::Undefined { .. } => Ok(()),
        }
    }

    /// Size in bytes of the canonical encoding.
    pub fn encoded_size(&self) -> usize {
        match &self.repr {
            Repr::Defined(ids) => ids.len() * ENCODED_ID_SIZE,
            Repr::Undefined { .. } => ENCODED_ID_SIZE,
        }
    }

    /// Writes the canonical encoding into `scratch` (replacing its contents) and
    /// returns the encoded bytes.
    ///
    /// Reusing one scratch buffer across keys avoids a per-key allocation.
    pub fn encode<'a>(&self, scratch: &'a mut Vec<u8>) -> &'a [u8] {
        scratch.clear();
        scratch.reserve(self.encoded_size());
        match &self.repr {
            Repr::Defined(ids) => {
                for id in ids {
                    scratch.extend_from_slice(&id.to_be_bytes());
                }
            }
            Repr::Undefined { count } => {
                let count = count.unwrap_or(UNKNOWN_COUNT);
                scratch.extend_from_slice(&(count | UNDEFINED_FLAG).to_be_bytes());
            }
        }
        scratch.as_slice()
    }

    /// Rebuilds a set from its canonical encoding.
    ///
    /// Fails with `MalformedEncoding` if the length is not a multiple of the ID
    /// width or the IDs are not strictly ascending.
    pub fn decode(bytes: &[u8]) -> Result<EntryIdSet> {
        verify_encoding!(bytes, bytes.len() % ENCODED_ID_SIZE == 0);

        if bytes.len() == ENCODED_ID_SIZE {
            let value = read_u64(bytes);
            if value & UNDEFINED_FLAG != 0 {
                let count = value & !UNDEFINED_FLAG;
                let count = (count != UNKNOWN_COUNT).then_some(count);
                return Ok(EntryIdSet {
                    repr: Repr::Undefined { count },
                });
            }
        }

        let mut ids = Vec::with_capacity(bytes.len() / ENCODED_ID_SIZE);
        for chunk in bytes.chunks_exact(ENCODED_ID_SIZE) {
            let id = read_u64(chunk);
            if id > MAX_ENTRY_ID {
                return Err(Error::malformed_encoding(format!(
                    "entry ID {id:#x} has the reserved top bit set"
                )));
            }
            if ids.last().is_some_and(|&prev| prev >= id) {
                return Err(Error::malformed_encoding(format!(
                    "entry ID {id} out of order at position {}",
                    ids.len()
                )));
            }
            ids.push(id);
        }
        Ok(EntryIdSet {
            repr: Repr::Defined(ids),
        })
    }
}

impl Default for EntryIdSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects IDs in any order, sorting and removing duplicates. IDs above
/// [`MAX_ENTRY_ID`] are kept; [`EntryIdSet::verify_ids`] rejects such a set
/// before it is persisted.
impl FromIterator<EntryId> for EntryIdSet {
    fn from_iter<T: IntoIterator<Item = EntryId>>(iter: T) -> Self {
        let mut ids = iter.into_iter().collect::<Vec<_>>();
        ids.sort_unstable();
        ids.dedup();
        EntryIdSet {
            repr: Repr::Defined(ids),
        }
    }
}

#[inline]
fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; ENCODED_ID_SIZE];
    buf.copy_from_slice(&bytes[..ENCODED_ID_SIZE]);
    u64::from_be_bytes(buf)
}

/// Fails with `InvalidArgument` when `id` cannot be stored in a defined set.
pub fn verify_entry_id(id: EntryId) -> Result<()> {
    if id > MAX_ENTRY_ID {
        return Err(Error::invalid_arg(
            "id",
            format!("entry ID {id} exceeds MAX_ENTRY_ID"),
        ));
    }
    Ok(())
}

fn is_strictly_ascending(ids: &[EntryId]) -> bool {
    ids.windows(2).all(|w| w[0] < w[1])
}

/// Merges sorted-unique `ids` into sorted-unique `current`.
fn merge_into(current: &mut Vec<EntryId>, ids: &[EntryId]) {
    match (current.last(), ids.first()) {
        (None, _) => {
            current.extend_from_slice(ids);
            return;
        }
        (Some(&last), Some(&first)) if first > last => {
            current.extend_from_slice(ids);
            return;
        }
        _ => (),
    }

    let mut merged = Vec::with_capacity(current.len() + ids.len());
    let (mut i, mut j) = (0, 0);
    while i < current.len() && j < ids.len() {
        let (a, b) = (current[i], ids[j]);
        if a < b {
            merged.push(a);
            i += 1;
        } else if b < a {
            merged.push(b);
            j += 1;
        } else {
            merged.push(a);
            i += 1;
            j += 1;
        }
    }
    merged.extend_from_slice(&current[i..]);
    merged.extend_from_slice(&ids[j..]);
    *current = merged;
}
