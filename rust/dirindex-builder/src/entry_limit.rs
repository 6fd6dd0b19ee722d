use dirindex_entry_id_set::EntryIdSet;

use crate::config::IndexConfig;

/// Applies the entry limit to a freshly combined set.
///
/// A defined set larger than `entry_limit` becomes undefined: with its size when
/// the index maintains counts, with an unknown count otherwise. Returns the set to
/// store and whether the limit was exceeded. Undefined input passes through.
pub fn enforce_entry_limit(set: EntryIdSet, config: &IndexConfig) -> (EntryIdSet, bool) {
    if !set.is_defined() || set.size() <= config.entry_limit as u64 {
        return (set, false);
    }
    let overflowed = if config.maintain_count {
        EntryIdSet::undefined(set.size())
    } else {
        EntryIdSet::undefined_unknown()
    };
    (overflowed, true)
}
