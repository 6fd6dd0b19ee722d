//! Key ordering strategies for index keys.
//!
//! A comparator defines the total order of keys within one index. The same
//! comparator governs the on-disk order of the persistent index, the order of
//! records in the intermediate merge streams, and the in-memory order used while
//! merging those streams. All three must agree for a given index.

use std::cmp::Ordering;

/// Total order over index keys.
pub trait KeyComparator: Send + Sync + 'static {
    /// Returns the comparator kind.
    fn kind(&self) -> ComparatorKind;

    /// Returns the human-readable name of this comparator.
    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Creates a boxed clone of this comparator for sharing across components.
    fn clone_boxed(&self) -> Box<dyn KeyComparator>;

    /// Compares two keys. Must be a total order.
    fn compare(&self, left: &[u8], right: &[u8]) -> Ordering;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ComparatorKind {
    /// Unsigned byte-lexicographic order; a proper prefix sorts first.
    ByteOrder,
}

impl ComparatorKind {
    const fn name(&self) -> &'static str {
        match self {
            ComparatorKind::ByteOrder => "byte-order",
        }
    }
}

/// Unsigned byte-lexicographic comparison, matching the order of the persistent
/// store's own keys for equality indexes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteOrderComparator;

impl KeyComparator for ByteOrderComparator {
    fn kind(&self) -> ComparatorKind {
        ComparatorKind::ByteOrder
    }

    fn clone_boxed(&self) -> Box<dyn KeyComparator> {
        Box::new(ByteOrderComparator)
    }

    #[inline]
    fn compare(&self, left: &[u8], right: &[u8]) -> Ordering {
        left.cmp(right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_order() {
        let cmp = ByteOrderComparator;
        assert_eq!(cmp.compare(b"abc", b"abd"), Ordering::Less);
        assert_eq!(cmp.compare(b"ab", b"abc"), Ordering::Less);
        assert_eq!(cmp.compare(b"smith", b"smith"), Ordering::Equal);
        // Bytes compare unsigned
        assert_eq!(cmp.compare(&[0x80], &[0x7f]), Ordering::Greater);
    }

    #[test]
    fn test_kind_and_name() {
        let cmp: Box<dyn KeyComparator> = ByteOrderComparator.clone_boxed();
        assert_eq!(cmp.kind(), ComparatorKind::ByteOrder);
        assert_eq!(cmp.name(), "byte-order");
    }
}
