use log::debug;

use crate::{
    comparator::{ByteOrderComparator, KeyComparator},
    entry::{AttributeType, IndexableEntry},
};

use super::{IndexKeys, IndexKind, Indexer};

/// Equality index: one key per distinct normalized value.
pub struct EqualityIndexer {
    attribute: AttributeType,
    comparator: ByteOrderComparator,
}

impl EqualityIndexer {
    pub fn new(attribute: AttributeType) -> EqualityIndexer {
        EqualityIndexer {
            attribute,
            comparator: ByteOrderComparator,
        }
    }
}

impl Indexer for EqualityIndexer {
    fn kind(&self) -> IndexKind {
        IndexKind::Equality
    }

    fn attribute(&self) -> &AttributeType {
        &self.attribute
    }

    fn comparator(&self) -> &dyn KeyComparator {
        &self.comparator
    }

    fn generate_keys(&self, entry: &dyn IndexableEntry) -> IndexKeys {
        let Some(values) = entry.attribute_values(&self.attribute) else {
            return IndexKeys::new();
        };
        let rule = self.attribute.equality_rule();
        let keys = values
            .into_iter()
            .filter_map(|value| match rule.normalize(value) {
                Ok(key) => Some(key),
                Err(e) => {
                    debug!(
                        "{}: skipping value of '{}': {e}",
                        self.name(),
                        self.attribute.name()
                    );
                    None
                }
            })
            .collect();
        IndexKeys::from_unsorted(keys, &self.comparator)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        entry::{Entry, Modification, ModificationType},
        matching_rules::{CaseIgnoreMatch, IntegerMatch},
    };

    fn cn_indexer() -> EqualityIndexer {
        EqualityIndexer::new(AttributeType::new("cn", Arc::new(CaseIgnoreMatch)))
    }

    fn collect(keys: &IndexKeys) -> Vec<&[u8]> {
        keys.iter().collect()
    }

    #[test]
    fn test_generate_keys_normalizes_and_dedups() {
        let entry = Entry::new()
            .with_value("cn", "John  Smith")
            .with_value("cn", "john smith")
            .with_value("cn;lang-en", "Johnny");
        let keys = cn_indexer().generate_keys(&entry);
        assert_eq!(collect(&keys), vec![&b"john smith"[..], &b"johnny"[..]]);
    }

    #[test]
    fn test_generate_keys_skips_failures() {
        let indexer =
            EqualityIndexer::new(AttributeType::new("uidNumber", Arc::new(IntegerMatch)));
        let entry = Entry::new()
            .with_value("uidnumber", "0100")
            .with_value("uidnumber", "not a number");
        assert_eq!(collect(&indexer.generate_keys(&entry)), vec![&b"100"[..]]);
        assert!(indexer.generate_keys(&Entry::new()).is_empty());
    }

    #[test]
    fn test_diff_keys() {
        let indexer = cn_indexer();
        let old = Entry::new().with_value("cn", "a").with_value("cn", "b");
        let new = Entry::new().with_value("cn", "B").with_value("cn", "c");

        let delta = indexer.diff_keys(Some(&old), Some(&new));
        assert_eq!(collect(&delta.add), vec![&b"c"[..]]);
        assert_eq!(collect(&delta.delete), vec![&b"a"[..]]);

        let delta = indexer.diff_keys(Some(&old), None);
        assert!(delta.add.is_empty());
        assert_eq!(collect(&delta.delete), vec![&b"a"[..], &b"b"[..]]);

        let delta = indexer.diff_keys(None, Some(&new));
        assert_eq!(collect(&delta.add), vec![&b"b"[..], &b"c"[..]]);
        assert!(delta.delete.is_empty());

        assert!(indexer.diff_keys(Some(&old), Some(&old)).is_empty());
    }

    #[test]
    fn test_modify_keys_matches_diff() {
        let indexer = cn_indexer();
        let old = Entry::new().with_value("cn", "a").with_value("sn", "x");
        let mods = vec![Modification::new(ModificationType::Replace, "cn", ["z"])];
        let mut new = old.clone();
        for m in &mods {
            new.apply(m);
        }
        assert_eq!(
            indexer.modify_keys(&old, &new, &mods),
            indexer.diff_keys(Some(&old), Some(&new))
        );
    }
}
