//! Minimal directory entry model consumed by the indexers.

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::matching_rules::MatchingRule;

/// An attribute type as seen by an index: its name and equality matching rule.
#[derive(Clone)]
pub struct AttributeType {
    name: String,
    equality: Arc<dyn MatchingRule>,
}

impl AttributeType {
    /// Creates an attribute type. The name is stored lower-cased.
    pub fn new(name: impl AsRef<str>, equality: Arc<dyn MatchingRule>) -> AttributeType {
        AttributeType {
            name: name.as_ref().to_ascii_lowercase(),
            equality,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn equality_rule(&self) -> &dyn MatchingRule {
        self.equality.as_ref()
    }

    /// Whether an attribute description such as `cn` or `cn;lang-en` refers to
    /// this attribute type.
    pub fn matches_description(&self, description: &str) -> bool {
        let base = description.split(';').next().unwrap_or(description);
        base.eq_ignore_ascii_case(&self.name)
    }
}

impl fmt::Debug for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeType")
            .field("name", &self.name)
            .field("equality", &self.equality.name())
            .finish()
    }
}

/// Source of raw attribute values for key generation.
pub trait IndexableEntry {
    /// Returns the raw values of `attribute`, including values held under
    /// attribute options (`cn;lang-en`), or `None` when the entry has none.
    fn attribute_values(&self, attribute: &AttributeType) -> Option<Vec<&[u8]>>;
}

/// In-memory entry: attribute descriptions mapped to their raw values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    attributes: BTreeMap<String, Vec<Vec<u8>>>,
}

impl Entry {
    pub fn new() -> Entry {
        Entry::default()
    }

    /// Builder form of [`Entry::add_value`].
    pub fn with_value(mut self, description: &str, value: impl AsRef<[u8]>) -> Entry {
        self.add_value(description, value);
        self
    }

    /// Adds a value unless an identical one is already present.
    pub fn add_value(&mut self, description: &str, value: impl AsRef<[u8]>) {
        let values = self
            .attributes
            .entry(description.to_ascii_lowercase())
            .or_default();
        let value = value.as_ref();
        if !values.iter().any(|v| v == value) {
            values.push(value.to_vec());
        }
    }

    /// Removes a single value; the attribute disappears with its last value.
    pub fn remove_value(&mut self, description: &str, value: &[u8]) {
        let description = description.to_ascii_lowercase();
        if let Some(values) = self.attributes.get_mut(&description) {
            values.retain(|v| v != value);
            if values.is_empty() {
                self.attributes.remove(&description);
            }
        }
    }

    pub fn remove_attribute(&mut self, description: &str) {
        self.attributes.remove(&description.to_ascii_lowercase());
    }

    pub fn values(&self, description: &str) -> Option<&[Vec<u8>]> {
        self.attributes
            .get(&description.to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    /// Applies one modification in place.
    pub fn apply(&mut self, modification: &Modification) {
        let description = modification.attribute.as_str();
        match modification.kind {
            ModificationType::Add => {
                for value in &modification.values {
                    self.add_value(description, value);
                }
            }
            ModificationType::Delete if modification.values.is_empty() => {
                self.remove_attribute(description);
            }
            ModificationType::Delete => {
                for value in &modification.values {
                    self.remove_value(description, value);
                }
            }
            ModificationType::Replace => {
                self.remove_attribute(description);
                for value in &modification.values {
                    self.add_value(description, value);
                }
            }
        }
    }
}

impl IndexableEntry for Entry {
    fn attribute_values(&self, attribute: &AttributeType) -> Option<Vec<&[u8]>> {
        let values = self
            .attributes
            .iter()
            .filter(|(description, _)| attribute.matches_description(description))
            .flat_map(|(_, values)| values.iter().map(Vec::as_slice))
            .collect::<Vec<_>>();
        (!values.is_empty()).then_some(values)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ModificationType {
    Add,
    /// Deletes the listed values, or the whole attribute when no values are given.
    Delete,
    Replace,
}

/// A single change to one attribute of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    pub kind: ModificationType,
    pub attribute: String,
    pub values: Vec<Vec<u8>>,
}

impl Modification {
    pub fn new<V: AsRef<[u8]>>(
        kind: ModificationType,
        attribute: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Modification {
        Modification {
            kind,
            attribute: attribute.into(),
            values: values.into_iter().map(|v| v.as_ref().to_vec()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching_rules::CaseIgnoreMatch;

    fn cn() -> AttributeType {
        AttributeType::new("CN", Arc::new(CaseIgnoreMatch))
    }

    #[test]
    fn test_attribute_values_with_options() {
        let entry = Entry::new()
            .with_value("cn", "John Smith")
            .with_value("cn;lang-fr", "Jean Smith")
            .with_value("cname", "unrelated");
        let mut values = entry.attribute_values(&cn()).unwrap();
        values.sort();
        assert_eq!(values, vec![&b"Jean Smith"[..], &b"John Smith"[..]]);

        assert!(Entry::new().with_value("sn", "Smith").attribute_values(&cn()).is_none());
    }

    #[test]
    fn test_apply_modifications() {
        let mut entry = Entry::new().with_value("cn", "a").with_value("cn", "b");

        entry.apply(&Modification::new(ModificationType::Add, "cn", ["c", "a"]));
        assert_eq!(entry.values("cn").unwrap().len(), 3);

        entry.apply(&Modification::new(ModificationType::Delete, "cn", ["a"]));
        assert_eq!(entry.values("cn").unwrap(), &[b"b".to_vec(), b"c".to_vec()]);

        entry.apply(&Modification::new(ModificationType::Replace, "CN", ["z"]));
        assert_eq!(entry.values("cn").unwrap(), &[b"z".to_vec()]);

        entry.apply(&Modification::new::<&str>(ModificationType::Delete, "cn", []));
        assert!(entry.values("cn").is_none());
    }
}
