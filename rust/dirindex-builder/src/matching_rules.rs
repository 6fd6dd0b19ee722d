//! Equality matching rules that normalize raw attribute values into index keys.
//!
//! Normalization is owned by the schema layer in a full server; the rules here are
//! the reference set the indexers are exercised with. A rule rejects a value it
//! cannot normalize with a `NormalizationFailure`; indexers skip such values.

use std::sync::Arc;

use dirindex_common::{Result, error::Error};

/// Normalizes attribute values for equality matching.
pub trait MatchingRule: Send + Sync + 'static {
    /// The rule name, e.g. `caseIgnoreMatch`.
    fn name(&self) -> &'static str;

    /// Returns the normalized form of `value`.
    fn normalize(&self, value: &[u8]) -> Result<Vec<u8>>;
}

/// Creates a matching rule by its schema name.
pub fn create_matching_rule(name: &str) -> Result<Arc<dyn MatchingRule>> {
    match name {
        "caseIgnoreMatch" => Ok(Arc::new(CaseIgnoreMatch)),
        "octetStringMatch" => Ok(Arc::new(OctetStringMatch)),
        "integerMatch" => Ok(Arc::new(IntegerMatch)),
        _ => Err(Error::invalid_arg(
            "name",
            format!("Unrecognized matching rule: {name}"),
        )),
    }
}

/// Case-insensitive string matching.
///
/// Requires UTF-8. Leading and trailing whitespace is removed, inner whitespace
/// runs collapse to one space, and the result is lower-cased.
pub struct CaseIgnoreMatch;

impl MatchingRule for CaseIgnoreMatch {
    fn name(&self) -> &'static str {
        "caseIgnoreMatch"
    }

    fn normalize(&self, value: &[u8]) -> Result<Vec<u8>> {
        let text = std::str::from_utf8(value).map_err(|e| {
            Error::normalization_failure(self.name(), format!("value is not UTF-8: {e}"))
        })?;
        let mut normalized = String::with_capacity(text.len());
        for word in text.split_whitespace() {
            if !normalized.is_empty() {
                normalized.push(' ');
            }
            normalized.extend(word.chars().flat_map(char::to_lowercase));
        }
        Ok(normalized.into_bytes())
    }
}

/// Exact byte matching; the value is its own key.
pub struct OctetStringMatch;

impl MatchingRule for OctetStringMatch {
    fn name(&self) -> &'static str {
        "octetStringMatch"
    }

    fn normalize(&self, value: &[u8]) -> Result<Vec<u8>> {
        Ok(value.to_vec())
    }
}

/// Integer matching on the canonical decimal form: optional `-`, no leading
/// zeros, `-0` folds to `0`.
pub struct IntegerMatch;

impl MatchingRule for IntegerMatch {
    fn name(&self) -> &'static str {
        "integerMatch"
    }

    fn normalize(&self, value: &[u8]) -> Result<Vec<u8>> {
        let value = value.trim_ascii();
        let (negative, digits) = match value.split_first() {
            Some((b'-', rest)) => (true, rest),
            Some((b'+', rest)) => (false, rest),
            _ => (false, value),
        };
        if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
            return Err(Error::normalization_failure(
                self.name(),
                format!("'{}' is not an integer", String::from_utf8_lossy(value)),
            ));
        }

        let significant = match digits.iter().position(|&b| b != b'0') {
            Some(start) => &digits[start..],
            None => return Ok(b"0".to_vec()),
        };
        let mut normalized = Vec::with_capacity(significant.len() + 1);
        if negative {
            normalized.push(b'-');
        }
        normalized.extend_from_slice(significant);
        Ok(normalized)
    }
}
