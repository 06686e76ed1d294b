//! The key/value block of a message.
//!
//! Keys are canonicalized on every insert and lookup the way mail and HTTP
//! headers are: `send-config`, `Send-Config` and `SEND-CONFIG` all name the
//! field `Send-Config`. Values keep their insertion order within a key, and
//! keys keep the order in which they were first added.

use crate::error::{ProtocolError, ProtocolResult};

/// Returns the canonical form of a field key.
///
/// The first letter and every letter following a hyphen are upper-cased, all
/// other letters lower-cased. A key containing a space or any byte that is not
/// valid in a header token is returned unchanged.
///
/// ```rust
/// use aptmethod_protocol::canonical_key;
///
/// assert_eq!(canonical_key("send-config"), "Send-Config");
/// assert_eq!(canonical_key("URI"), "Uri");
/// ```
pub fn canonical_key(key: &str) -> String {
    if !key.bytes().all(is_token_byte) {
        return key.to_string();
    }

    let mut canonical = String::with_capacity(key.len());
    let mut upper = true;
    for c in key.chars() {
        if upper {
            canonical.push(c.to_ascii_uppercase());
        } else {
            canonical.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    canonical
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// Ordered multimap of canonical field keys to values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    entries: Vec<(String, Vec<String>)>,
}

impl Fields {
    /// Creates an empty field block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value to the values already stored under `key`.
    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        let key = canonical_key(key);
        match self.position(&key) {
            Some(index) => self.entries[index].1.push(value.into()),
            None => self.entries.push((key, vec![value.into()])),
        }
    }

    /// Replaces every value stored under `key` with `value`.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = canonical_key(key);
        match self.position(&key) {
            Some(index) => self.entries[index].1 = vec![value.into()],
            None => self.entries.push((key, vec![value.into()])),
        }
    }

    /// Returns the first value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values(key).first().map(String::as_str)
    }

    /// Returns every value stored under `key`, in insertion order.
    pub fn values(&self, key: &str) -> &[String] {
        let key = canonical_key(key);
        self.position(&key)
            .map(|index| self.entries[index].1.as_slice())
            .unwrap_or_default()
    }

    /// Returns true if `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.position(&canonical_key(key)).is_some()
    }

    /// Removes `key` and returns its values.
    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        let key = canonical_key(key);
        self.position(&key)
            .map(|index| self.entries.remove(index).1)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no key is present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates keys and their values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    /// Appends the wire form of every field to `buffer`.
    ///
    /// Multiple values are joined with a comma. The terminating blank line is
    /// not written. Fails with [`ProtocolError::FieldsEmpty`] when there is
    /// nothing to write.
    pub fn encode_into(&self, buffer: &mut String) -> ProtocolResult<()> {
        if self.is_empty() {
            return Err(ProtocolError::FieldsEmpty);
        }
        for (key, values) in self.iter() {
            if has_line_break(key) || values.iter().any(|value| has_line_break(value)) {
                return Err(ProtocolError::InvalidFieldValue { key: key.to_string() });
            }
            buffer.push_str(key);
            buffer.push_str(": ");
            buffer.push_str(&values.join(","));
            buffer.push('\n');
        }
        Ok(())
    }

    /// Parses a field block.
    ///
    /// Empty lines are skipped. Values are split on commas and trimmed.
    /// Continuation lines are not supported: a line without a colon is an
    /// error.
    pub fn parse(text: &str) -> ProtocolResult<Self> {
        let mut fields = Fields::new();
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            let Some((key, values)) = line.split_once(':') else {
                return Err(ProtocolError::invalid_field_entry(line));
            };
            let key = key.trim();
            for value in values.split(',') {
                fields.add(key, value.trim());
            }
        }
        Ok(fields)
    }

    fn position(&self, canonical: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key == canonical)
    }
}

impl<K, V> FromIterator<(K, V)> for Fields
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        fields.extend(iter);
        fields
    }
}

impl<K, V> Extend<(K, V)> for Fields
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.add(key.as_ref(), value);
        }
    }
}

pub(crate) fn has_line_break(text: &str) -> bool {
    text.contains(['\r', '\n'])
}
