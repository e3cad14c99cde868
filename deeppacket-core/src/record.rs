//! Flat, order-preserving key/value records.
//!
//! Every protocol normalizes into the same [`Record`] shape: an ordered list
//! of unique field names mapped to string values. Nested native structures
//! are flattened through [`FieldWriter`], which composes key prefixes of the
//! form `<Group>_<index>_` with 1-based indices.
//!
//! ```
//! use deeppacket_core::record::{FieldWriter, Record};
//!
//! let mut record = Record::new();
//! let mut w = FieldWriter::new(&mut record);
//! w.put("Version", 1);
//! w.each("AVP", [264u32, 296], |avp, code| avp.put("Code", code));
//!
//! assert_eq!(record.get("AVP_2_Code"), Some("296"));
//! ```

use std::fmt::{self, Display, Write as _};

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Letter case used when rendering opaque byte blobs.
///
/// Uppercase is the default for every protocol; each normalizer picks its
/// case once through a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HexCase {
    #[default]
    Upper,
    Lower,
}

/// Render bytes as contiguous hex digits.
pub fn hex(bytes: &[u8], case: HexCase) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        // Writing into a String cannot fail
        let _ = match case {
            HexCase::Upper => write!(out, "{b:02X}"),
            HexCase::Lower => write!(out, "{b:02x}"),
        };
    }
    out
}

/// Ordered flat mapping from field name to field value.
///
/// Keys are unique: inserting an existing key replaces its value and keeps
/// the key at its first position.
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: IndexMap<String, String>,
}

/// Records are equal when they hold the same fields in the same order.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.fields.iter().eq(other.fields.iter())
    }
}

impl Eq for Record {}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Rewrite the value of an existing field in place.
    pub fn update<F>(&mut self, key: &str, f: F)
    where
        F: FnOnce(&str) -> String,
    {
        if let Some(value) = self.fields.get_mut(key) {
            *value = f(value);
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, String);
    type IntoIter = indexmap::map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in &self.fields {
            writeln!(f, "{k}: {v}")?;
        }
        Ok(())
    }
}

/// Writes fields into a [`Record`] under a composed key prefix.
pub struct FieldWriter<'r> {
    record: &'r mut Record,
    prefix: String,
}

impl<'r> FieldWriter<'r> {
    /// Writer with an empty prefix.
    pub fn new(record: &'r mut Record) -> Self {
        Self {
            record,
            prefix: String::new(),
        }
    }

    /// Write a field rendered through `Display`.
    ///
    /// Integers come out as decimal and booleans as `true`/`false`.
    pub fn put(&mut self, name: &str, value: impl Display) {
        let key = format!("{}{}", self.prefix, name);
        self.record.insert(key, value.to_string());
    }

    /// Write a byte blob as hex.
    pub fn put_hex(&mut self, name: &str, bytes: &[u8], case: HexCase) {
        self.put(name, hex(bytes, case));
    }

    /// Child writer for the `index`-th member of a repeated group.
    pub fn group(&mut self, label: &str, index: usize) -> FieldWriter<'_> {
        FieldWriter {
            prefix: format!("{}{}_{}_", self.prefix, label, index),
            record: &mut *self.record,
        }
    }

    /// Child writer with a plain (non-indexed) prefix such as `SDP_`.
    pub fn scope(&mut self, label: &str) -> FieldWriter<'_> {
        FieldWriter {
            prefix: format!("{}{}_", self.prefix, label),
            record: &mut *self.record,
        }
    }

    /// Write every item of a repeated group, numbering from 1 in iteration
    /// order.
    pub fn each<I, F>(&mut self, label: &str, items: I, mut f: F)
    where
        I: IntoIterator,
        F: FnMut(&mut FieldWriter<'_>, I::Item),
    {
        for (i, item) in items.into_iter().enumerate() {
            let mut child = self.group(label, i + 1);
            f(&mut child, item);
        }
    }
}
