//! SPDY header blocks
//!
//! A header block is the ordered list of (name, value) pairs appended
//! to SYN_STREAM, SYN_REPLY and HEADERS frames. Names are lowercase
//! and unique; adding a name twice joins the values with NUL (0x00).
//! Entries are kept in ascending name order so that lookups are a
//! binary search and serialization is deterministic.
//!
//! The protocol version only changes the width of the on-wire length
//! prefixes (16 bits for v2, 32 bits for v3); the container itself is
//! version-independent.

use super::fields::{Value, Values};
use super::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
struct NameValue {
    name: String,
    /// Values for this name, NUL-joined.
    value: String,
}

/// Ordered container of header name/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    entries: Vec<NameValue>,
}

impl HeaderBlock {
    pub fn new() -> HeaderBlock {
        HeaderBlock::default()
    }

    /// Index of `name`, or the insertion point keeping ascending order.
    fn search(&self, name: &str) -> std::result::Result<usize, usize> {
        self.entries
            .binary_search_by(|e| e.name.as_str().cmp(name))
    }

    /// Add a header. The name is lowercased; adding an existing name
    /// appends the value after a NUL separator.
    pub fn add(&mut self, name: &str, value: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidHeaderName);
        }
        let name = name.to_ascii_lowercase();
        match self.search(&name) {
            Ok(i) => {
                self.entries[i].value.push('\0');
                self.entries[i].value.push_str(value);
            }
            Err(i) => self.entries.insert(
                i,
                NameValue {
                    name,
                    value: value.to_string(),
                },
            ),
        }
        Ok(())
    }

    /// The first value for `name`, up to the first NUL.
    pub fn get_first(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        let i = self.search(&name).ok()?;
        let value = self.entries[i].value.as_str();
        Some(match value.find('\0') {
            Some(nul) => &value[..nul],
            None => value,
        })
    }

    /// All values for `name`, NUL-split.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        let name = name.to_ascii_lowercase();
        match self.search(&name) {
            Ok(i) => self.entries[i].value.split('\0').collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.search(&name.to_ascii_lowercase()).is_ok()
    }

    /// All names, in ascending order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(name, joined_values)` pairs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.name.as_str(), e.value.as_str()))
    }

    /// Field values for the codec, in stored (ascending) order.
    pub(crate) fn to_values(&self) -> Vec<Vec<Value>> {
        self.entries
            .iter()
            .map(|e| vec![Value::Str(e.name.clone()), Value::Str(e.value.clone())])
            .collect()
    }

    /// Rebuild from decoded wire entries. Entries pass through the
    /// sorted-insert path so lookups stay correct even when the peer
    /// sent the block unsorted; a repeated name merges NUL-style.
    pub(crate) fn from_values(items: Vec<Vec<Value>>, record: &'static str) -> Result<HeaderBlock> {
        let mut block = HeaderBlock::new();
        for item in items {
            let mut values = Values::new(item);
            let name = values.string(record)?;
            let value = values.string(record)?;
            if name.is_empty() {
                return Err(Error::InvalidHeaderName);
            }
            let name = name.to_ascii_lowercase();
            match block.search(&name) {
                Ok(i) => {
                    block.entries[i].value.push('\0');
                    block.entries[i].value.push_str(&value);
                }
                Err(i) => block.entries.insert(i, NameValue { name, value }),
            }
        }
        Ok(block)
    }
}
