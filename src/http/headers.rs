//! Request and response header map
//!
//! A multimap keyed by lowercased header name. Names are kept in
//! ascending order so lookups are a binary search, the same discipline
//! the wire-side header block uses; the values under one name keep
//! their insertion order, which is what matters for headers like
//! `set-cookie`. Handlers see each (name, value) pair individually
//! through [`Headers::iter`].

/// One header name and every value inserted under it.
#[derive(Debug, Clone)]
struct Entry {
    name: String,
    values: Vec<String>,
}

/// HTTP header multimap with case-insensitive names.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    /// Sorted by `name`; names are stored lowercased.
    entries: Vec<Entry>,
}

impl Headers {
    pub fn new() -> Headers {
        Headers::default()
    }

    /// Index of `name` (already lowercased), or its insertion point.
    fn position(&self, name: &str) -> std::result::Result<usize, usize> {
        self.entries.binary_search_by(|e| e.name.as_str().cmp(name))
    }

    /// Insert a header. The name is lowercased; inserting an existing
    /// name appends another value rather than replacing.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();
        match self.position(&name) {
            Ok(i) => self.entries[i].values.push(value),
            Err(i) => self.entries.insert(
                i,
                Entry {
                    name,
                    values: vec![value],
                },
            ),
        }
    }

    /// The first value inserted under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        let i = self.position(&name).ok()?;
        self.entries[i].values.first().map(String::as_str)
    }

    /// Every value under `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        let name = name.to_ascii_lowercase();
        match self.position(&name) {
            Ok(i) => self.entries[i].values.iter().map(String::as_str).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// How many values `name` carries.
    pub fn count(&self, name: &str) -> usize {
        let name = name.to_ascii_lowercase();
        match self.position(&name) {
            Ok(i) => self.entries[i].values.len(),
            Err(_) => 0,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(&name.to_ascii_lowercase()).is_ok()
    }

    /// Drop `name` entirely, returning how many values went with it.
    pub fn remove(&mut self, name: &str) -> usize {
        let name = name.to_ascii_lowercase();
        match self.position(&name) {
            Ok(i) => self.entries.remove(i).values.len(),
            Err(_) => 0,
        }
    }

    /// Total number of (name, value) pairs.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|e| e.values.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate over every (name, value) pair: names ascending, values
    /// under one name in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|e| e.values.iter().map(move |v| (e.name.as_str(), v.as_str())))
    }
}
