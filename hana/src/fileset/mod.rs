// Document set - the authoritative path -> document store for one build

mod filter;

pub use filter::Filter;

use crate::document::Document;
use crate::error::{HanaError, Result};
use hashlink::LinkedHashMap;

/// Documents keyed by their output path, in insertion order.
///
/// A path names at most one document. Views over the set ([`Filter`]) never
/// copy documents; they borrow the set and recompute their membership each
/// time they are consumed.
#[derive(Debug, Default)]
pub struct DocumentSet {
    entries: LinkedHashMap<String, Document>,
}

impl DocumentSet {
    pub fn new() -> Self {
        DocumentSet::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Result<&Document> {
        self.entries.get(path).ok_or_else(|| not_found(path))
    }

    pub fn get_mut(&mut self, path: &str) -> Result<&mut Document> {
        self.entries.get_mut(path).ok_or_else(|| not_found(path))
    }

    /// Insert or overwrite. An overwritten path keeps its position.
    pub fn add(&mut self, path: impl Into<String>, doc: Document) -> Option<Document> {
        self.entries.replace(path.into(), doc)
    }

    /// Insert a document under a path that must not exist yet.
    pub fn insert_new(&mut self, path: impl Into<String>, doc: Document) -> Result<()> {
        let path = path.into();
        if self.entries.contains_key(&path) {
            return Err(HanaError::FileExists { path });
        }
        self.entries.replace(path, doc);
        Ok(())
    }

    pub fn remove(&mut self, path: &str) -> Result<Document> {
        self.entries.remove(path).ok_or_else(|| not_found(path))
    }

    /// Move a document to a new path. Fails without touching the set when
    /// `old` is absent; an existing document at `new` is replaced.
    pub fn rename(&mut self, old: &str, new: impl Into<String>) -> Result<()> {
        let new = new.into();
        if !self.entries.contains_key(old) {
            return Err(not_found(old));
        }
        if old == new {
            return Ok(());
        }

        let doc = self.entries.remove(old).ok_or_else(|| not_found(old))?;
        if self.entries.replace(new.clone(), doc).is_some() {
            log::debug!("Rename {old} -> {new} replaced an existing document");
        }
        Ok(())
    }

    /// All entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Document)> {
        self.entries.iter().map(|(path, doc)| (path.as_str(), doc))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Document)> {
        self.entries.iter_mut().map(|(path, doc)| (path.as_str(), doc))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// A fresh, unrestricted view over this set.
    pub fn query(&mut self) -> Filter<'_> {
        Filter::new(self)
    }

    /// Shorthand for `query().patterns(patterns)`.
    pub fn filter<I, S>(&mut self, patterns: I) -> Filter<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query().patterns(patterns)
    }
}

impl<K: Into<String>> FromIterator<(K, Document)> for DocumentSet {
    fn from_iter<T: IntoIterator<Item = (K, Document)>>(iter: T) -> Self {
        let mut set = DocumentSet::new();
        for (path, doc) in iter {
            set.add(path, doc);
        }
        set
    }
}

fn not_found(path: &str) -> HanaError {
    HanaError::NotFound {
        path: path.to_string(),
    }
}
