// Document model - typed attributes plus a body that may be loaded lazily

mod source;

pub use source::{ContentSource, FileSource, CHUNK_SIZE};

use crate::error::{HanaError, Result};
use crate::util::string_form;
use serde_yaml::Value;
use sha2::{Digest, Sha256, Sha512};
use std::borrow::Cow;
use std::cell::{Cell, OnceCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Reserved attribute name for a document's payload.
pub const CONTENTS: &str = "contents";

/// A document payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contents {
    Text(String),
    Binary(Vec<u8>),
}

impl Contents {
    /// Raw bytes of the payload; text is already UTF-8.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Contents::Text(text) => text.as_bytes(),
            Contents::Binary(bytes) => bytes,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Contents::Text(text) => Some(text),
            Contents::Binary(_) => None,
        }
    }

    /// A payload is binary when it contains a NUL byte. Bytes that do not
    /// decode as UTF-8 are binary as well.
    pub fn is_binary(&self) -> bool {
        match self {
            Contents::Text(text) => text.contains('\0'),
            Contents::Binary(bytes) => bytes.contains(&0) || std::str::from_utf8(bytes).is_err(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl From<String> for Contents {
    fn from(text: String) -> Self {
        Contents::Text(text)
    }
}

impl From<&str> for Contents {
    fn from(text: &str) -> Self {
        Contents::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Contents {
    fn from(bytes: Vec<u8>) -> Self {
        Contents::Binary(bytes)
    }
}

impl From<&[u8]> for Contents {
    fn from(bytes: &[u8]) -> Self {
        Contents::Binary(bytes.to_vec())
    }
}

#[derive(Debug)]
enum Body {
    /// Payload supplied up front (possibly none).
    Ephemeral(Option<Contents>),
    /// Payload pulled from `source` on first access.
    SourceBacked {
        source: Box<dyn ContentSource>,
        contents: OnceCell<Contents>,
    },
}

/// Digest used by [`Document::content_hash`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
}

/// A named entity in a [`DocumentSet`](crate::DocumentSet): open attributes
/// plus a `contents` payload.
#[derive(Debug)]
pub struct Document {
    attributes: BTreeMap<String, Value>,
    body: Body,
    /// Cached binary classification; `None` until computed.
    is_binary: Cell<Option<bool>>,
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl Document {
    /// An ephemeral document with no payload.
    pub fn new() -> Self {
        Document {
            attributes: BTreeMap::new(),
            body: Body::Ephemeral(None),
            is_binary: Cell::new(None),
        }
    }

    /// An ephemeral document with its payload already in memory.
    pub fn with_contents(contents: impl Into<Contents>) -> Self {
        Document {
            body: Body::Ephemeral(Some(contents.into())),
            ..Document::new()
        }
    }

    /// A document whose payload is read from `source` on first access.
    pub fn from_source(source: impl ContentSource + 'static) -> Self {
        Document {
            body: Body::SourceBacked {
                source: Box::new(source),
                contents: OnceCell::new(),
            },
            ..Document::new()
        }
    }

    /// A document backed by a file on disk.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Document::from_source(FileSource::new(path)?))
    }

    /// Builder form of [`Document::set`].
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    // ── Attributes ─────────────────────────────────────────────────

    /// Read an attribute. `contents` yields the text payload, loading it
    /// first if needed; binary payloads are only reachable through
    /// [`Document::contents`].
    pub fn get(&self, key: &str) -> Result<Cow<'_, Value>> {
        if key == CONTENTS {
            return match self.contents()? {
                Contents::Text(text) => Ok(Cow::Owned(Value::String(text.clone()))),
                Contents::Binary(_) => Err(HanaError::ReservedKey(key.to_string())),
            };
        }
        self.attributes
            .get(key)
            .map(Cow::Borrowed)
            .ok_or_else(|| HanaError::KeyNotFound(key.to_string()))
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Write an attribute. Writing `contents` replaces the payload with the
    /// value's text form.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        if key == CONTENTS {
            let text = match value {
                Value::String(text) => text,
                other => string_form(&other),
            };
            self.set_contents(text);
            return None;
        }
        self.attributes.insert(key, value)
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Merge every entry of `mapping` into the attributes. Non-scalar keys
    /// are skipped.
    pub fn merge(&mut self, mapping: &serde_yaml::Mapping) {
        for (key, value) in mapping {
            match key {
                Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                    self.set(string_form(key), value.clone());
                }
                other => log::debug!("Skipping non-scalar attribute key {other:?}"),
            }
        }
    }

    /// Resolve a nested attribute path. Mappings are entered by key and
    /// lists by numeric index. A leading `contents` resolves to the text
    /// payload (loading it if needed) and is absent for binary payloads.
    pub fn lookup(&self, path: &[String]) -> Result<Option<Cow<'_, Value>>> {
        let Some((first, rest)) = path.split_first() else {
            return Ok(None);
        };

        if first == CONTENTS {
            if !rest.is_empty() || !self.has_contents() {
                return Ok(None);
            }
            return Ok(self
                .contents()?
                .as_text()
                .map(|text| Cow::Owned(Value::String(text.to_string()))));
        }

        let mut current = match self.attributes.get(first.as_str()) {
            Some(value) => value,
            None => return Ok(None),
        };
        for key in rest {
            let next = match current {
                Value::Sequence(_) => key.parse::<usize>().ok().and_then(|i| current.get(i)),
                Value::Mapping(_) => current.get(key.as_str()),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return Ok(None),
            }
        }
        Ok(Some(Cow::Borrowed(current)))
    }

    // ── Contents ───────────────────────────────────────────────────

    /// Whether the payload is in memory. Ephemeral documents always are.
    pub fn is_loaded(&self) -> bool {
        match &self.body {
            Body::Ephemeral(_) => true,
            Body::SourceBacked { contents, .. } => contents.get().is_some(),
        }
    }

    /// False only for an ephemeral document created without a payload.
    pub fn has_contents(&self) -> bool {
        !matches!(self.body, Body::Ephemeral(None))
    }

    pub fn source(&self) -> Option<&dyn ContentSource> {
        match &self.body {
            Body::SourceBacked { source, .. } => Some(source.as_ref()),
            Body::Ephemeral(_) => None,
        }
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source().and_then(|source| source.location())
    }

    /// The payload. A source-backed document reads its source exactly once,
    /// on the first call.
    pub fn contents(&self) -> Result<&Contents> {
        match &self.body {
            Body::Ephemeral(Some(contents)) => Ok(contents),
            Body::Ephemeral(None) => Err(HanaError::KeyNotFound(CONTENTS.to_string())),
            Body::SourceBacked { source: backing, contents } => {
                if let Some(loaded) = contents.get() {
                    return Ok(loaded);
                }
                let loaded = source::load(backing.as_ref())?;
                log::debug!(
                    "Loaded {backing:?} ({}, {} bytes)",
                    if loaded.is_binary() { "binary" } else { "text" },
                    loaded.len()
                );
                // A completed load overrides any earlier sniff.
                self.is_binary.set(Some(loaded.is_binary()));
                Ok(contents.get_or_init(|| loaded))
            }
        }
    }

    /// Replace the payload. Invalidates the cached binary classification.
    pub fn set_contents(&mut self, new: impl Into<Contents>) {
        let new = new.into();
        match &mut self.body {
            Body::Ephemeral(slot) => *slot = Some(new),
            Body::SourceBacked { contents, .. } => *contents = OnceCell::from(new),
        }
        self.is_binary.set(None);
    }

    /// Binary classification of the payload, cached until the payload is
    /// replaced. An unloaded source is sniffed without loading it.
    pub fn is_binary(&self) -> Result<bool> {
        if let Some(cached) = self.is_binary.get() {
            return Ok(cached);
        }

        let binary = match &self.body {
            Body::Ephemeral(contents) => Document::is_binary_of(contents.as_ref()),
            Body::SourceBacked { source: backing, contents } => match contents.get() {
                Some(loaded) => Document::is_binary_of(Some(loaded)),
                None => source::sniff_binary(backing.as_ref())?,
            },
        };
        self.is_binary.set(Some(binary));
        Ok(binary)
    }

    /// Classify a candidate payload. No payload at all counts as binary so
    /// unknown content is never decoded as text.
    pub fn is_binary_of(payload: Option<&Contents>) -> bool {
        payload.map_or(true, Contents::is_binary)
    }

    /// Hex digest of the loaded payload bytes.
    pub fn content_hash(&self, algorithm: HashAlgorithm) -> Result<String> {
        let bytes = self.contents()?.as_bytes();
        Ok(match algorithm {
            HashAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
            HashAlgorithm::Sha512 => hex::encode(Sha512::digest(bytes)),
        })
    }
}
