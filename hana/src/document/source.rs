// Backing byte sources for lazily loaded documents

use super::Contents;
use crate::error::{HanaError, Result};
use std::fmt;
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};

/// Size of the chunks read while scanning a source for NUL bytes.
pub const CHUNK_SIZE: usize = 1024;

/// Something a document can pull its raw bytes from.
///
/// Every call to `open` is one underlying read of the source.
pub trait ContentSource: fmt::Debug {
    fn open(&self) -> io::Result<Box<dyn Read + '_>>;

    /// Filesystem location, if the source has one.
    fn location(&self) -> Option<&Path> {
        None
    }
}

/// A file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(HanaError::InvalidDocument(
                "source-backed document requires a path".into(),
            ));
        }
        Ok(FileSource { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ContentSource for FileSource {
    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(File::open(&self.path)?))
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Scan a source for a NUL byte without keeping its bytes.
/// Stops at the first NUL found or at end of stream.
pub(crate) fn sniff_binary(source: &dyn ContentSource) -> Result<bool> {
    let mut reader = source.open()?;
    let mut chunk = [0u8; CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => return Ok(false),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if chunk[..n].contains(&0) {
            return Ok(true);
        }
    }
}

/// Read a whole source and classify it. A NUL byte anywhere makes the payload
/// binary; otherwise it is decoded as UTF-8, falling back to binary when the
/// bytes are not valid UTF-8.
pub(crate) fn load(source: &dyn ContentSource) -> Result<Contents> {
    let mut reader = source.open()?;
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut bytes = Vec::new();
    let mut saw_nul = false;

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if !saw_nul && chunk[..n].contains(&0) {
            saw_nul = true;
        }
        bytes.extend_from_slice(&chunk[..n]);
    }

    if saw_nul {
        return Ok(Contents::Binary(bytes));
    }

    match String::from_utf8(bytes) {
        Ok(text) => Ok(Contents::Text(text)),
        Err(e) => {
            log::debug!("{source:?} is not valid UTF-8, treating as binary: {e}");
            Ok(Contents::Binary(e.into_bytes()))
        }
    }
}
