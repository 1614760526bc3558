use crate::document::Document;
use crate::error::{HanaError, Result};
use crate::fileset::Filter;
use crate::pipeline::{BuildContext, Stage};
use crate::query::PatternSet;
use std::path::{Component, Path, PathBuf};

/// Adds every file below a source directory to the set as a lazily loaded
/// document keyed by its `/`-separated relative path.
#[derive(Debug, Clone)]
pub struct FileLoader {
    source: PathBuf,
    ignore: Option<PatternSet>,
    source_file_keyword: Option<String>,
}

impl FileLoader {
    /// Fails with `SourceDirectory` when `source` is not a directory.
    pub fn new<I, S>(
        source: impl Into<PathBuf>,
        ignore: I,
        source_file_keyword: Option<String>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let source = source.into();
        if !source.is_dir() {
            return Err(HanaError::SourceDirectory(source));
        }
        Ok(FileLoader {
            source,
            ignore: PatternSet::compile(ignore)?,
            source_file_keyword,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Files below the source root, sorted, ignore patterns applied.
    pub fn scan(&self) -> Result<Vec<(String, PathBuf)>> {
        let pattern = format!(
            "{}/**/*",
            glob::Pattern::escape(&self.source.to_string_lossy())
        );
        let entries = glob::glob(&pattern).map_err(|e| HanaError::pattern(&pattern, e))?;

        let mut found = Vec::new();
        for entry in entries {
            let path = entry.map_err(glob::GlobError::into_error)?;
            if !path.is_file() {
                continue;
            }
            let relative = relative_key(&self.source, &path)?;
            if let Some(ignore) = &self.ignore {
                if ignore.matches(&relative) {
                    log::debug!("Skipping ignored file {relative}");
                    continue;
                }
            }
            found.push((relative, path));
        }
        found.sort();
        Ok(found)
    }
}

impl Stage for FileLoader {
    fn name(&self) -> &str {
        "file_loader"
    }

    fn run(&self, files: &mut Filter<'_>, ctx: &mut BuildContext) -> Result<()> {
        ctx.source.get_or_insert_with(|| self.source.clone());

        let found = self.scan()?;
        log::info!("Loading {} file(s) from {}", found.len(), self.source.display());

        for (relative, path) in found {
            let mut doc = Document::from_file(&path)?;
            if let Some(keyword) = &self.source_file_keyword {
                doc.set(keyword.as_str(), path.to_string_lossy().into_owned());
            }
            log::debug!("Loaded {relative}");
            files.insert_new(relative, doc)?;
        }
        Ok(())
    }
}

fn relative_key(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| HanaError::InvalidPath(path.display().to_string()))?;
    let parts: Vec<_> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect();
    Ok(parts.join("/"))
}
