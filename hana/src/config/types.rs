use crate::error::{HanaError, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// Site configuration parsed from hana.yaml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub source: Option<PathBuf>,
    #[serde(default)]
    pub output: Option<PathBuf>,
    /// Empty the output directory before writing.
    #[serde(default)]
    pub clean: bool,
    /// Gitignore-style patterns the loader skips.
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Attribute that receives each loaded file's source path.
    #[serde(default)]
    pub source_file_keyword: Option<String>,
    /// Global site metadata, available to every stage.
    #[serde(default)]
    pub metadata: Mapping,
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
}

/// One configured plugin stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    pub name: String,
    /// Restrict the stage to matching paths; empty means every document.
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub options: Value,
}

impl SiteConfig {
    /// Check that both directories are named.
    pub fn validate(&self) -> Result<()> {
        if is_blank(self.source.as_deref()) {
            return Err(HanaError::MissingSourceDirectory);
        }
        if is_blank(self.output.as_deref()) {
            return Err(HanaError::MissingOutputDirectory);
        }
        for plugin in &self.plugins {
            if plugin.name.trim().is_empty() {
                return Err(HanaError::Config("plugin entry without a name".into()));
            }
        }
        Ok(())
    }

    /// Resolve relative directories against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for dir in [&mut self.source, &mut self.output].into_iter().flatten() {
            if dir.is_relative() && !dir.as_os_str().is_empty() {
                *dir = base.join(&*dir);
            }
        }
    }
}

fn is_blank(path: Option<&Path>) -> bool {
    path.map_or(true, |p| p.as_os_str().is_empty())
}
