use crate::error::{HanaError, Result};
use crate::fileset::Filter;
use crate::pipeline::{BuildContext, Stage};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Writes every document in its view below a deploy directory, payload
/// bytes verbatim.
#[derive(Debug, Clone)]
pub struct FileWriter {
    deploy: PathBuf,
    clean: bool,
}

impl FileWriter {
    /// Fails with `DeployDirectory` when `deploy` exists but is not a
    /// directory. A missing directory is created at write time.
    pub fn new(deploy: impl Into<PathBuf>, clean: bool) -> Result<Self> {
        let deploy = deploy.into();
        if deploy.exists() && !deploy.is_dir() {
            return Err(HanaError::DeployDirectory(deploy));
        }
        Ok(FileWriter { deploy, clean })
    }

    pub fn deploy(&self) -> &Path {
        &self.deploy
    }

    /// Empty the deploy directory, keeping the directory itself.
    fn clean_output(&self) -> Result<()> {
        if !self.deploy.is_dir() {
            return Ok(());
        }
        log::info!("Cleaning {}", self.deploy.display());
        for entry in fs::read_dir(&self.deploy)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Resolve a document path below the deploy root. Absolute paths and
    /// `..` segments are rejected.
    fn target(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let mut normal = 0;
        for component in relative.components() {
            match component {
                Component::Normal(_) => normal += 1,
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(HanaError::InvalidPath(path.to_string()));
                }
            }
        }
        if normal == 0 {
            return Err(HanaError::InvalidPath(path.to_string()));
        }
        Ok(self.deploy.join(relative))
    }
}

impl Stage for FileWriter {
    fn name(&self) -> &str {
        "file_writer"
    }

    fn run(&self, files: &mut Filter<'_>, _ctx: &mut BuildContext) -> Result<()> {
        if self.clean {
            self.clean_output()?;
        }
        fs::create_dir_all(&self.deploy)?;

        let mut written = 0;
        for (path, doc) in files.iter()? {
            let target = self.target(path)?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let bytes: &[u8] = if doc.has_contents() {
                doc.contents()?.as_bytes()
            } else {
                &[]
            };
            log::debug!(
                "Writing {} ({})",
                target.display(),
                if doc.is_binary()? { "binary" } else { "text" }
            );
            fs::write(&target, bytes)?;
            written += 1;
        }

        log::info!("Wrote {written} file(s) to {}", self.deploy.display());
        Ok(())
    }
}
