use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HanaError {
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Key '{0}' is reserved; use the contents accessors")]
    ReservedKey(String),

    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("File {path} already exists")]
    FileExists { path: String },

    #[error("Type mismatch: cannot apply '{op}' to {bound} and {candidate}")]
    TypeMismatch {
        op: &'static str,
        bound: &'static str,
        candidate: &'static str,
    },

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid output path: {0}")]
    InvalidPath(String),

    #[error("Missing source directory")]
    MissingSourceDirectory,

    #[error("Missing output directory")]
    MissingOutputDirectory,

    #[error("Source directory does not exist: {}", .0.display())]
    SourceDirectory(PathBuf),

    #[error("Deploy path is not a directory: {}", .0.display())]
    DeployDirectory(PathBuf),

    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<HanaError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl HanaError {
    /// Unwraps `Stage` wrappers down to the error the stage itself raised.
    pub fn root(&self) -> &HanaError {
        match self {
            HanaError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn pattern(pattern: impl Into<String>, err: impl std::fmt::Display) -> Self {
        HanaError::InvalidPattern {
            pattern: pattern.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HanaError>;
