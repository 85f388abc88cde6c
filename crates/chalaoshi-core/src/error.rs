use std::path::PathBuf;

use thiserror::Error;

/// Failures of the metadata store write path.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// `mark_extracted` was given a name outside the archive naming scheme
    #[error("Not an archive filename: {0}")]
    NotAnArchiveName(String),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
