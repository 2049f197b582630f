//! Error types for content deployment.
//!
//! A `DeployError` returned as `Err` from an install or uninstall call is
//! fatal for that call. Errors the engine can live with are recorded in the
//! operation report instead (see [`crate::deploy::recover`]).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Entry not found in package: {0}")]
    EntryNotFound(String),

    #[error("More than one content group targets framework '{0}'")]
    AmbiguousGroups(String),

    #[error("Invalid framework moniker: {0}")]
    InvalidFramework(String),

    #[error("Transform failed for {}: {source}", path.display())]
    Transform {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl DeployError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn transform(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        Self::Transform {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
