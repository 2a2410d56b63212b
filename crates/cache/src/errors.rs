use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("malformed store file {}: {source}", .path.display())]
    MalformedStoreFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("storage is not an object; item operations need a keyed store")]
    NotAnObject,
    #[error("no tokio runtime available to schedule background writes")]
    NoRuntime,
}

impl CacheError {
    pub fn missing(what: &str, op: &str) -> Self {
        Self::InvalidArgument(format!("missing {} in \"{}\"", what, op))
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
