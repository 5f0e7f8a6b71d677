//! Errors raised by the persistence side

use std::path::PathBuf;

use topodelta_core::ProjectId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed document {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
    /// A delta or snapshot that is not newer than what the store holds:
    /// a duplicate or out-of-order application.
    #[error("sequence {got} for project {project_id} is behind persisted sequence {persisted}")]
    StaleSequence {
        project_id: ProjectId,
        got: u64,
        persisted: u64,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> StoreError {
        let path = path.into();
        move |source| StoreError::Io { path, source }
    }
}
