use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot not found: {id}")]
    NotFound { id: String },

    #[error("invalid critical-file pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("snapshot metadata for {id} is unreadable: {message}")]
    Metadata { id: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;
