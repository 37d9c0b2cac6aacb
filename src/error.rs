//! Error types for the keytree container system.

use thiserror::Error;

/// Tree model and algebra errors
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Cannot resolve path '{path}': segment '{segment}' is not a container")]
    PathResolution { path: String, segment: String },

    #[error("Structural mismatch at '{path}': expected a container on both sides")]
    StructuralMismatch { path: String },

    #[error("Invalid node name: {0:?}")]
    InvalidName(String),

    #[error("Duplicate node name: {0}")]
    DuplicateName(String),

    #[error("Value for '{name}' is outside its bounds")]
    OutOfBounds { name: String },

    #[error("Mapping failed: {0}")]
    Mapping(String),
}

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Tree not found in store: {0}")]
    NotFound(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Stored tree is malformed: {0}")]
    Tree(#[from] TreeError),
}

/// Top-level errors surfaced by the sync loops, configuration and CLI
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Tree error: {0}")]
    TreeError(#[from] TreeError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Sync loop error: {0}")]
    SyncError(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Encoding(err.to_string())
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Encoding(err.to_string())
    }
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}
