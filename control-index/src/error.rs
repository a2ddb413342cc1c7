//! Error types for control-index

use thiserror::Error;

/// Errors that can occur while extracting, embedding or indexing controls
#[derive(Debug, Error)]
pub enum IndexError {
    /// Source file or storage location does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// XML could not be parsed as well-formed markup
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Rebuild was requested with no records
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Embedding or storage backend failure
    #[error("Backend error during {operation}: {message}")]
    Backend { operation: String, message: String },

    /// Configuration change after the embedding model was loaded
    #[error("Configuration locked: {0}")]
    ConfigurationLocked(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// RocksDB error
    #[error("Storage error: {0}")]
    Storage(#[from] rocksdb::Error),

    /// Serialization error (bincode)
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexError {
    /// Create a not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a malformed input error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    /// Create an empty input error
    pub fn empty_input(msg: impl Into<String>) -> Self {
        Self::EmptyInput(msg.into())
    }

    /// Create a backend error tagged with the failing operation
    pub fn backend(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration locked error
    pub fn configuration_locked(msg: impl Into<String>) -> Self {
        Self::ConfigurationLocked(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Attach the failing operation to a storage-level error
    pub fn during(self, operation: &str) -> Self {
        match self {
            Self::Storage(e) => Self::backend(operation, e),
            Self::Bincode(e) => Self::backend(operation, e),
            Self::Io(e) => Self::backend(operation, e),
            other => other,
        }
    }

    /// True for failures raised by the embedding or storage backend
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            Self::Backend { .. } | Self::Storage(_) | Self::Bincode(_)
        )
    }
}

/// Result type for index operations
pub type Result<T> = std::result::Result<T, IndexError>;
