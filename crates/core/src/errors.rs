/// Result type alias for varspace operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for varspace operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Listing environments or variables from the storage collaborator failed
    #[error("storage read failed while {operation}: {message}")]
    StorageRead { operation: String, message: String },

    /// Persisting a variable record failed
    #[error("storage write failed for variable '{name}': {message}")]
    StorageWrite { name: String, message: String },

    /// A request-response channel was dropped before the response arrived
    #[error("response channel closed during {operation}")]
    ChannelClosed { operation: String },
}

// Helper methods for creating errors with context
impl Error {
    /// Create a storage read error
    #[must_use]
    pub fn storage_read(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::StorageRead {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a storage write error
    #[must_use]
    pub fn storage_write(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::StorageWrite {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a closed-channel error
    #[must_use]
    pub fn channel_closed(operation: impl Into<String>) -> Self {
        Error::ChannelClosed {
            operation: operation.into(),
        }
    }

    /// Whether the error came from the storage boundary
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::StorageRead { .. } | Error::StorageWrite { .. })
    }
}
