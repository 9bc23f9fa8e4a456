//! Error types for MediaScan

/// Result type alias using MediaScan's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for MediaScan operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input: unknown preprocessing method, mismatched hash lengths,
    /// unregistered model id
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or unusable configuration, including model artifacts that
    /// cannot be found at load time
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A loaded model failed while running inference
    #[error("inference error: {0}")]
    Inference(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Timeout errors
    #[error("operation timed out")]
    Timeout,

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_inference(&self) -> bool {
        matches!(self, Self::Inference(_))
    }
}
