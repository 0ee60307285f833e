use thiserror::Error;

/// Result type for chunker operations
pub type Result<T> = std::result::Result<T, ChunkerError>;

/// Errors that can occur while extracting or chunking documents
#[derive(Error, Debug)]
pub enum ChunkerError {
    /// File extension has no reader
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Document bytes could not be turned into text
    #[error("Failed to extract {format} text: {message}")]
    Extraction {
        format: &'static str,
        message: String,
    },

    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Empty content
    #[error("Empty content provided")]
    EmptyContent,
}

impl ChunkerError {
    /// Create an unsupported format error
    pub fn unsupported_format(ext: impl Into<String>) -> Self {
        Self::UnsupportedFormat(ext.into())
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an extraction error
    pub fn extraction(format: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Extraction {
            format,
            message: err.to_string(),
        }
    }
}
