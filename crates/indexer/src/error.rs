use docindex_chunker::ChunkerError;
use docindex_storage::StorageError;
use docindex_vector_store::{CollectionId, DocumentId, VectorStoreError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Document {document_id} not found in collection {collection_id}")]
    DocumentNotFound {
        collection_id: CollectionId,
        document_id: DocumentId,
    },

    #[error("A collection named '{0}' already exists")]
    DuplicateName(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chunker error: {0}")]
    ChunkerError(#[from] ChunkerError),

    #[error(transparent)]
    VectorStoreError(#[from] VectorStoreError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Join(String),
}

/// Stable failure categories reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    DuplicateName,
    DimensionMismatch,
    UnsupportedFormat,
    IndexCorrupted,
    StorageFailure,
    InvalidInput,
    EmbeddingFailure,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::DuplicateName => "duplicate_name",
            Self::DimensionMismatch => "dimension_mismatch",
            Self::UnsupportedFormat => "unsupported_format",
            Self::IndexCorrupted => "index_corrupted",
            Self::StorageFailure => "storage_failure",
            Self::InvalidInput => "invalid_input",
            Self::EmbeddingFailure => "embedding_failure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IndexerError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CollectionNotFound(_) | Self::DocumentNotFound { .. } => ErrorKind::NotFound,
            Self::DuplicateName(_) => ErrorKind::DuplicateName,
            Self::InvalidInput(_) | Self::Config(_) => ErrorKind::InvalidInput,
            Self::ChunkerError(err) => match err {
                ChunkerError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
                ChunkerError::IoError(_) => ErrorKind::StorageFailure,
                ChunkerError::InvalidConfig(_)
                | ChunkerError::Extraction { .. }
                | ChunkerError::EmptyContent => ErrorKind::InvalidInput,
            },
            Self::VectorStoreError(err) => match err {
                VectorStoreError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
                VectorStoreError::CollectionNotFound(_) => ErrorKind::NotFound,
                VectorStoreError::IndexCorrupted { .. } | VectorStoreError::SerializationError(_) => {
                    ErrorKind::IndexCorrupted
                }
                VectorStoreError::EmbeddingError(_) => ErrorKind::EmbeddingFailure,
                VectorStoreError::Storage(_) => ErrorKind::StorageFailure,
            },
            Self::StorageError(_) | Self::IoError(_) | Self::Join(_) => ErrorKind::StorageFailure,
        }
    }
}

impl From<rusqlite::Error> for IndexerError {
    fn from(err: rusqlite::Error) -> Self {
        Self::StorageError(StorageError::Sqlite(err))
    }
}

impl From<tokio::task::JoinError> for IndexerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Join(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_the_taxonomy() {
        assert_eq!(
            IndexerError::DuplicateName("docs".into()).kind(),
            ErrorKind::DuplicateName
        );
        assert_eq!(
            IndexerError::from(VectorStoreError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
            .kind(),
            ErrorKind::DimensionMismatch
        );
        assert_eq!(
            IndexerError::from(VectorStoreError::corrupted(CollectionId(1), "bad")).kind(),
            ErrorKind::IndexCorrupted
        );
        assert_eq!(
            IndexerError::from(ChunkerError::unsupported_format(".png")).kind(),
            ErrorKind::UnsupportedFormat
        );
        assert_eq!(
            IndexerError::from(StorageError::PoolClosed).kind(),
            ErrorKind::StorageFailure
        );
        assert_eq!(ErrorKind::NotFound.as_str(), "not_found");
    }
}
