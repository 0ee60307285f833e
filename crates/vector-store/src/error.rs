use crate::types::CollectionId;
use docindex_storage::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorStoreError>;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("No vector index for collection {0}")]
    CollectionNotFound(CollectionId),

    /// Persisted blob or position map unreadable or inconsistent; recover with a rebuild
    #[error("Vector index for collection {collection_id} is corrupted: {reason}")]
    IndexCorrupted {
        collection_id: CollectionId,
        reason: String,
    },

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl VectorStoreError {
    pub fn corrupted(collection_id: CollectionId, reason: impl Into<String>) -> Self {
        Self::IndexCorrupted {
            collection_id,
            reason: reason.into(),
        }
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::EmbeddingError(msg.into())
    }
}

impl From<rusqlite::Error> for VectorStoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Sqlite(err))
    }
}

impl From<reqwest::Error> for VectorStoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::EmbeddingError(err.to_string())
    }
}
