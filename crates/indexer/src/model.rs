use chrono::{DateTime, Utc};
use docindex_chunker::{FileFailure, Metadata};
use docindex_vector_store::{CollectionId, DocumentId};
use serde::{Deserialize, Serialize};

/// A named group of documents sharing one vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Live document rows, counted independently of the vector index
    pub document_count: usize,
}

/// A stored text with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub collection_id: CollectionId,
    pub content: String,
    pub metadata: Metadata,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,

    pub created_at: DateTime<Utc>,

    /// `1 / (1 + distance)`; only set on search results
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub similarity: Option<f32>,
}

/// Document content awaiting insertion
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub content: String,
    pub metadata: Metadata,
    pub embedding: Vec<f32>,
}

impl NewDocument {
    pub fn new(content: impl Into<String>, metadata: Metadata, embedding: Vec<f32>) -> Self {
        Self {
            content: content.into(),
            metadata,
            embedding,
        }
    }
}

/// Outcome of an ingestion call
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Documents stored, one per chunk
    pub documents: Vec<Document>,

    pub files_processed: usize,

    /// Files skipped because they could not be read or chunked
    pub files_failed: Vec<FileFailure>,
}

impl IngestReport {
    #[must_use]
    pub fn document_ids(&self) -> Vec<DocumentId> {
        self.documents.iter().map(|doc| doc.id).collect()
    }
}
