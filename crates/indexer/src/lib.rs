//! # DocIndex Indexer
//!
//! Collections, documents and ingestion on top of the vector store.
//!
//! ## Pipeline
//!
//! ```text
//! File / directory / pasted text
//!     │
//!     ├──> Chunker (txt, md, docx, pdf)
//!     │      └─> Text chunks + metadata
//!     │
//!     ├──> Embedder (batched)
//!     │      └─> One vector per chunk
//!     │
//!     └──> DocumentRepository (one transaction per file)
//!            └─> document rows + vector index
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use docindex_indexer::{DocIndexConfig, DocIndexService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), docindex_indexer::IndexerError> {
//!     let service = DocIndexService::open(&DocIndexConfig::load(None)?)?;
//!     let docs = service.create_collection("docs", None).await?;
//!     service
//!         .ingest_directory(docs.id, "./manuals", Default::default(), None, Default::default())
//!         .await?;
//!
//!     for hit in service.search_text(docs.id, "reset the router", 5).await? {
//!         println!("{:.3} {}", hit.similarity.unwrap_or_default(), hit.content);
//!     }
//!     Ok(())
//! }
//! ```

mod collection_repo;
mod config;
mod document_repo;
mod error;
mod model;
mod service;

pub use collection_repo::CollectionRepository;
pub use config::{
    DocIndexConfig, EmbeddingConfig, EmbeddingMode, CONFIG_ENV, DEFAULT_DB_FILE,
    DEFAULT_EMBEDDING_ENDPOINT,
};
pub use document_repo::DocumentRepository;
pub use error::{ErrorKind, IndexerError, Result};
pub use model::{Collection, Document, IngestReport, NewDocument};
pub use service::{DocIndexService, SearchQuery};

pub use docindex_chunker::{ChunkingConfig, ChunkingStrategy, Metadata, ScanOptions};
pub use docindex_vector_store::{CollectionId, DocumentId, Embedder, VectorIndexState};
