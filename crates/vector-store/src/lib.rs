//! # DocIndex Vector Store
//!
//! Per-collection similarity index persisted next to the documents it points at.
//!
//! ## Features
//!
//! - **Exact L2 search** over a flat, insertion-ordered vector array
//! - **Explicit position map** from index positions to document ids, persisted with the blob
//! - **Transactional writes**: index updates commit or roll back with the document rows
//! - **Snapshot reads**: concurrent searches share immutable decoded snapshots
//! - **Pluggable embeddings** via the [`Embedder`] trait (hash stub or HTTP endpoint)
//!
//! ## Architecture
//!
//! ```text
//! vector_indices row (per collection)
//!     │
//!     ├──> index_blob      bincode { schema_version, dimension, data[f32] }
//!     ├──> position_map    JSON [document_id; n]
//!     └──> version         bumped on every write, keys the snapshot cache
//!
//! search(query, k)
//!     └─> FlatIndex::search → positions → position_map → (document_id, distance)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use docindex_storage::{StorageConfig, StoragePool};
//! use docindex_vector_store::{CollectionId, VectorIndexStore, VectorStoreError};
//!
//! let pool = StoragePool::init(StorageConfig::new("docindex.db"))?;
//! let store = VectorIndexStore::new(384);
//! let hits = pool.with_read(|tx| store.search(tx, CollectionId(1), &vec![0.0; 384], 5))?;
//! for hit in hits {
//!     println!("{}: {:.3}", hit.document_id, hit.similarity());
//! }
//! # Ok::<(), VectorStoreError>(())
//! ```

mod embeddings;
mod error;
mod flat_index;
mod store;
mod types;

pub use embeddings::{
    ensure_dimension, Embedder, HttpEmbedder, StubEmbedder, DEFAULT_DIMENSION, DEFAULT_MODEL,
};
pub use error::{Result, VectorStoreError};
pub use flat_index::{embedding_from_bytes, embedding_to_bytes, FlatIndex, BLOB_SCHEMA_VERSION};
pub use store::VectorIndexStore;
pub use types::{CollectionId, DocumentId, Neighbor, VectorIndexState};
