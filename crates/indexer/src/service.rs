use crate::collection_repo::CollectionRepository;
use crate::config::DocIndexConfig;
use crate::document_repo::DocumentRepository;
use crate::error::{IndexerError, Result};
use crate::model::{Collection, Document, IngestReport, NewDocument};
use docindex_chunker::{Chunker, ChunkerError, ChunkingConfig, Metadata, ScanOptions, TextChunk};
use docindex_storage::StoragePool;
use docindex_vector_store::{
    ensure_dimension, CollectionId, DocumentId, Embedder, VectorIndexState, VectorIndexStore,
    VectorStoreError,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Texts sent to the embedder per request
const EMBED_BATCH_SIZE: usize = 64;

/// Query for [`DocIndexService::search_similar`]
#[derive(Debug, Clone, PartialEq)]
pub enum SearchQuery {
    /// Embedded before searching
    Text(String),
    Vector(Vec<f32>),
}

/// Async entry point over the repositories: collections, documents, ingestion and search.
///
/// Repository calls run on the blocking pool; embedding runs on the async runtime.
pub struct DocIndexService {
    pool: StoragePool,
    collections: Arc<CollectionRepository>,
    documents: Arc<DocumentRepository>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
}

impl DocIndexService {
    /// Open the database and embedder described by `config`
    pub fn open(config: &DocIndexConfig) -> Result<Self> {
        config.validate()?;
        let embedder = config.build_embedder()?;
        let pool = StoragePool::init(config.storage_config())?;
        Self::new(pool, embedder, config.chunking.clone())
    }

    pub fn new(
        pool: StoragePool,
        embedder: Arc<dyn Embedder>,
        chunking: ChunkingConfig,
    ) -> Result<Self> {
        chunking
            .validate()
            .map_err(|err| IndexerError::Config(format!("chunking: {err}")))?;

        let store = Arc::new(VectorIndexStore::new(embedder.dimension()));
        log::debug!(
            "DocIndex service ready (model {}, dim {})",
            embedder.model_id(),
            embedder.dimension()
        );
        Ok(Self {
            collections: Arc::new(CollectionRepository::new(pool.clone(), Arc::clone(&store))),
            documents: Arc::new(DocumentRepository::new(pool.clone(), store)),
            pool,
            embedder,
            chunking,
        })
    }

    #[must_use]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    // ---- collections ----

    pub async fn create_collection(&self, name: &str, description: Option<&str>) -> Result<Collection> {
        let name = name.to_string();
        let description = description.map(str::to_string);
        self.with_collections(move |repo| repo.create(&name, description.as_deref()))
            .await
    }

    pub async fn list_collections(&self) -> Result<Vec<Collection>> {
        self.with_collections(CollectionRepository::list).await
    }

    pub async fn get_collection(&self, id: CollectionId) -> Result<Collection> {
        self.with_collections(move |repo| repo.get(id)).await
    }

    /// Collection by numeric id or by name
    pub async fn resolve_collection(&self, id_or_name: &str) -> Result<Collection> {
        let key = id_or_name.to_string();
        self.with_collections(move |repo| repo.resolve(&key)).await
    }

    pub async fn update_description(
        &self,
        id: CollectionId,
        description: Option<&str>,
    ) -> Result<Collection> {
        let description = description.map(str::to_string);
        self.with_collections(move |repo| repo.update_description(id, description.as_deref()))
            .await
    }

    pub async fn delete_collection(&self, id: CollectionId) -> Result<()> {
        self.with_collections(move |repo| repo.delete(id)).await
    }

    // ---- documents ----

    /// Store one document, embedding `content` unless an embedding is supplied
    pub async fn add_document(
        &self,
        collection_id: CollectionId,
        content: &str,
        metadata: Metadata,
        embedding: Option<Vec<f32>>,
    ) -> Result<Document> {
        if content.trim().is_empty() {
            return Err(IndexerError::invalid_input("document content is empty"));
        }
        let embedding = match embedding {
            Some(embedding) => embedding,
            None => self.embed_one(content).await?,
        };
        let content = content.to_string();
        self.with_documents(move |repo| repo.create(collection_id, &content, metadata, embedding))
            .await
    }

    pub async fn list_documents(&self, collection_id: CollectionId) -> Result<Vec<Document>> {
        self.with_documents(move |repo| repo.list(collection_id)).await
    }

    pub async fn get_document(
        &self,
        collection_id: CollectionId,
        document_id: DocumentId,
    ) -> Result<Document> {
        self.with_documents(move |repo| repo.get(collection_id, document_id))
            .await
    }

    pub async fn delete_document(
        &self,
        collection_id: CollectionId,
        document_id: DocumentId,
    ) -> Result<()> {
        self.with_documents(move |repo| repo.delete(collection_id, document_id))
            .await
    }

    /// Delete several documents with a single index rebuild
    pub async fn delete_documents(
        &self,
        collection_id: CollectionId,
        document_ids: Vec<DocumentId>,
    ) -> Result<usize> {
        self.with_documents(move |repo| repo.delete_batch(collection_id, &document_ids))
            .await
    }

    // ---- index ----

    pub async fn rebuild_index(&self, collection_id: CollectionId) -> Result<VectorIndexState> {
        self.with_documents(move |repo| repo.rebuild_index(collection_id))
            .await
    }

    pub async fn verify_index(&self, collection_id: CollectionId) -> Result<VectorIndexState> {
        self.with_documents(move |repo| repo.verify_index(collection_id))
            .await
    }

    pub async fn index_state(&self, collection_id: CollectionId) -> Result<VectorIndexState> {
        self.with_documents(move |repo| repo.index_state(collection_id))
            .await
    }

    // ---- search ----

    /// The `k` most similar documents, each with `similarity` set
    pub async fn search_similar(
        &self,
        collection_id: CollectionId,
        query: SearchQuery,
        k: usize,
    ) -> Result<Vec<Document>> {
        let started = Instant::now();
        let vector = match query {
            SearchQuery::Text(text) => self.embed_one(&text).await?,
            SearchQuery::Vector(vector) => vector,
        };
        let results = self
            .with_documents(move |repo| repo.search_similar(collection_id, &vector, k))
            .await?;
        log::debug!(
            "Search in collection {collection_id} returned {} of k={k} in {:?}",
            results.len(),
            started.elapsed()
        );
        Ok(results)
    }

    pub async fn search_text(
        &self,
        collection_id: CollectionId,
        query: &str,
        k: usize,
    ) -> Result<Vec<Document>> {
        self.search_similar(collection_id, SearchQuery::Text(query.to_string()), k)
            .await
    }

    // ---- ingestion ----

    /// Chunk pasted text, embed every chunk and store the chunks as documents
    pub async fn add_text(
        &self,
        collection_id: CollectionId,
        text: &str,
        metadata: Metadata,
        chunking: Option<ChunkingConfig>,
    ) -> Result<IngestReport> {
        let chunker = self.chunker(chunking)?;
        let text = text.to_string();
        let chunks =
            tokio::task::spawn_blocking(move || chunker.chunk_text(&text, &metadata)).await??;
        let documents = self.store_chunks(collection_id, chunks).await?;
        Ok(IngestReport {
            documents,
            files_processed: 0,
            files_failed: Vec::new(),
        })
    }

    /// Extract, chunk and store one file
    pub async fn ingest_file(
        &self,
        collection_id: CollectionId,
        path: impl AsRef<Path>,
        chunking: Option<ChunkingConfig>,
        metadata: Metadata,
    ) -> Result<IngestReport> {
        let chunker = self.chunker(chunking)?;
        let path = path.as_ref().to_path_buf();
        self.get_collection(collection_id).await?;

        let chunks = tokio::task::spawn_blocking(move || chunker.chunk_file(&path, &metadata)).await??;
        let documents = self.store_chunks(collection_id, chunks).await?;
        Ok(IngestReport {
            documents,
            files_processed: 1,
            files_failed: Vec::new(),
        })
    }

    /// Ingest every supported file under `root`; files that fail to chunk are reported, not raised.
    ///
    /// All chunks are embedded before anything is written, and the whole batch is stored in one
    /// transaction: an embedding or storage failure leaves the collection unchanged.
    pub async fn ingest_directory(
        &self,
        collection_id: CollectionId,
        root: impl AsRef<Path>,
        options: ScanOptions,
        chunking: Option<ChunkingConfig>,
        metadata: Metadata,
    ) -> Result<IngestReport> {
        let started = Instant::now();
        let chunker = self.chunker(chunking)?;
        let root: PathBuf = root.as_ref().to_path_buf();
        self.get_collection(collection_id).await?;

        let batch = tokio::task::spawn_blocking(move || {
            chunker.chunk_directory(&root, &options, &metadata)
        })
        .await??;

        let files_processed = batch.files.len();
        let mut pending = Vec::new();
        for file in batch.files {
            let embedded = self.embed_chunks(file.chunks).await?;
            log::debug!("Embedded {} chunks from {}", embedded.len(), file.path.display());
            pending.extend(embedded);
        }
        let documents = self.insert_documents(collection_id, pending).await?;

        let report = IngestReport {
            documents,
            files_processed,
            files_failed: batch.failures,
        };
        log::info!(
            "Ingested {} documents from {} files into collection {collection_id} ({} failed) in {:?}",
            report.documents.len(),
            report.files_processed,
            report.files_failed.len(),
            started.elapsed()
        );
        Ok(report)
    }

    fn chunker(&self, chunking: Option<ChunkingConfig>) -> Result<Chunker> {
        Chunker::new(chunking.unwrap_or_else(|| self.chunking.clone())).map_err(|err| match err {
            ChunkerError::InvalidConfig(msg) => IndexerError::invalid_input(msg),
            other => other.into(),
        })
    }

    async fn store_chunks(
        &self,
        collection_id: CollectionId,
        chunks: Vec<TextChunk>,
    ) -> Result<Vec<Document>> {
        let new_documents = self.embed_chunks(chunks).await?;
        self.insert_documents(collection_id, new_documents).await
    }

    async fn embed_chunks(&self, chunks: Vec<TextChunk>) -> Result<Vec<NewDocument>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let embeddings = self.embed_many(&texts).await?;

        Ok(chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                NewDocument::new(chunk.content, chunk.metadata.into_map(), embedding)
            })
            .collect())
    }

    async fn insert_documents(
        &self,
        collection_id: CollectionId,
        new_documents: Vec<NewDocument>,
    ) -> Result<Vec<Document>> {
        if new_documents.is_empty() {
            return Ok(Vec::new());
        }
        self.with_documents(move |repo| repo.create_batch(collection_id, new_documents))
            .await
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.embedder.embed(text).await?;
        ensure_dimension(&vector, self.embedder.dimension())?;
        Ok(vector)
    }

    async fn embed_many(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            let embedded = self.embedder.embed_batch(batch).await?;
            if embedded.len() != batch.len() {
                return Err(VectorStoreError::embedding(format!(
                    "embedder returned {} vectors for {} texts",
                    embedded.len(),
                    batch.len()
                ))
                .into());
            }
            for vector in &embedded {
                ensure_dimension(vector, self.embedder.dimension())?;
            }
            vectors.extend(embedded);
        }
        Ok(vectors)
    }

    async fn with_collections<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&CollectionRepository) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let repo = Arc::clone(&self.collections);
        tokio::task::spawn_blocking(move || f(&repo)).await?
    }

    async fn with_documents<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&DocumentRepository) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let repo = Arc::clone(&self.documents);
        tokio::task::spawn_blocking(move || f(&repo)).await?
    }
}
