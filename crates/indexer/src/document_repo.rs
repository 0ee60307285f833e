use crate::collection_repo::ensure_exists;
use crate::error::{IndexerError, Result};
use crate::model::{Document, NewDocument};
use chrono::{DateTime, Utc};
use docindex_chunker::Metadata;
use docindex_storage::{StoragePool, Transaction};
use docindex_vector_store::{
    embedding_from_bytes, embedding_to_bytes, ensure_dimension, CollectionId, DocumentId,
    VectorIndexState, VectorIndexStore,
};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

const SELECT_DOCUMENT: &str =
    "SELECT id, collection_id, content, metadata, embedding, created_at FROM documents";

/// Document rows kept in lockstep with the collection's vector index
pub struct DocumentRepository {
    pool: StoragePool,
    store: Arc<VectorIndexStore>,
}

impl DocumentRepository {
    pub fn new(pool: StoragePool, store: Arc<VectorIndexStore>) -> Self {
        Self { pool, store }
    }

    /// Insert one document and index its embedding atomically
    pub fn create(
        &self,
        collection_id: CollectionId,
        content: &str,
        metadata: Metadata,
        embedding: Vec<f32>,
    ) -> Result<Document> {
        let mut created =
            self.create_batch(collection_id, vec![NewDocument::new(content, metadata, embedding)])?;
        created
            .pop()
            .ok_or_else(|| IndexerError::invalid_input("no document was inserted"))
    }

    /// Insert many documents in one transaction with a single index write
    pub fn create_batch(
        &self,
        collection_id: CollectionId,
        documents: Vec<NewDocument>,
    ) -> Result<Vec<Document>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        for doc in &documents {
            ensure_dimension(&doc.embedding, self.store.dimension())?;
        }

        let created = self.pool.with_transaction(|tx| {
            ensure_exists(tx, collection_id)?;

            let now = Utc::now();
            let mut created = Vec::with_capacity(documents.len());
            {
                let mut insert = tx.prepare(
                    "INSERT INTO documents (collection_id, content, metadata, embedding, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for doc in documents {
                    let metadata_json = serde_json::to_string(&doc.metadata)
                        .map_err(|err| IndexerError::invalid_input(format!("metadata: {err}")))?;
                    insert.execute(params![
                        collection_id,
                        doc.content,
                        metadata_json,
                        embedding_to_bytes(&doc.embedding),
                        now
                    ])?;
                    created.push(Document {
                        id: DocumentId(tx.last_insert_rowid()),
                        collection_id,
                        content: doc.content,
                        metadata: doc.metadata,
                        embedding: doc.embedding,
                        created_at: now,
                        similarity: None,
                    });
                }
            }

            let entries: Vec<(DocumentId, &[f32])> = created
                .iter()
                .map(|doc| (doc.id, doc.embedding.as_slice()))
                .collect();
            self.store.add_batch(tx, collection_id, &entries)?;
            Ok::<_, IndexerError>(created)
        })?;

        log::info!(
            "Added {} documents to collection {collection_id}",
            created.len()
        );
        Ok(created)
    }

    /// Documents of a collection, newest first
    pub fn list(&self, collection_id: CollectionId) -> Result<Vec<Document>> {
        self.pool.with_read(|tx| {
            ensure_exists(tx, collection_id)?;
            let mut stmt = tx.prepare(&format!(
                "{SELECT_DOCUMENT} WHERE collection_id = ?1 ORDER BY created_at DESC, id DESC"
            ))?;
            let documents = stmt
                .query_map([collection_id], document_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(documents)
        })
    }

    pub fn get(&self, collection_id: CollectionId, document_id: DocumentId) -> Result<Document> {
        self.pool.with_read(|tx| {
            ensure_exists(tx, collection_id)?;
            fetch(tx, collection_id, document_id)?.ok_or(IndexerError::DocumentNotFound {
                collection_id,
                document_id,
            })
        })
    }

    /// Delete one document and rebuild the collection's index
    pub fn delete(&self, collection_id: CollectionId, document_id: DocumentId) -> Result<()> {
        self.pool.with_transaction(|tx| {
            ensure_exists(tx, collection_id)?;
            let deleted = tx.execute(
                "DELETE FROM documents WHERE id = ?1 AND collection_id = ?2",
                params![document_id, collection_id],
            )?;
            if deleted == 0 {
                return Err(IndexerError::DocumentNotFound {
                    collection_id,
                    document_id,
                });
            }
            self.store.remove(tx, collection_id, document_id)?;
            Ok(())
        })?;

        log::info!("Deleted document {document_id} from collection {collection_id}");
        Ok(())
    }

    /// Delete several documents with one rebuild; returns how many rows existed
    pub fn delete_batch(&self, collection_id: CollectionId, document_ids: &[DocumentId]) -> Result<usize> {
        let deleted = self.pool.with_transaction(|tx| {
            ensure_exists(tx, collection_id)?;
            let mut deleted = 0;
            {
                let mut stmt =
                    tx.prepare("DELETE FROM documents WHERE id = ?1 AND collection_id = ?2")?;
                for document_id in document_ids {
                    deleted += stmt.execute(params![document_id, collection_id])?;
                }
            }
            if deleted > 0 {
                self.store.rebuild(tx, collection_id)?;
            }
            Ok::<_, IndexerError>(deleted)
        })?;

        log::info!("Deleted {deleted} documents from collection {collection_id}");
        Ok(deleted)
    }

    /// The `k` documents nearest to `query`, most similar first.
    ///
    /// Index entries whose document row is gone are skipped.
    pub fn search_similar(
        &self,
        collection_id: CollectionId,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<Document>> {
        self.pool.with_read(|tx| {
            ensure_exists(tx, collection_id)?;
            let neighbors = self.store.search(tx, collection_id, query, k)?;

            let mut results = Vec::with_capacity(neighbors.len());
            for neighbor in neighbors {
                match fetch(tx, collection_id, neighbor.document_id)? {
                    Some(mut document) => {
                        document.similarity = Some(neighbor.similarity());
                        results.push(document);
                    }
                    None => log::debug!(
                        "Skipping indexed document {} with no row in collection {collection_id}",
                        neighbor.document_id
                    ),
                }
            }
            Ok(results)
        })
    }

    /// Recompute the collection's index from its documents
    pub fn rebuild_index(&self, collection_id: CollectionId) -> Result<VectorIndexState> {
        self.pool.with_transaction(|tx| {
            ensure_exists(tx, collection_id)?;
            Ok(self.store.rebuild(tx, collection_id)?)
        })
    }

    /// Check the persisted index against the document rows
    pub fn verify_index(&self, collection_id: CollectionId) -> Result<VectorIndexState> {
        self.pool.with_read(|tx| {
            ensure_exists(tx, collection_id)?;
            Ok(self.store.verify(tx, collection_id)?)
        })
    }

    pub fn index_state(&self, collection_id: CollectionId) -> Result<VectorIndexState> {
        self.pool.with_read(|tx| {
            ensure_exists(tx, collection_id)?;
            Ok(self.store.state(tx, collection_id)?)
        })
    }
}

fn fetch(
    tx: &Transaction<'_>,
    collection_id: CollectionId,
    document_id: DocumentId,
) -> Result<Option<Document>> {
    Ok(tx
        .query_row(
            &format!("{SELECT_DOCUMENT} WHERE id = ?1 AND collection_id = ?2"),
            params![document_id, collection_id],
            document_from_row,
        )
        .optional()?)
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    let metadata_json: String = row.get(3)?;
    let metadata: Metadata = serde_json::from_str(&metadata_json)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(err)))?;

    let embedding_bytes: Vec<u8> = row.get(4)?;
    let embedding = embedding_from_bytes(&embedding_bytes).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Blob,
            format!("embedding of {} bytes is not a float32 array", embedding_bytes.len()).into(),
        )
    })?;

    Ok(Document {
        id: row.get(0)?,
        collection_id: row.get(1)?,
        content: row.get(2)?,
        metadata,
        embedding,
        created_at: row.get::<_, DateTime<Utc>>(5)?,
        similarity: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection_repo::CollectionRepository;
    use docindex_storage::StorageConfig;
    use docindex_vector_store::VectorStoreError;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        collections: CollectionRepository,
        documents: DocumentRepository,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let pool = StoragePool::init(StorageConfig::new(dir.path().join("db.sqlite"))).unwrap();
        let store = Arc::new(VectorIndexStore::new(2));
        Fixture {
            _dir: dir,
            collections: CollectionRepository::new(pool.clone(), Arc::clone(&store)),
            documents: DocumentRepository::new(pool, store),
        }
    }

    #[test]
    fn create_round_trips_metadata_and_embedding() {
        let fx = fixture();
        let cid = fx.collections.create("docs", None).unwrap().id;

        let mut metadata = Metadata::new();
        metadata.insert("source".into(), json!({"kind": "upload", "pages": [1, 2]}));
        let created = fx
            .documents
            .create(cid, "hello", metadata.clone(), vec![0.5, -1.0])
            .unwrap();

        let fetched = fx.documents.get(cid, created.id).unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.metadata, metadata);
        assert_eq!(fx.collections.get(cid).unwrap().document_count, 1);
    }

    #[test]
    fn dimension_mismatch_inserts_nothing() {
        let fx = fixture();
        let cid = fx.collections.create("docs", None).unwrap().id;

        let err = fx
            .documents
            .create(cid, "bad", Metadata::new(), vec![1.0, 2.0, 3.0])
            .unwrap_err();
        assert!(matches!(
            err,
            IndexerError::VectorStoreError(VectorStoreError::DimensionMismatch { .. })
        ));
        assert!(fx.documents.list(cid).unwrap().is_empty());
    }

    #[test]
    fn create_in_missing_collection_is_not_found() {
        let fx = fixture();
        let err = fx
            .documents
            .create(CollectionId(99), "x", Metadata::new(), vec![0.0, 0.0])
            .unwrap_err();
        assert!(matches!(err, IndexerError::CollectionNotFound(_)));
    }

    #[test]
    fn list_is_newest_first() {
        let fx = fixture();
        let cid = fx.collections.create("docs", None).unwrap().id;
        let a = fx.documents.create(cid, "a", Metadata::new(), vec![0.0, 0.0]).unwrap();
        let b = fx.documents.create(cid, "b", Metadata::new(), vec![1.0, 0.0]).unwrap();

        let ids: Vec<DocumentId> = fx.documents.list(cid).unwrap().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[test]
    fn delete_rebuilds_and_hides_document() {
        let fx = fixture();
        let cid = fx.collections.create("docs", None).unwrap().id;
        let a = fx.documents.create(cid, "a", Metadata::new(), vec![0.0, 0.0]).unwrap();
        let b = fx.documents.create(cid, "b", Metadata::new(), vec![0.1, 0.0]).unwrap();

        fx.documents.delete(cid, a.id).unwrap();
        let hits = fx.documents.search_similar(cid, &[0.0, 0.0], 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, b.id);

        let state = fx.documents.verify_index(cid).unwrap();
        assert_eq!(state.position_to_document_id, vec![b.id]);

        assert!(matches!(
            fx.documents.delete(cid, a.id),
            Err(IndexerError::DocumentNotFound { .. })
        ));
    }

    #[test]
    fn delete_batch_rebuilds_once() {
        let fx = fixture();
        let cid = fx.collections.create("docs", None).unwrap().id;
        let docs = fx
            .documents
            .create_batch(
                cid,
                (0..4)
                    .map(|i| NewDocument::new(format!("d{i}"), Metadata::new(), vec![i as f32, 0.0]))
                    .collect(),
            )
            .unwrap();
        let before = fx.documents.index_state(cid).unwrap().version;

        let removed = fx
            .documents
            .delete_batch(cid, &[docs[0].id, docs[2].id, DocumentId(9999)])
            .unwrap();
        assert_eq!(removed, 2);

        let state = fx.documents.verify_index(cid).unwrap();
        assert_eq!(state.position_to_document_id, vec![docs[1].id, docs[3].id]);
        assert_eq!(state.version, before + 1);
    }

    #[test]
    fn search_attaches_similarity() {
        let fx = fixture();
        let cid = fx.collections.create("docs", None).unwrap().id;
        fx.documents.create(cid, "origin", Metadata::new(), vec![0.0, 0.0]).unwrap();
        fx.documents.create(cid, "far", Metadata::new(), vec![3.0, 0.0]).unwrap();

        let hits = fx.documents.search_similar(cid, &[0.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].content, "origin");
        assert_eq!(hits[0].similarity, Some(1.0));
        assert_eq!(hits[1].similarity, Some(0.1));
    }
}
