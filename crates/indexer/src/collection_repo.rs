use crate::error::{IndexerError, Result};
use crate::model::Collection;
use chrono::{DateTime, Utc};
use docindex_storage::{is_unique_violation, StoragePool, Transaction};
use docindex_vector_store::{CollectionId, VectorIndexStore};
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

const SELECT_COLLECTION: &str = "
    SELECT c.id, c.name, c.description, c.created_at, c.updated_at,
           (SELECT COUNT(*) FROM documents d WHERE d.collection_id = c.id) AS document_count
    FROM collections c";

/// Lifecycle of named collections and their (empty at birth) vector index
pub struct CollectionRepository {
    pool: StoragePool,
    store: Arc<VectorIndexStore>,
}

impl CollectionRepository {
    pub fn new(pool: StoragePool, store: Arc<VectorIndexStore>) -> Self {
        Self { pool, store }
    }

    /// Insert a collection and its empty index state in one transaction
    pub fn create(&self, name: &str, description: Option<&str>) -> Result<Collection> {
        let name = name.trim();
        if name.is_empty() {
            return Err(IndexerError::invalid_input("collection name must not be empty"));
        }

        let collection = self.pool.with_transaction(|tx| {
            let now = Utc::now();
            let inserted = tx.execute(
                "INSERT INTO collections (name, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![name, description, now],
            );
            match inserted {
                Ok(_) => {}
                Err(err) if is_unique_violation(&err) => {
                    return Err(IndexerError::DuplicateName(name.to_string()));
                }
                Err(err) => return Err(err.into()),
            }

            let id = CollectionId(tx.last_insert_rowid());
            self.store.create(tx, id)?;
            fetch(tx, id)
        })?;

        log::info!("Created collection '{}' ({})", collection.name, collection.id);
        Ok(collection)
    }

    /// All collections, newest first
    pub fn list(&self) -> Result<Vec<Collection>> {
        self.pool.with_read(|tx| {
            let mut stmt =
                tx.prepare(&format!("{SELECT_COLLECTION} ORDER BY c.created_at DESC, c.id DESC"))?;
            let collections = stmt
                .query_map([], collection_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(collections)
        })
    }

    pub fn get(&self, id: CollectionId) -> Result<Collection> {
        self.pool.with_read(|tx| fetch(tx, id))
    }

    pub fn get_by_name(&self, name: &str) -> Result<Collection> {
        self.pool.with_read(|tx| {
            tx.query_row(
                &format!("{SELECT_COLLECTION} WHERE c.name = ?1"),
                [name],
                collection_from_row,
            )
            .optional()?
            .ok_or_else(|| IndexerError::CollectionNotFound(name.to_string()))
        })
    }

    /// Look a collection up by numeric id, falling back to its name
    pub fn resolve(&self, id_or_name: &str) -> Result<Collection> {
        if let Ok(id) = id_or_name.parse::<i64>() {
            match self.get(CollectionId(id)) {
                Err(IndexerError::CollectionNotFound(_)) => {}
                found => return found,
            }
        }
        self.get_by_name(id_or_name)
    }

    /// Replace the description, the only mutable field
    pub fn update_description(&self, id: CollectionId, description: Option<&str>) -> Result<Collection> {
        self.pool.with_transaction(|tx| {
            let updated = tx.execute(
                "UPDATE collections SET description = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, description, Utc::now()],
            )?;
            if updated == 0 {
                return Err(IndexerError::CollectionNotFound(id.to_string()));
            }
            fetch(tx, id)
        })
    }

    /// Delete a collection; documents and index state go with it through the foreign keys
    pub fn delete(&self, id: CollectionId) -> Result<()> {
        self.pool.with_transaction(|tx| {
            let deleted = tx.execute("DELETE FROM collections WHERE id = ?1", [id])?;
            if deleted == 0 {
                return Err(IndexerError::CollectionNotFound(id.to_string()));
            }
            Ok(())
        })?;

        self.store.forget(id);
        log::info!("Deleted collection {id}");
        Ok(())
    }
}

/// Fail with `CollectionNotFound` unless the collection row exists in `tx`
pub(crate) fn ensure_exists(tx: &Transaction<'_>, id: CollectionId) -> Result<()> {
    tx.query_row("SELECT 1 FROM collections WHERE id = ?1", [id], |_| Ok(()))
        .optional()?
        .ok_or_else(|| IndexerError::CollectionNotFound(id.to_string()))
}

fn fetch(tx: &Transaction<'_>, id: CollectionId) -> Result<Collection> {
    tx.query_row(
        &format!("{SELECT_COLLECTION} WHERE c.id = ?1"),
        [id],
        collection_from_row,
    )
    .optional()?
    .ok_or_else(|| IndexerError::CollectionNotFound(id.to_string()))
}

fn collection_from_row(row: &Row<'_>) -> rusqlite::Result<Collection> {
    Ok(Collection {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get::<_, DateTime<Utc>>(3)?,
        updated_at: row.get::<_, DateTime<Utc>>(4)?,
        document_count: row.get::<_, i64>(5)?.try_into().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use docindex_storage::StorageConfig;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn repo() -> (TempDir, CollectionRepository) {
        let dir = TempDir::new().unwrap();
        let pool = StoragePool::init(StorageConfig::new(dir.path().join("db.sqlite"))).unwrap();
        let repo = CollectionRepository::new(pool, Arc::new(VectorIndexStore::new(4)));
        (dir, repo)
    }

    #[test]
    fn create_get_and_list() {
        let (_dir, repo) = repo();
        let first = repo.create("docs", Some("manuals")).unwrap();
        let second = repo.create("notes", None).unwrap();

        assert_eq!(first.document_count, 0);
        assert_eq!(repo.get(first.id).unwrap(), first);
        assert_eq!(repo.get_by_name("notes").unwrap().id, second.id);

        let names: Vec<String> = repo.list().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["notes", "docs"]);
    }

    #[test]
    fn duplicate_name_leaves_first_untouched() {
        let (_dir, repo) = repo();
        let first = repo.create("docs", Some("original")).unwrap();

        let err = repo.create("docs", Some("imposter")).unwrap_err();
        assert!(matches!(err, IndexerError::DuplicateName(ref name) if name == "docs"));

        let all = repo.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], first);
    }

    #[test]
    fn rejects_blank_names() {
        let (_dir, repo) = repo();
        assert!(matches!(
            repo.create("   ", None),
            Err(IndexerError::InvalidInput(_))
        ));
    }

    #[test]
    fn update_description_bumps_updated_at() {
        let (_dir, repo) = repo();
        let created = repo.create("docs", None).unwrap();
        let updated = repo.update_description(created.id, Some("now described")).unwrap();

        assert_eq!(updated.description.as_deref(), Some("now described"));
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[test]
    fn resolve_accepts_id_or_name() {
        let (_dir, repo) = repo();
        let created = repo.create("docs", None).unwrap();
        assert_eq!(repo.resolve(&created.id.to_string()).unwrap().id, created.id);
        assert_eq!(repo.resolve("docs").unwrap().id, created.id);
        assert!(matches!(
            repo.resolve("missing"),
            Err(IndexerError::CollectionNotFound(_))
        ));
    }

    #[test]
    fn delete_missing_collection_is_not_found() {
        let (_dir, repo) = repo();
        let created = repo.create("docs", None).unwrap();
        repo.delete(created.id).unwrap();
        assert!(matches!(
            repo.delete(created.id),
            Err(IndexerError::CollectionNotFound(_))
        ));
        assert!(repo.list().unwrap().is_empty());
    }
}
