use crate::error::{Result, VectorStoreError};
use crate::flat_index::{embedding_from_bytes, FlatIndex};
use crate::types::{CollectionId, DocumentId, Neighbor, VectorIndexState};
use chrono::{DateTime, Utc};
use docindex_storage::Transaction;
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Owner of every collection's flat index and its position → document id map.
///
/// All methods run inside a transaction supplied by the caller, so the index write
/// commits or rolls back together with the document rows that motivated it.
/// Mutations of one collection are serialized by a per-collection lock taken after
/// the connection; searches read immutable snapshots and never take that lock.
pub struct VectorIndexStore {
    dimension: usize,
    locks: Mutex<HashMap<CollectionId, Arc<Mutex<()>>>>,
    snapshots: RwLock<HashMap<CollectionId, Arc<Snapshot>>>,
}

/// Decoded index state at one persisted version
struct Snapshot {
    version: i64,
    index: FlatIndex,
    positions: Vec<DocumentId>,
}

struct StoredIndex {
    index: FlatIndex,
    positions: Vec<DocumentId>,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl VectorIndexStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            locks: Mutex::new(HashMap::new()),
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Create the empty index state for a newly inserted collection row
    pub fn create(&self, tx: &Transaction<'_>, collection_id: CollectionId) -> Result<VectorIndexState> {
        let lock = self.collection_lock(collection_id);
        let _guard = lock.lock();

        let index = FlatIndex::new(self.dimension);
        let now = Utc::now();
        tx.execute(
            "INSERT INTO vector_indices (collection_id, index_blob, position_map, version, updated_at)
             VALUES (?1, ?2, '[]', 0, ?3)",
            params![collection_id, index.to_bytes()?, now],
        )?;

        log::debug!("Created vector index for collection {collection_id} (dim {})", self.dimension);
        Ok(VectorIndexState {
            collection_id,
            dimension: self.dimension,
            vector_count: 0,
            position_to_document_id: Vec::new(),
            version: 0,
            updated_at: now,
        })
    }

    /// Append one vector for `document_id`; returns its position
    pub fn add(
        &self,
        tx: &Transaction<'_>,
        collection_id: CollectionId,
        document_id: DocumentId,
        vector: &[f32],
    ) -> Result<usize> {
        let positions = self.add_batch(tx, collection_id, &[(document_id, vector)])?;
        positions
            .first()
            .copied()
            .ok_or_else(|| VectorStoreError::corrupted(collection_id, "add produced no position"))
    }

    /// Append several vectors with a single read-modify-write of the persisted state
    pub fn add_batch(
        &self,
        tx: &Transaction<'_>,
        collection_id: CollectionId,
        entries: &[(DocumentId, &[f32])],
    ) -> Result<Vec<usize>> {
        for (_, vector) in entries {
            self.check_dimension(vector)?;
        }

        let lock = self.collection_lock(collection_id);
        let _guard = lock.lock();

        let mut stored = self.load(tx, collection_id)?;
        let mut positions = Vec::with_capacity(entries.len());
        for (document_id, vector) in entries {
            positions.push(stored.index.add(vector)?);
            stored.positions.push(*document_id);
        }
        self.persist(tx, collection_id, &stored.index, &stored.positions)?;

        log::debug!(
            "Added {} vectors to collection {collection_id} (total {})",
            entries.len(),
            stored.index.len()
        );
        Ok(positions)
    }

    /// Drop `document_id` from the index by rebuilding from the live document rows.
    ///
    /// The document row must already be deleted in `tx`. Returns `false` when the
    /// collection has no index state.
    pub fn remove(
        &self,
        tx: &Transaction<'_>,
        collection_id: CollectionId,
        document_id: DocumentId,
    ) -> Result<bool> {
        if !self.has_state(tx, collection_id)? {
            return Ok(false);
        }
        let state = self.rebuild(tx, collection_id)?;
        if state.position_to_document_id.contains(&document_id) {
            log::warn!("Document {document_id} is still live in collection {collection_id} after remove");
        }
        Ok(true)
    }

    /// Recompute the index from the collection's live documents in ascending id order
    pub fn rebuild(&self, tx: &Transaction<'_>, collection_id: CollectionId) -> Result<VectorIndexState> {
        let lock = self.collection_lock(collection_id);
        let _guard = lock.lock();

        if !self.has_state(tx, collection_id)? {
            return Err(VectorStoreError::CollectionNotFound(collection_id));
        }

        let mut stmt = tx.prepare(
            "SELECT id, embedding FROM documents WHERE collection_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([collection_id], |row| {
            Ok((row.get::<_, DocumentId>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        let mut index = FlatIndex::new(self.dimension);
        let mut positions = Vec::new();
        for row in rows {
            let (document_id, bytes) = row?;
            let vector = embedding_from_bytes(&bytes).ok_or_else(|| {
                VectorStoreError::SerializationError(format!(
                    "document {document_id} has a malformed embedding ({} bytes)",
                    bytes.len()
                ))
            })?;
            index.add(&vector)?;
            positions.push(document_id);
        }

        let (version, updated_at) = self.persist(tx, collection_id, &index, &positions)?;
        log::info!(
            "Rebuilt vector index for collection {collection_id}: {} vectors",
            positions.len()
        );

        Ok(VectorIndexState {
            collection_id,
            dimension: self.dimension,
            vector_count: index.len(),
            position_to_document_id: positions,
            version,
            updated_at,
        })
    }

    /// Up to `k` nearest documents, nearest first.
    ///
    /// Run this in a read transaction: the snapshot cache trusts that any version it
    /// observes has been committed.
    pub fn search(
        &self,
        tx: &Transaction<'_>,
        collection_id: CollectionId,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<Neighbor>> {
        self.check_dimension(query)?;
        let snapshot = self.snapshot(tx, collection_id)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        snapshot
            .index
            .search(query, k)?
            .into_iter()
            .map(|(position, distance)| {
                let document_id = snapshot.positions.get(position).copied().ok_or_else(|| {
                    VectorStoreError::corrupted(
                        collection_id,
                        format!("position {position} has no document id"),
                    )
                })?;
                Ok(Neighbor {
                    document_id,
                    distance,
                })
            })
            .collect()
    }

    /// Persisted state of the collection's index
    pub fn state(&self, tx: &Transaction<'_>, collection_id: CollectionId) -> Result<VectorIndexState> {
        let stored = self.load(tx, collection_id)?;
        Ok(VectorIndexState {
            collection_id,
            dimension: stored.index.dimension(),
            vector_count: stored.index.len(),
            position_to_document_id: stored.positions,
            version: stored.version,
            updated_at: stored.updated_at,
        })
    }

    /// Check the blob/map pair against the live document rows without changing anything
    pub fn verify(&self, tx: &Transaction<'_>, collection_id: CollectionId) -> Result<VectorIndexState> {
        let state = self.state(tx, collection_id)?;

        let mut seen = HashSet::with_capacity(state.position_to_document_id.len());
        for document_id in &state.position_to_document_id {
            if !seen.insert(*document_id) {
                return Err(VectorStoreError::corrupted(
                    collection_id,
                    format!("document {document_id} is mapped more than once"),
                ));
            }
        }

        let mut stmt = tx.prepare("SELECT id FROM documents WHERE collection_id = ?1")?;
        let live = stmt
            .query_map([collection_id], |row| row.get::<_, DocumentId>(0))?
            .collect::<rusqlite::Result<HashSet<DocumentId>>>()?;

        if let Some(stale) = seen.difference(&live).next() {
            return Err(VectorStoreError::corrupted(
                collection_id,
                format!("position map references missing document {stale}"),
            ));
        }
        if let Some(unindexed) = live.difference(&seen).next() {
            return Err(VectorStoreError::corrupted(
                collection_id,
                format!("document {unindexed} is not in the index"),
            ));
        }

        Ok(state)
    }

    /// Forget the cached snapshot of a collection
    pub fn evict(&self, collection_id: CollectionId) {
        self.snapshots.write().remove(&collection_id);
    }

    /// Drop per-collection bookkeeping for a deleted collection
    pub fn forget(&self, collection_id: CollectionId) {
        self.evict(collection_id);
        self.locks.lock().remove(&collection_id);
    }

    fn collection_lock(&self, collection_id: CollectionId) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .lock()
                .entry(collection_id)
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    fn has_state(&self, tx: &Transaction<'_>, collection_id: CollectionId) -> Result<bool> {
        Ok(tx
            .query_row(
                "SELECT 1 FROM vector_indices WHERE collection_id = ?1",
                [collection_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some())
    }

    fn snapshot(&self, tx: &Transaction<'_>, collection_id: CollectionId) -> Result<Arc<Snapshot>> {
        let version: i64 = tx
            .query_row(
                "SELECT version FROM vector_indices WHERE collection_id = ?1",
                [collection_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(VectorStoreError::CollectionNotFound(collection_id))?;

        if let Some(cached) = self.snapshots.read().get(&collection_id) {
            if cached.version == version {
                return Ok(Arc::clone(cached));
            }
        }

        let stored = self.load(tx, collection_id)?;
        let snapshot = Arc::new(Snapshot {
            version: stored.version,
            index: stored.index,
            positions: stored.positions,
        });
        self.snapshots
            .write()
            .insert(collection_id, Arc::clone(&snapshot));
        log::debug!("Loaded snapshot v{version} of collection {collection_id}");
        Ok(snapshot)
    }

    fn load(&self, tx: &Transaction<'_>, collection_id: CollectionId) -> Result<StoredIndex> {
        let row = tx
            .query_row(
                "SELECT index_blob, position_map, version, updated_at
                 FROM vector_indices WHERE collection_id = ?1",
                [collection_id],
                |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, DateTime<Utc>>(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((blob, map, version, updated_at)) = row else {
            return Err(VectorStoreError::CollectionNotFound(collection_id));
        };

        let index = FlatIndex::from_bytes(&blob, self.dimension)
            .map_err(|reason| VectorStoreError::corrupted(collection_id, reason))?;
        let positions: Vec<DocumentId> = serde_json::from_str(&map).map_err(|err| {
            VectorStoreError::corrupted(collection_id, format!("unreadable position map: {err}"))
        })?;

        if positions.len() != index.len() {
            return Err(VectorStoreError::corrupted(
                collection_id,
                format!(
                    "position map has {} entries but the index holds {} vectors",
                    positions.len(),
                    index.len()
                ),
            ));
        }

        Ok(StoredIndex {
            index,
            positions,
            version,
            updated_at,
        })
    }

    /// Write blob and map together and bump the version
    fn persist(
        &self,
        tx: &Transaction<'_>,
        collection_id: CollectionId,
        index: &FlatIndex,
        positions: &[DocumentId],
    ) -> Result<(i64, DateTime<Utc>)> {
        let map = serde_json::to_string(positions)
            .map_err(|err| VectorStoreError::SerializationError(err.to_string()))?;
        let now = Utc::now();
        let version: i64 = tx.query_row(
            "UPDATE vector_indices
             SET index_blob = ?2, position_map = ?3, version = version + 1, updated_at = ?4
             WHERE collection_id = ?1
             RETURNING version",
            params![collection_id, index.to_bytes()?, map, now],
            |row| row.get(0),
        )?;
        Ok((version, now))
    }
}
