use crate::error::{Result, VectorStoreError};
use ndarray::{ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Blob layout version written by [`FlatIndex::to_bytes`]
pub const BLOB_SCHEMA_VERSION: u32 = 1;

/// Exact (brute-force) L2 index over vectors stored contiguously in insertion order.
///
/// Positions are `0..len()`, assigned on `add`. The index knows nothing about
/// document identity; callers keep their own position map.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct IndexBlob {
    schema_version: u32,
    dimension: u32,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Append a vector; returns its position
    pub fn add(&mut self, vector: &[f32]) -> Result<usize> {
        self.check_dimension(vector)?;
        let position = self.len();
        self.data.extend_from_slice(vector);
        Ok(position)
    }

    /// Up to `k` nearest positions by squared L2 distance, nearest first.
    /// Ties keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        self.check_dimension(query)?;
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = ArrayView2::from_shape((self.len(), self.dimension), &self.data)
            .map_err(|err| VectorStoreError::SerializationError(err.to_string()))?;
        let query = ArrayView1::from(query);

        let mut diff = &vectors - &query;
        diff.mapv_inplace(|x| x * x);
        let distances = diff.sum_axis(Axis(1));

        let mut scored: Vec<(usize, f32)> = distances.iter().copied().enumerate().collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        Ok(scored)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Serialize to the persisted blob format
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let blob = IndexBlob {
            schema_version: BLOB_SCHEMA_VERSION,
            dimension: u32::try_from(self.dimension)
                .map_err(|_| VectorStoreError::SerializationError("dimension overflows u32".into()))?,
            data: self.data.clone(),
        };
        bincode::serialize(&blob).map_err(|err| VectorStoreError::SerializationError(err.to_string()))
    }

    /// Decode a persisted blob. The error string says what is wrong with it.
    pub fn from_bytes(bytes: &[u8], expected_dimension: usize) -> std::result::Result<Self, String> {
        let blob: IndexBlob =
            bincode::deserialize(bytes).map_err(|err| format!("undecodable index blob: {err}"))?;

        if blob.schema_version != BLOB_SCHEMA_VERSION {
            return Err(format!(
                "unsupported blob schema version {} (expected {BLOB_SCHEMA_VERSION})",
                blob.schema_version
            ));
        }
        let dimension = blob.dimension as usize;
        if dimension != expected_dimension {
            return Err(format!(
                "blob dimension {dimension} does not match configured dimension {expected_dimension}"
            ));
        }
        if dimension == 0 || blob.data.len() % dimension != 0 {
            return Err(format!(
                "blob holds {} floats, not a multiple of dimension {dimension}",
                blob.data.len()
            ));
        }

        Ok(Self {
            dimension,
            data: blob.data,
        })
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
}

/// Raw little-endian f32 bytes, the documents table embedding format
#[must_use]
pub fn embedding_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Inverse of [`embedding_to_bytes`]; `None` when the length is not a multiple of 4
#[must_use]
pub fn embedding_from_bytes(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_add_and_search() {
        let mut index = FlatIndex::new(3);

        assert_eq!(index.add(&[1.0, 0.0, 0.0]).unwrap(), 0);
        assert_eq!(index.add(&[0.9, 0.1, 0.0]).unwrap(), 1);
        assert_eq!(index.add(&[0.0, 1.0, 0.0]).unwrap(), 2);
        assert_eq!(index.len(), 3);

        let results = index.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].0, 0);
        assert!(results[0].1.abs() < 1e-6);

        assert_eq!(results[1].0, 1);
        assert!((results[1].1 - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_search_returns_everything_when_k_exceeds_len() {
        let mut index = FlatIndex::new(2);
        index.add(&[0.0, 0.0]).unwrap();
        index.add(&[3.0, 4.0]).unwrap();

        let results = index.search(&[0.0, 0.0], 10).unwrap();
        assert_eq!(results, vec![(0, 0.0), (1, 25.0)]);
    }

    #[test]
    fn test_empty_index_and_zero_k() {
        let mut index = FlatIndex::new(2);
        assert!(index.search(&[1.0, 1.0], 5).unwrap().is_empty());

        index.add(&[1.0, 1.0]).unwrap();
        assert!(index.search(&[1.0, 1.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut index = FlatIndex::new(1);
        index.add(&[1.0]).unwrap();
        index.add(&[-1.0]).unwrap();
        index.add(&[1.0]).unwrap();

        let positions: Vec<usize> = index
            .search(&[0.0], 3)
            .unwrap()
            .into_iter()
            .map(|(p, _)| p)
            .collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = FlatIndex::new(3);
        assert!(matches!(
            index.add(&[1.0, 0.0]),
            Err(VectorStoreError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));

        index.add(&[1.0, 0.0, 0.0]).unwrap();
        assert!(index.search(&[1.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_blob_round_trip_and_validation() {
        let mut index = FlatIndex::new(2);
        index.add(&[0.5, -0.5]).unwrap();
        index.add(&[1.5, 2.5]).unwrap();

        let bytes = index.to_bytes().unwrap();
        let restored = FlatIndex::from_bytes(&bytes, 2).unwrap();
        assert_eq!(restored, index);
        assert_eq!(restored.len(), 2);

        let err = FlatIndex::from_bytes(&bytes, 3).unwrap_err();
        assert!(err.contains("dimension"));
        assert!(FlatIndex::from_bytes(b"\x01\x02", 2).is_err());
    }

    #[test]
    fn test_embedding_bytes() {
        let values = vec![1.0_f32, -2.5, 0.125];
        let bytes = embedding_to_bytes(&values);
        assert_eq!(bytes.len(), 12);
        assert_eq!(embedding_from_bytes(&bytes), Some(values));
        assert_eq!(embedding_from_bytes(&bytes[..5]), None);
    }
}
