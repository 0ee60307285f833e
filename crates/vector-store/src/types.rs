use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                self.0.to_sql()
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

row_id!(
    /// Database identity of a collection
    CollectionId
);
row_id!(
    /// Database identity of a document; never reused after deletion
    DocumentId
);

/// Persisted index state of one collection, as seen by inspection tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndexState {
    pub collection_id: CollectionId,

    /// Vector dimension recorded in the blob
    pub dimension: usize,

    /// Number of vectors in the blob
    pub vector_count: usize,

    /// Document id for each index position, in position order
    pub position_to_document_id: Vec<DocumentId>,

    /// Bumped on every mutation
    pub version: i64,

    pub updated_at: DateTime<Utc>,
}

impl VectorIndexState {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vector_count == 0
    }
}

/// One search result: a document and its squared L2 distance to the query
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub document_id: DocumentId,
    pub distance: f32,
}

impl Neighbor {
    /// Similarity in `(0, 1]`: `1 / (1 + distance)`
    #[must_use]
    pub fn similarity(&self) -> f32 {
        1.0 / (1.0 + self.distance)
    }
}
