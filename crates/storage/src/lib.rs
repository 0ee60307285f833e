//! # DocIndex Storage
//!
//! Pooled, transactional access to the SQLite store that backs collections,
//! documents and persisted vector index state.
//!
//! ## Architecture
//!
//! ```text
//! StoragePool (fixed capacity N)
//!     │
//!     ├──> acquire()          blocks until a connection is idle
//!     │      └─> PooledConnection (returned to the pool on drop)
//!     │
//!     ├──> with_transaction() BEGIN IMMEDIATE → fn → COMMIT | ROLLBACK
//!     │
//!     └──> with_read()        BEGIN DEFERRED  → fn → COMMIT
//! ```
//!
//! Every connection runs with `PRAGMA foreign_keys = ON`, so deleting a
//! collection cascades to its documents and its vector index row.
//!
//! ## Example
//!
//! ```no_run
//! use docindex_storage::{StorageConfig, StoragePool, StorageError};
//!
//! let pool = StoragePool::init(StorageConfig::new("docindex.db"))?;
//! let count: i64 = pool.with_read(|tx| {
//!     Ok::<_, StorageError>(tx.query_row("SELECT COUNT(*) FROM collections", [], |r| r.get(0))?)
//! })?;
//! pool.shutdown();
//! # Ok::<(), StorageError>(())
//! ```

mod config;
mod error;
mod pool;
mod schema;

pub use config::{StorageConfig, DEFAULT_MAX_CONNECTIONS};
pub use error::{is_unique_violation, Result, StorageError};
pub use pool::{PoolStatus, PooledConnection, StoragePool};
pub use schema::{migrate, SCHEMA_VERSION};

// Re-exported so downstream crates name the same rusqlite types the pool hands out.
pub use rusqlite;
pub use rusqlite::Transaction;
