use crate::config::StorageConfig;
use crate::error::{Result, StorageError};
use crate::schema;
use parking_lot::{Condvar, Mutex};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;

/// Fixed-capacity pool of SQLite connections.
///
/// Cloning is cheap; clones share the same connections. The pool is created by
/// [`StoragePool::init`] at process start and closed by [`StoragePool::shutdown`].
#[derive(Clone)]
pub struct StoragePool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    config: StorageConfig,
    state: Mutex<PoolState>,
    available: Condvar,
}

struct PoolState {
    idle: Vec<Connection>,
    checked_out: usize,
    closed: bool,
}

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub capacity: usize,
    pub idle: usize,
    pub checked_out: usize,
    pub closed: bool,
}

impl StoragePool {
    /// Open all connections, enable foreign keys and run schema migrations.
    pub fn init(config: StorageConfig) -> Result<Self> {
        config.validate()?;
        if let Some(parent) = config.db_file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        log::info!(
            "Opening storage pool at {:?} ({} connections)",
            config.db_file,
            config.max_connections
        );

        let mut idle = Vec::with_capacity(config.max_connections);
        for _ in 0..config.max_connections {
            idle.push(open_connection(&config)?);
        }
        if let Some(first) = idle.first_mut() {
            schema::migrate(first)?;
        }

        Ok(Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState {
                    idle,
                    checked_out: 0,
                    closed: false,
                }),
                available: Condvar::new(),
                config,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.inner.config
    }

    /// Take a connection out of the pool.
    ///
    /// Blocks while every connection is checked out. With no `acquire_timeout`
    /// configured the wait is unbounded; callers serving requests should set one.
    pub fn acquire(&self) -> Result<PooledConnection> {
        let deadline = self
            .inner
            .config
            .acquire_timeout
            .map(|timeout| (Instant::now() + timeout, timeout));

        let mut state = self.inner.state.lock();
        loop {
            if state.closed {
                return Err(StorageError::PoolClosed);
            }
            if let Some(conn) = state.idle.pop() {
                state.checked_out += 1;
                return Ok(PooledConnection {
                    conn: Some(conn),
                    pool: Arc::clone(&self.inner),
                });
            }

            match deadline {
                Some((at, timeout)) => {
                    if self.inner.available.wait_until(&mut state, at).timed_out()
                        && state.idle.is_empty()
                        && !state.closed
                    {
                        return Err(StorageError::AcquireTimeout(timeout));
                    }
                }
                None => self.inner.available.wait(&mut state),
            }
        }
    }

    /// Run `f` inside a write transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back and returns the error otherwise.
    /// The connection goes back to the pool on every exit path, unwinding included.
    pub fn with_transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> std::result::Result<T, E>,
        E: From<StorageError>,
    {
        self.run(TransactionBehavior::Immediate, f)
    }

    /// Run `f` inside a deferred transaction so multi-statement reads see one snapshot.
    pub fn with_read<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> std::result::Result<T, E>,
        E: From<StorageError>,
    {
        self.run(TransactionBehavior::Deferred, f)
    }

    fn run<T, E, F>(&self, behavior: TransactionBehavior, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> std::result::Result<T, E>,
        E: From<StorageError>,
    {
        let mut conn = self.acquire()?;
        let tx = conn
            .transaction_with_behavior(behavior)
            .map_err(StorageError::from)?;

        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(StorageError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    log::warn!("Rollback failed: {rollback_err}");
                }
                Err(err)
            }
        }
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        PoolStatus {
            capacity: self.inner.config.max_connections,
            idle: state.idle.len(),
            checked_out: state.checked_out,
            closed: state.closed,
        }
    }

    /// Close idle connections and refuse further acquisitions.
    ///
    /// Connections still checked out are closed when their guard drops.
    pub fn shutdown(&self) {
        let drained = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        self.inner.available.notify_all();

        for conn in drained {
            if let Err((_, err)) = conn.close() {
                log::warn!("Failed to close connection cleanly: {err}");
            }
        }
        log::info!("Storage pool shut down");
    }
}

fn open_connection(config: &StorageConfig) -> Result<Connection> {
    let conn = Connection::open(&config.db_file)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(config.busy_timeout)?;
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    log::debug!("Opened connection (journal_mode={mode})");
    Ok(conn)
}

/// Connection checked out of a [`StoragePool`]; returned on drop.
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        let mut state = self.pool.state.lock();
        state.checked_out = state.checked_out.saturating_sub(1);
        if state.closed {
            drop(state);
            let _ = conn.close();
            return;
        }
        state.idle.push(conn);
        drop(state);
        self.pool.available.notify_one();
    }
}
