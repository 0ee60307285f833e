use crate::error::{Result, StorageError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MAX_CONNECTIONS: usize = 5;
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the connection pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file
    pub db_file: PathBuf,

    /// Fixed pool capacity (all connections are opened at init)
    pub max_connections: usize,

    /// Maximum wait for an idle connection. `None` blocks until one is returned.
    pub acquire_timeout: Option<Duration>,

    /// SQLite busy timeout applied to every connection
    pub busy_timeout: Duration,
}

impl StorageConfig {
    pub fn new(db_file: impl AsRef<Path>) -> Self {
        Self {
            db_file: db_file.as_ref().to_path_buf(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Builder: set pool capacity
    #[must_use]
    pub fn max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Builder: set acquire timeout
    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(StorageError::invalid_config("max_connections must be > 0"));
        }
        if self.db_file.as_os_str().is_empty() {
            return Err(StorageError::invalid_config("db_file must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_valid() {
        let config = StorageConfig::new("test.db");
        assert!(config.validate().is_ok());
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert!(config.acquire_timeout.is_none());
    }

    #[test]
    fn rejects_zero_capacity_and_empty_path() {
        assert!(StorageConfig::new("test.db")
            .max_connections(0)
            .validate()
            .is_err());
        assert!(StorageConfig::new("").validate().is_err());
    }
}
