//! Pool configuration passed through to the deadpool collaborators.

use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Settings for the connection pool behind a [`Database`](crate::Database).
///
/// These map onto the external pool: `pool_size + max_overflow` becomes the
/// pool's `max_size` and `acquire_timeout` its wait timeout. deadpool has no
/// built-in maximum connection age, so `recycle` is enforced when a
/// connection is checked out (see the pool module).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Steady-state number of connections. Default 5.
    pub pool_size: usize,
    /// Additional connections allowed beyond `pool_size`. Default 10.
    pub max_overflow: usize,
    /// How long an acquire may wait before
    /// [`PoolExhausted`](crate::DbError::PoolExhausted). Default 30 seconds.
    pub acquire_timeout: Duration,
    /// Connections older than this are discarded at checkout; zero disables
    /// recycling. Default one hour.
    pub recycle: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            pool_size: 5,
            max_overflow: 10,
            acquire_timeout: Duration::from_secs(30),
            recycle: Duration::from_secs(3600),
        }
    }
}

impl PoolSettings {
    #[must_use]
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    #[must_use]
    pub fn with_max_overflow(mut self, max_overflow: usize) -> Self {
        self.max_overflow = max_overflow;
        self
    }

    #[must_use]
    pub fn with_acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    #[must_use]
    pub fn with_recycle(mut self, recycle: Duration) -> Self {
        self.recycle = recycle;
        self
    }

    /// Upper bound handed to the pool.
    #[must_use]
    pub fn max_connections(&self) -> usize {
        self.pool_size.saturating_add(self.max_overflow).max(1)
    }
}

/// The database engine behind a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum DatabaseType {
    /// `PostgreSQL` database
    #[cfg(feature = "postgres")]
    Postgres,
    /// `SQLite` database
    #[cfg(feature = "sqlite")]
    Sqlite,
}
