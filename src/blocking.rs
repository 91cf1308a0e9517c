//! Blocking facade over the async core.
//!
//! [`Database`] owns a small private runtime and drives every operation with
//! `block_on`, so it must not be used from inside an async context — use
//! [`crate::Database`] there instead. Background operations run on the same
//! runtime and surface their outcome only when joined.

use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;

use crate::config::{DatabaseType, PoolSettings};
use crate::error::DbError;
use crate::params::Params;
use crate::rows::Row;

/// Synchronous handle to one database; the same session discipline as
/// [`crate::Database`], blocking the calling thread instead of suspending.
#[derive(Debug, Clone)]
pub struct Database {
    inner: crate::Database,
    runtime: Arc<Runtime>,
}

fn new_runtime() -> Result<Arc<Runtime>, DbError> {
    let runtime = Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("databank-blocking")
        .enable_all()
        .build()
        .map_err(|e| DbError::ConnectionError(format!("failed to start blocking runtime: {e}")))?;
    Ok(Arc::new(runtime))
}

impl Database {
    /// Connect to a `SQLite` database at `path`.
    ///
    /// # Errors
    /// As [`crate::Database::new_sqlite`].
    #[cfg(feature = "sqlite")]
    pub fn new_sqlite(path: &str, settings: PoolSettings) -> Result<Self, DbError> {
        let runtime = new_runtime()?;
        let inner = runtime.block_on(crate::Database::new_sqlite(path, settings))?;
        Ok(Self { inner, runtime })
    }

    /// Connect to `PostgreSQL` with the given deadpool config.
    ///
    /// # Errors
    /// As [`crate::Database::new_postgres`].
    #[cfg(feature = "postgres")]
    pub fn new_postgres(
        config: deadpool_postgres::Config,
        settings: PoolSettings,
    ) -> Result<Self, DbError> {
        let runtime = new_runtime()?;
        let inner = runtime.block_on(crate::Database::new_postgres(config, settings))?;
        Ok(Self { inner, runtime })
    }

    /// Replace statement text with `<redacted>` in query errors.
    #[must_use]
    pub fn with_statement_redaction(mut self, redact: bool) -> Self {
        self.inner = self.inner.with_statement_redaction(redact);
        self
    }

    /// The engine behind this handle.
    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.inner.database_type()
    }

    /// Drain the pool: in-flight sessions finish, new acquires fail.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Execute one statement with one parameter set and commit.
    ///
    /// # Errors
    /// As [`crate::Database::execute`].
    pub fn execute(&self, query: &str, params: Params) -> Result<(), DbError> {
        self.runtime.block_on(self.inner.execute(query, params))
    }

    /// Execute one statement once per parameter set inside one transaction.
    ///
    /// # Errors
    /// As [`crate::Database::execute_many`].
    pub fn execute_many(&self, query: &str, params: Vec<Params>) -> Result<(), DbError> {
        self.runtime
            .block_on(self.inner.execute_many(query, params))
    }

    /// Fetch the first row, or an empty row when the result set is empty.
    ///
    /// # Errors
    /// As [`crate::Database::fetch_one`].
    pub fn fetch_one(&self, query: &str, params: Params) -> Result<Row, DbError> {
        self.runtime.block_on(self.inner.fetch_one(query, params))
    }

    /// Fetch up to `n` rows in driver order.
    ///
    /// # Errors
    /// As [`crate::Database::fetch_many`].
    pub fn fetch_many(&self, query: &str, params: Params, n: usize) -> Result<Vec<Row>, DbError> {
        self.runtime
            .block_on(self.inner.fetch_many(query, params, n))
    }

    /// Fetch every row.
    ///
    /// # Errors
    /// As [`crate::Database::fetch_all`].
    pub fn fetch_all(&self, query: &str, params: Params) -> Result<Vec<Row>, DbError> {
        self.runtime.block_on(self.inner.fetch_all(query, params))
    }

    /// Apply every parameter set in order, return the first row of the last
    /// application.
    ///
    /// # Errors
    /// As [`crate::Database::execute_fetch_one`].
    pub fn execute_fetch_one(&self, query: &str, params: Vec<Params>) -> Result<Row, DbError> {
        self.runtime
            .block_on(self.inner.execute_fetch_one(query, params))
    }

    /// Apply every parameter set in order, keep up to `n` rows of the last
    /// application.
    ///
    /// # Errors
    /// As [`crate::Database::execute_fetch_many`].
    pub fn execute_fetch_many(
        &self,
        query: &str,
        params: Vec<Params>,
        n: usize,
    ) -> Result<Vec<Row>, DbError> {
        self.runtime
            .block_on(self.inner.execute_fetch_many(query, params, n))
    }

    /// Apply every parameter set in order, keep the whole result set of the
    /// last application.
    ///
    /// # Errors
    /// As [`crate::Database::execute_fetch_all`].
    pub fn execute_fetch_all(
        &self,
        query: &str,
        params: Vec<Params>,
    ) -> Result<Vec<Row>, DbError> {
        self.runtime
            .block_on(self.inner.execute_fetch_all(query, params))
    }

    /// Hand the whole operation to the facade's runtime and return a
    /// joinable handle.
    ///
    /// Fire-and-forget: errors surface only at [`BackgroundTask::join`];
    /// dropping the handle discards them.
    #[must_use]
    pub fn execute_background(&self, query: impl Into<String>, params: Params) -> BackgroundTask {
        let db = self.inner.clone();
        let query = query.into();
        let handle = self
            .runtime
            .spawn(async move { db.execute(&query, params).await });
        BackgroundTask {
            handle,
            runtime: Arc::clone(&self.runtime),
        }
    }

    /// Background variant of [`execute_many`](Self::execute_many); same
    /// visibility trade-off as
    /// [`execute_background`](Self::execute_background).
    #[must_use]
    pub fn execute_many_background(
        &self,
        query: impl Into<String>,
        params: Vec<Params>,
    ) -> BackgroundTask {
        let db = self.inner.clone();
        let query = query.into();
        let handle = self
            .runtime
            .spawn(async move { db.execute_many(&query, params).await });
        BackgroundTask {
            handle,
            runtime: Arc::clone(&self.runtime),
        }
    }
}

/// A fire-and-forget operation in flight on the blocking facade's runtime.
#[derive(Debug)]
pub struct BackgroundTask {
    handle: JoinHandle<Result<(), DbError>>,
    runtime: Arc<Runtime>,
}

impl BackgroundTask {
    /// Wait for the operation and surface its outcome.
    ///
    /// # Errors
    /// The operation's own error, or [`DbError::Background`] if the task
    /// panicked before producing one.
    pub fn join(self) -> Result<(), DbError> {
        let BackgroundTask { handle, runtime } = self;
        runtime
            .block_on(handle)
            .map_err(|e| DbError::Background(e.to_string()))?
    }

    /// True once the operation finished, successfully or not.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
