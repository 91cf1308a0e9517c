//! The public execute/fetch surface.
//!
//! Each operation is one session: serialize parameters (before any I/O),
//! check a connection out of the pool, run everything inside a single
//! transaction, commit or roll back, release. Sessions are never shared
//! between operations and never reused across transactions.

use std::collections::HashMap;

use tokio::task::JoinHandle;

use crate::config::{DatabaseType, PoolSettings};
use crate::error::DbError;
use crate::params::{Params, Value, serialize_map};
use crate::pool::DatabasePool;
use crate::rows::Row;

/// How much of the last execution's result set to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fetch {
    None,
    One,
    Many(usize),
    All,
}

impl Fetch {
    pub(crate) fn limit(self) -> usize {
        match self {
            Fetch::None => 0,
            Fetch::One => 1,
            Fetch::Many(n) => n,
            Fetch::All => usize::MAX,
        }
    }
}

/// An async handle to one database: a pool plus the session discipline.
///
/// Cloning is cheap (the pool is shared) and the handle can be used
/// concurrently from many tasks; every operation checks out its own
/// connection. Create one at startup, pass it around, and call
/// [`close`](Database::close) on shutdown to drain the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: DatabasePool,
    settings: PoolSettings,
    redact_statements: bool,
}

impl Database {
    /// Connect to a `SQLite` database at `path` (a filename, `:memory:`, or
    /// a `file:` URI).
    ///
    /// # Errors
    /// `DbError::ConnectionError` when the pool cannot be built or the
    /// database cannot be opened.
    #[cfg(feature = "sqlite")]
    pub async fn new_sqlite(path: &str, settings: PoolSettings) -> Result<Self, DbError> {
        let pool = crate::pool::build_sqlite(path, &settings).await?;
        Ok(Self {
            pool: DatabasePool::Sqlite(pool),
            settings,
            redact_statements: false,
        })
    }

    /// Connect to `PostgreSQL` with the given deadpool config.
    ///
    /// # Errors
    /// `DbError::ConfigError` when required fields are missing,
    /// `DbError::ConnectionError` when the pool cannot be built.
    #[cfg(feature = "postgres")]
    pub async fn new_postgres(
        config: deadpool_postgres::Config,
        settings: PoolSettings,
    ) -> Result<Self, DbError> {
        let pool = crate::pool::build_postgres(config, &settings)?;
        Ok(Self {
            pool: DatabasePool::Postgres(pool),
            settings,
            redact_statements: false,
        })
    }

    /// Replace statement text with `<redacted>` in query errors, for
    /// deployments where the SQL itself is sensitive. Parameter values are
    /// never included either way.
    #[must_use]
    pub fn with_statement_redaction(mut self, redact: bool) -> Self {
        self.redact_statements = redact;
        self
    }

    /// The engine behind this handle.
    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.pool.database_type()
    }

    /// Drain the pool: in-flight sessions finish, new acquires fail.
    pub fn close(&self) {
        self.pool.close();
    }

    /// Execute one statement with one parameter set and commit.
    ///
    /// # Errors
    /// [`DbError::UnserializableValue`] before any I/O,
    /// [`DbError::PoolExhausted`] when no connection arrives in time,
    /// [`DbError::QueryError`] after rollback for bind or driver failures.
    pub async fn execute(&self, query: &str, params: Params) -> Result<(), DbError> {
        let set = serialize_map(params)?;
        self.run(query, vec![set], Fetch::None).await?;
        Ok(())
    }

    /// Execute one statement once per parameter set, in sequence order,
    /// inside one transaction: either every set applies or none do.
    ///
    /// # Errors
    /// As [`execute`](Self::execute); any failure rolls back the whole batch.
    pub async fn execute_many(&self, query: &str, params: Vec<Params>) -> Result<(), DbError> {
        let sets = serialize_sets(params)?;
        self.run(query, sets, Fetch::None).await?;
        Ok(())
    }

    /// Fetch the first row, or an empty row when the result set is empty.
    ///
    /// Reads commit too; some engines hold locks or snapshots until then.
    ///
    /// # Errors
    /// As [`execute`](Self::execute).
    pub async fn fetch_one(&self, query: &str, params: Params) -> Result<Row, DbError> {
        let set = serialize_map(params)?;
        let mut rows = self.run(query, vec![set], Fetch::One).await?;
        Ok(rows.pop().unwrap_or_else(Row::empty))
    }

    /// Fetch up to `n` rows in driver order; fewer when the result set is
    /// smaller.
    ///
    /// # Errors
    /// As [`execute`](Self::execute).
    pub async fn fetch_many(
        &self,
        query: &str,
        params: Params,
        n: usize,
    ) -> Result<Vec<Row>, DbError> {
        let set = serialize_map(params)?;
        self.run(query, vec![set], Fetch::Many(n)).await
    }

    /// Fetch every row.
    ///
    /// # Errors
    /// As [`execute`](Self::execute).
    pub async fn fetch_all(&self, query: &str, params: Params) -> Result<Vec<Row>, DbError> {
        let set = serialize_map(params)?;
        self.run(query, vec![set], Fetch::All).await
    }

    /// Apply every parameter set in order inside one transaction, then
    /// return the first row of the **last** application only.
    ///
    /// # Errors
    /// As [`execute_many`](Self::execute_many).
    pub async fn execute_fetch_one(
        &self,
        query: &str,
        params: Vec<Params>,
    ) -> Result<Row, DbError> {
        let sets = serialize_sets(params)?;
        let mut rows = self.run(query, sets, Fetch::One).await?;
        Ok(rows.pop().unwrap_or_else(Row::empty))
    }

    /// Like [`execute_fetch_one`](Self::execute_fetch_one), keeping up to
    /// `n` rows of the last application.
    ///
    /// # Errors
    /// As [`execute_many`](Self::execute_many).
    pub async fn execute_fetch_many(
        &self,
        query: &str,
        params: Vec<Params>,
        n: usize,
    ) -> Result<Vec<Row>, DbError> {
        let sets = serialize_sets(params)?;
        self.run(query, sets, Fetch::Many(n)).await
    }

    /// Like [`execute_fetch_one`](Self::execute_fetch_one), keeping the
    /// whole result set of the last application. Earlier applications'
    /// effects are committed with the rest of the transaction; their result
    /// sets are discarded.
    ///
    /// # Errors
    /// As [`execute_many`](Self::execute_many).
    pub async fn execute_fetch_all(
        &self,
        query: &str,
        params: Vec<Params>,
    ) -> Result<Vec<Row>, DbError> {
        let sets = serialize_sets(params)?;
        self.run(query, sets, Fetch::All).await
    }

    /// Run [`execute`](Self::execute) as a background task on the current
    /// runtime.
    ///
    /// Fire-and-forget: the outcome is observable only by awaiting the
    /// returned handle, and a handle that is never awaited silently discards
    /// it. Callers that need to see errors must join.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn spawn_execute(
        &self,
        query: impl Into<String>,
        params: Params,
    ) -> JoinHandle<Result<(), DbError>> {
        let db = self.clone();
        let query = query.into();
        tokio::spawn(async move { db.execute(&query, params).await })
    }

    /// Background variant of [`execute_many`](Self::execute_many); same
    /// visibility trade-off as [`spawn_execute`](Self::spawn_execute).
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn spawn_execute_many(
        &self,
        query: impl Into<String>,
        params: Vec<Params>,
    ) -> JoinHandle<Result<(), DbError>> {
        let db = self.clone();
        let query = query.into();
        tokio::spawn(async move { db.execute_many(&query, params).await })
    }

    async fn run(
        &self,
        sql: &str,
        param_sets: Vec<HashMap<String, Value>>,
        fetch: Fetch,
    ) -> Result<Vec<Row>, DbError> {
        match &self.pool {
            #[cfg(feature = "postgres")]
            DatabasePool::Postgres(pool) => {
                crate::postgres::run(
                    pool,
                    &self.settings,
                    sql,
                    &param_sets,
                    fetch,
                    self.redact_statements,
                )
                .await
            }
            #[cfg(feature = "sqlite")]
            DatabasePool::Sqlite(pool) => {
                crate::sqlite::run(
                    pool,
                    &self.settings,
                    sql,
                    &param_sets,
                    fetch,
                    self.redact_statements,
                )
                .await
            }
        }
    }
}

fn serialize_sets(params: Vec<Params>) -> Result<Vec<HashMap<String, Value>>, DbError> {
    params.into_iter().map(serialize_map).collect()
}
