//! The engine pools and the acquire discipline shared by both backends.
//!
//! Pool construction is pass-through: `PoolSettings` maps onto deadpool's
//! `max_size` and wait timeout. The one knob deadpool lacks is a maximum
//! connection age, so the acquire helpers discard connections past the
//! recycle age and check out a replacement.

use std::fmt;
use std::time::Duration;

use crate::config::{DatabaseType, PoolSettings};
use crate::error::DbError;

/// Connection pool for the enabled engines.
#[derive(Clone)]
pub(crate) enum DatabasePool {
    #[cfg(feature = "postgres")]
    Postgres(deadpool_postgres::Pool),
    #[cfg(feature = "sqlite")]
    Sqlite(deadpool_sqlite::Pool),
}

impl fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DatabasePool")
            .field(&self.database_type())
            .finish()
    }
}

impl DatabasePool {
    pub(crate) fn database_type(&self) -> DatabaseType {
        match self {
            #[cfg(feature = "postgres")]
            DatabasePool::Postgres(_) => DatabaseType::Postgres,
            #[cfg(feature = "sqlite")]
            DatabasePool::Sqlite(_) => DatabaseType::Sqlite,
        }
    }

    /// Drain the pool: in-flight sessions finish, new acquires fail.
    pub(crate) fn close(&self) {
        match self {
            #[cfg(feature = "postgres")]
            DatabasePool::Postgres(pool) => pool.close(),
            #[cfg(feature = "sqlite")]
            DatabasePool::Sqlite(pool) => pool.close(),
        }
    }
}

fn is_expired(age: Duration, recycle: Duration) -> bool {
    recycle > Duration::ZERO && age > recycle
}

#[cfg(feature = "postgres")]
pub(crate) fn build_postgres(
    mut config: deadpool_postgres::Config,
    settings: &PoolSettings,
) -> Result<deadpool_postgres::Pool, DbError> {
    use deadpool_postgres::Runtime;
    use tokio_postgres::NoTls;

    if config.dbname.is_none() {
        return Err(DbError::ConfigError("dbname is required".to_string()));
    }
    if config.host.is_none() {
        return Err(DbError::ConfigError("host is required".to_string()));
    }
    if config.user.is_none() {
        return Err(DbError::ConfigError("user is required".to_string()));
    }

    let mut pool_config = deadpool_postgres::PoolConfig::new(settings.max_connections());
    pool_config.timeouts.wait = Some(settings.acquire_timeout);
    config.pool = Some(pool_config);

    let pool = config
        .create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| DbError::ConnectionError(format!("failed to create postgres pool: {e}")))?;
    tracing::debug!(
        max_connections = settings.max_connections(),
        "postgres pool created"
    );
    Ok(pool)
}

#[cfg(feature = "sqlite")]
pub(crate) async fn build_sqlite(
    path: &str,
    settings: &PoolSettings,
) -> Result<deadpool_sqlite::Pool, DbError> {
    use deadpool_sqlite::{Config, Runtime};

    let mut config = Config::new(path);
    let mut pool_config = deadpool_sqlite::PoolConfig::new(settings.max_connections());
    pool_config.timeouts.wait = Some(settings.acquire_timeout);
    config.pool = Some(pool_config);

    let pool = config
        .create_pool(Runtime::Tokio1)
        .map_err(|e| DbError::ConnectionError(format!("failed to create sqlite pool: {e}")))?;

    // Open one connection up front so a bad path surfaces at construction.
    {
        let conn = pool.get().await.map_err(map_sqlite_pool_error)?;
        conn.interact(|conn| conn.execute_batch("PRAGMA journal_mode = WAL;"))
            .await
            .map_err(DbError::from)?
            .map_err(|e| DbError::ConnectionError(format!("sqlite setup failed: {e}")))?;
    }

    tracing::debug!(
        path,
        max_connections = settings.max_connections(),
        "sqlite pool created"
    );
    Ok(pool)
}

#[cfg(feature = "postgres")]
pub(crate) async fn acquire_postgres(
    pool: &deadpool_postgres::Pool,
    settings: &PoolSettings,
) -> Result<deadpool_postgres::Object, DbError> {
    for _ in 0..settings.max_connections() {
        let conn = pool.get().await.map_err(map_postgres_pool_error)?;
        if is_expired(
            deadpool_postgres::Object::metrics(&conn).age(),
            settings.recycle,
        ) {
            drop(deadpool_postgres::Object::take(conn));
            continue;
        }
        return Ok(conn);
    }
    // Every pooled connection was past the recycle age; whatever the pool
    // hands us now was freshly created.
    pool.get().await.map_err(map_postgres_pool_error)
}

#[cfg(feature = "sqlite")]
pub(crate) async fn acquire_sqlite(
    pool: &deadpool_sqlite::Pool,
    settings: &PoolSettings,
) -> Result<deadpool_sqlite::Object, DbError> {
    for _ in 0..settings.max_connections() {
        let conn = pool.get().await.map_err(map_sqlite_pool_error)?;
        if is_expired(
            deadpool_sqlite::Object::metrics(&conn).age(),
            settings.recycle,
        ) {
            drop(deadpool_sqlite::Object::take(conn));
            continue;
        }
        return Ok(conn);
    }
    pool.get().await.map_err(map_sqlite_pool_error)
}

// deadpool-postgres pins its own (older) `deadpool`, so its `PoolError` is a
// distinct type from the root `deadpool` crate's. Map it through its own
// re-exported types rather than the root crate's.
#[cfg(feature = "postgres")]
fn map_postgres_pool_error(err: deadpool_postgres::PoolError) -> DbError {
    use deadpool_postgres::{PoolError, TimeoutType};

    match err {
        PoolError::Timeout(TimeoutType::Wait) => DbError::PoolExhausted(
            "no connection became available within the acquire timeout".to_string(),
        ),
        PoolError::Timeout(kind) => {
            DbError::ConnectionError(format!("postgres pool timeout during {kind:?}"))
        }
        other => DbError::ConnectionError(format!("postgres pool error: {other}")),
    }
}

#[cfg(feature = "sqlite")]
fn map_sqlite_pool_error(err: deadpool::managed::PoolError<rusqlite::Error>) -> DbError {
    map_pool_error(err, "sqlite")
}

#[cfg(feature = "sqlite")]
fn map_pool_error<E: std::fmt::Display>(
    err: deadpool::managed::PoolError<E>,
    engine: &str,
) -> DbError {
    use deadpool::managed::{PoolError, TimeoutType};

    match err {
        PoolError::Timeout(TimeoutType::Wait) => DbError::PoolExhausted(
            "no connection became available within the acquire timeout".to_string(),
        ),
        PoolError::Timeout(kind) => {
            DbError::ConnectionError(format!("{engine} pool timeout during {kind:?}"))
        }
        other => DbError::ConnectionError(format!("{engine} pool error: {other}")),
    }
}
