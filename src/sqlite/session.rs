//! The session scope: acquire, one transaction, commit-or-rollback, release.

use std::collections::HashMap;

use crate::bind::{PlaceholderStyle, bind_named, param_names};
use crate::config::PoolSettings;
use crate::database::Fetch;
use crate::error::{DbError, DriverError};
use crate::params::Value;
use crate::pool;
use crate::rows::Row;

/// Run one unit of work on a pooled `SQLite` connection.
///
/// The whole transaction executes inside a single worker closure: there is
/// no await point between BEGIN and COMMIT, so a cancelled caller can never
/// strand a connection mid-transaction.
pub(crate) async fn run(
    pool: &deadpool_sqlite::Pool,
    settings: &PoolSettings,
    sql: &str,
    param_sets: &[HashMap<String, Value>],
    fetch: Fetch,
    redact: bool,
) -> Result<Vec<Row>, DbError> {
    let conn = pool::acquire_sqlite(pool, settings).await?;

    let sql = sql.to_string();
    let sets = param_sets.to_vec();
    conn.interact(move |conn| transact(conn, &sql, &sets, fetch, redact))
        .await?
    // `conn` drops here on every path, returning the connection to the pool.
}

fn transact(
    conn: &mut rusqlite::Connection,
    sql: &str,
    param_sets: &[HashMap<String, Value>],
    fetch: Fetch,
    redact: bool,
) -> Result<Vec<Row>, DbError> {
    let tx = conn
        .transaction()
        .map_err(|e| query_error(sql, param_sets, redact, e.into()))?;

    match apply(&tx, sql, param_sets, fetch, redact) {
        Ok(rows) => {
            // Reads commit too; the engine may hold read locks until then.
            tx.commit()
                .map_err(|e| query_error(sql, param_sets, redact, e.into()))?;
            Ok(rows)
        }
        Err(original) => {
            // The original error is the actionable signal; a failed rollback
            // is logged and suppressed.
            if let Err(rollback) = tx.rollback() {
                tracing::warn!(error = %rollback, "rollback failed after query error");
            }
            Err(original)
        }
    }
}

fn apply(
    tx: &rusqlite::Transaction<'_>,
    sql: &str,
    param_sets: &[HashMap<String, Value>],
    fetch: Fetch,
    redact: bool,
) -> Result<Vec<Row>, DbError> {
    let mut last = Vec::new();
    for (position, params) in param_sets.iter().enumerate() {
        let bound = bind_named(sql, params, PlaceholderStyle::Sqlite)
            .map_err(|message| query_error(sql, param_sets, redact, DriverError::Bind(message)))?;
        let values: Vec<rusqlite::types::Value> = bound
            .values
            .iter()
            .map(super::params::to_sqlite_value)
            .collect();

        let is_last = position + 1 == param_sets.len();
        let limit = if is_last { fetch.limit() } else { 0 };

        let mut stmt = tx
            .prepare(&bound.sql)
            .map_err(|e| query_error(sql, param_sets, redact, e.into()))?;
        let rows = super::rows::collect_rows(&mut stmt, &values, limit)
            .map_err(|e| query_error(sql, param_sets, redact, e.into()))?;
        if is_last {
            last = rows;
        }
    }
    Ok(last)
}

fn query_error(
    sql: &str,
    param_sets: &[HashMap<String, Value>],
    redact: bool,
    source: DriverError,
) -> DbError {
    DbError::QueryError {
        statement: if redact {
            "<redacted>".to_string()
        } else {
            sql.to_string()
        },
        param_names: param_names(param_sets),
        source,
    }
}
