//! The session scope: acquire, one transaction, commit-or-rollback, release.

use std::collections::HashMap;

use deadpool_postgres::Transaction;

use crate::bind::{PlaceholderStyle, bind_named, param_names};
use crate::config::PoolSettings;
use crate::database::Fetch;
use crate::error::{DbError, DriverError};
use crate::params::Value;
use crate::pool;
use crate::rows::Row;

/// Run one unit of work: the statement applied once per parameter set inside
/// a single transaction, returning the rows of the last application.
///
/// If the caller's future is dropped mid-flight, the driver's transaction
/// guard rolls back on drop and the pooled connection is released by
/// ownership, so no connection is ever returned mid-transaction.
pub(crate) async fn run(
    pool: &deadpool_postgres::Pool,
    settings: &PoolSettings,
    sql: &str,
    param_sets: &[HashMap<String, Value>],
    fetch: Fetch,
    redact: bool,
) -> Result<Vec<Row>, DbError> {
    let mut client = pool::acquire_postgres(pool, settings).await?;

    let tx = client
        .transaction()
        .await
        .map_err(|e| query_error(sql, param_sets, redact, e.into()))?;

    match apply(&tx, sql, param_sets, fetch, redact).await {
        Ok(rows) => {
            // Reads commit too; the engine may hold snapshots until then.
            tx.commit()
                .await
                .map_err(|e| query_error(sql, param_sets, redact, e.into()))?;
            Ok(rows)
        }
        Err(original) => {
            // The original error is the actionable signal; a failed rollback
            // is logged and suppressed.
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(error = %rollback, "rollback failed after query error");
            }
            Err(original)
        }
    }
    // `client` drops here on every path, returning the connection to the pool.
}

async fn apply(
    tx: &Transaction<'_>,
    sql: &str,
    param_sets: &[HashMap<String, Value>],
    fetch: Fetch,
    redact: bool,
) -> Result<Vec<Row>, DbError> {
    let mut last = Vec::new();
    for (position, params) in param_sets.iter().enumerate() {
        let bound = bind_named(sql, params, PlaceholderStyle::Postgres)
            .map_err(|message| query_error(sql, param_sets, redact, DriverError::Bind(message)))?;
        let refs = super::params::as_refs(&bound.values);

        // The query path tolerates statements with and without result sets,
        // so `INSERT ... RETURNING` works in every position of the batch.
        let rows = tx
            .query(bound.sql.as_str(), &refs)
            .await
            .map_err(|e| query_error(sql, param_sets, redact, e.into()))?;

        if position + 1 == param_sets.len() {
            let kept = fetch.limit().min(rows.len());
            last = super::rows::collect_rows(&rows[..kept])
                .map_err(|e| query_error(sql, param_sets, redact, e.into()))?;
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
