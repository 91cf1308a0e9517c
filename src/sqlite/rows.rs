use std::sync::Arc;

use rusqlite::Statement;

use crate::params::Value;
use crate::rows::Row;

fn extract_value(row: &rusqlite::Row<'_>, idx: usize) -> Result<Value, rusqlite::Error> {
    let value: rusqlite::types::Value = row.get(idx)?;
    Ok(match value {
        rusqlite::types::Value::Null => Value::Null,
        rusqlite::types::Value::Integer(i) => Value::Int(i),
        rusqlite::types::Value::Real(f) => Value::Float(f),
        rusqlite::types::Value::Text(s) => Value::Text(s),
        rusqlite::types::Value::Blob(b) => Value::Bytes(b),
    })
}

/// Run a prepared statement and collect up to `limit` rows.
///
/// The statement is stepped to completion either way: `INSERT ... RETURNING`
/// applies one row per step, so stopping early would truncate the write.
pub(super) fn collect_rows(
    stmt: &mut Statement<'_>,
    bound: &[rusqlite::types::Value],
    limit: usize,
) -> Result<Vec<Row>, rusqlite::Error> {
    let columns: Arc<Vec<String>> = Arc::new(
        stmt.column_names()
            .iter()
            .map(ToString::to_string)
            .collect(),
    );
    let index = Arc::new(Row::column_index(&columns));

    let mut out = Vec::new();
    let mut rows = stmt.query(rusqlite::params_from_iter(bound.iter()))?;
    while let Some(row) = rows.next()? {
        if out.len() < limit {
            let mut values = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                values.push(extract_value(row, idx)?);
            }
            out.push(Row::new(Arc::clone(&columns), Arc::clone(&index), values));
        }
    }
    Ok(out)
}
