use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;

use crate::params::Value;
use crate::rows::Row;

/// Map driver rows into the shared-column [`Row`] shape.
pub(super) fn collect_rows(rows: &[tokio_postgres::Row]) -> Result<Vec<Row>, tokio_postgres::Error> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Arc<Vec<String>> = Arc::new(
        first
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect(),
    );
    let index = Arc::new(Row::column_index(&columns));

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let count = row.columns().len();
        let mut values = Vec::with_capacity(count);
        for idx in 0..count {
            values.push(extract_value(row, idx)?);
        }
        out.push(Row::new(Arc::clone(&columns), Arc::clone(&index), values));
    }
    Ok(out)
}

/// Extract one column by the declared type name.
fn extract_value(row: &tokio_postgres::Row, idx: usize) -> Result<Value, tokio_postgres::Error> {
    let type_name = row.columns()[idx].type_().name();

    if type_name == "int2" {
        let val: Option<i16> = row.try_get(idx)?;
        Ok(val.map_or(Value::Null, |v| Value::Int(i64::from(v))))
    } else if type_name == "int4" {
        let val: Option<i32> = row.try_get(idx)?;
        Ok(val.map_or(Value::Null, |v| Value::Int(i64::from(v))))
    } else if type_name == "int8" {
        let val: Option<i64> = row.try_get(idx)?;
        Ok(val.map_or(Value::Null, Value::Int))
    } else if type_name == "float4" || type_name == "float8" {
        let val: Option<f64> = row.try_get(idx)?;
        Ok(val.map_or(Value::Null, Value::Float))
    } else if type_name == "bool" {
        let val: Option<bool> = row.try_get(idx)?;
        Ok(val.map_or(Value::Null, Value::Bool))
    } else if type_name == "date" {
        let val: Option<NaiveDate> = row.try_get(idx)?;
        Ok(val.map_or(Value::Null, Value::Date))
    } else if type_name == "timestamp" || type_name == "timestamptz" {
        let val: Option<NaiveDateTime> = row.try_get(idx)?;
        Ok(val.map_or(Value::Null, Value::Timestamp))
    } else if type_name == "json" || type_name == "jsonb" {
        let val: Option<JsonValue> = row.try_get(idx)?;
        Ok(val.map_or(Value::Null, Value::Json))
    } else if type_name == "bytea" {
        let val: Option<Vec<u8>> = row.try_get(idx)?;
        Ok(val.map_or(Value::Null, Value::Bytes))
    } else {
        // text, varchar, char, name, and anything else that reads as text
        let val: Option<String> = row.try_get(idx)?;
        Ok(val.map_or(Value::Null, Value::Text))
    }
}
