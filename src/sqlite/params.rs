use crate::params::Value;

/// Convert a bound value into the owned rusqlite value type.
pub(super) fn to_sqlite_value(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as SqliteValue;

    match value {
        Value::Text(s) => SqliteValue::Text(s.clone()),
        Value::Int(i) => SqliteValue::Integer(*i),
        Value::Float(f) => SqliteValue::Real(*f),
        Value::Bool(b) => SqliteValue::Integer(i64::from(*b)),
        Value::Date(d) => SqliteValue::Text(d.format("%F").to_string()),
        Value::Timestamp(ts) => SqliteValue::Text(ts.format("%F %T%.f").to_string()),
        Value::Bytes(b) => SqliteValue::Blob(b.clone()),
        // SQLite has no JSON type; store the serialized text.
        Value::Json(v) => SqliteValue::Text(v.to_string()),
        // Tuples expand to per-element placeholders before binding.
        Value::Tuple(_) => SqliteValue::Null,
        Value::Null => SqliteValue::Null,
    }
}
