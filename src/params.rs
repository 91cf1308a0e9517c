//! Parameter serialization: host values in, wire-safe values out.
//!
//! [`serialize`] is the single choke point between caller data and the
//! drivers. It is total (every [`Param`] variant is covered) and pure (no
//! I/O), so everything that reaches a bind call is guaranteed to be inside
//! the closed [`Value`] set.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::error::DbError;

/// Named parameters for one statement execution.
pub type Params = HashMap<String, Param>;

/// A host-side parameter value, before serialization.
///
/// This is the open input set: anything a caller may reasonably hand us,
/// built via the `From` conversions or the [`params!`](crate::params!)
/// macro. [`serialize`] narrows it to the closed [`Value`] set.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    Int(i64),
    /// Unsigned input; serializable only while it fits an `i64`.
    Uint(u64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Bytes(Vec<u8>),
    /// Fixed tuple of scalars; expands to one placeholder per element, for
    /// `WHERE x IN :values` patterns.
    Tuple(Vec<JsonValue>),
    /// Driver-native JSON: treated as already serialized and passed through
    /// untouched, never re-encoded.
    Json(JsonValue),
    /// Composite mapping; serialized one-way to JSON text.
    Map(serde_json::Map<String, JsonValue>),
    /// Composite sequence; serialized one-way to JSON text.
    List(Vec<JsonValue>),
    Null,
}

/// A wire-safe value: the closed set every bind call sees and every fetched
/// column stays within.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Bytes(Vec<u8>),
    /// Scalar elements only; consumed by placeholder expansion, never bound
    /// whole.
    Tuple(Vec<Value>),
    Json(JsonValue),
    Null,
}

/// Serialize one host value into the wire-safe set.
///
/// Composites (maps, lists) become JSON text — a deliberate one-way
/// transform for storage in text/JSON columns; the result does not round-trip
/// back into the original composite on fetch. Serializing the produced JSON
/// string again returns it unchanged, like any other string.
///
/// # Errors
/// [`DbError::UnserializableValue`] for values outside the closed set,
/// naming the offending type.
pub fn serialize(param: Param) -> Result<Value, DbError> {
    match param {
        Param::Text(s) => Ok(Value::Text(s)),
        Param::Int(i) => Ok(Value::Int(i)),
        Param::Uint(u) => i64::try_from(u).map(Value::Int).map_err(|_| {
            DbError::UnserializableValue {
                type_name: format!("u64 ({u}) beyond i64 range"),
            }
        }),
        Param::Float(f) => Ok(Value::Float(f)),
        Param::Bool(b) => Ok(Value::Bool(b)),
        Param::Date(d) => Ok(Value::Date(d)),
        Param::Timestamp(ts) => Ok(Value::Timestamp(ts)),
        Param::Bytes(b) => Ok(Value::Bytes(b)),
        Param::Tuple(elements) => {
            let mut scalars = Vec::with_capacity(elements.len());
            for element in elements {
                scalars.push(tuple_element(element)?);
            }
            Ok(Value::Tuple(scalars))
        }
        Param::Json(v) => Ok(Value::Json(v)),
        Param::Map(m) => json_text(&JsonValue::Object(m)),
        Param::List(l) => json_text(&JsonValue::Array(l)),
        Param::Null => Ok(Value::Null),
    }
}

/// Serialize a whole parameter map.
///
/// # Errors
/// [`DbError::UnserializableValue`] if any entry fails.
pub fn serialize_map(params: Params) -> Result<HashMap<String, Value>, DbError> {
    let mut out = HashMap::with_capacity(params.len());
    for (name, param) in params {
        out.insert(name, serialize(param)?);
    }
    Ok(out)
}

fn json_text(value: &JsonValue) -> Result<Value, DbError> {
    serde_json::to_string(value)
        .map(Value::Text)
        .map_err(|e| DbError::UnserializableValue {
            type_name: format!("composite ({e})"),
        })
}

fn tuple_element(element: JsonValue) -> Result<Value, DbError> {
    match element {
        JsonValue::String(s) => Ok(Value::Text(s)),
        JsonValue::Bool(b) => Ok(Value::Bool(b)),
        JsonValue::Number(n) => number_value(&n),
        other => Err(DbError::UnserializableValue {
            type_name: format!("{} inside a tuple", json_type_name(&other)),
        }),
    }
}

fn number_value(n: &serde_json::Number) -> Result<Value, DbError> {
    if let Some(i) = n.as_i64() {
        return Ok(Value::Int(i));
    }
    if n.as_u64().is_none()
        && let Some(f) = n.as_f64()
    {
        return Ok(Value::Float(f));
    }
    Err(DbError::UnserializableValue {
        type_name: format!("number {n}"),
    })
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

impl Value {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        if let Value::Int(i) = self { Some(*i) } else { None }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let Value::Text(s) = self { Some(s) } else { None }
    }

    /// Booleans, with 0/1 integers coerced the way `SQLite` stores them.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(0) => Some(false),
            Value::Int(1) => Some(true),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let Value::Float(f) = self { Some(*f) } else { None }
    }

    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Text(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    /// Timestamps, parsing the text forms `SQLite` hands back.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Text(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                .ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        if let Value::Bytes(b) = self { Some(b) } else { None }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Text(s) => serializer.serialize_str(s),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Date(d) => serializer.serialize_str(&d.format("%F").to_string()),
            Value::Timestamp(ts) => serializer.serialize_str(&ts.format("%F %T%.f").to_string()),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Tuple(elements) => elements.serialize(serializer),
            Value::Json(v) => v.serialize(serializer),
            Value::Null => serializer.serialize_none(),
        }
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Text(v.to_string())
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Text(v)
    }
}

impl From<i32> for Param {
    fn from(v: i32) -> Self {
        Param::Int(i64::from(v))
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<u64> for Param {
    fn from(v: u64) -> Self {
        Param::Uint(v)
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Float(v)
    }
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Param::Bool(v)
    }
}

impl From<NaiveDate> for Param {
    fn from(v: NaiveDate) -> Self {
        Param::Date(v)
    }
}

impl From<NaiveDateTime> for Param {
    fn from(v: NaiveDateTime) -> Self {
        Param::Timestamp(v)
    }
}

impl From<Vec<u8>> for Param {
    fn from(v: Vec<u8>) -> Self {
        Param::Bytes(v)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(v: Option<T>) -> Self {
        v.map_or(Param::Null, Into::into)
    }
}

impl From<JsonValue> for Param {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => Param::Null,
            JsonValue::Bool(b) => Param::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Param::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Param::Uint(u)
                } else if let Some(f) = n.as_f64() {
                    Param::Float(f)
                } else {
                    // unreachable without serde_json's arbitrary_precision
                    Param::Null
                }
            }
            JsonValue::String(s) => Param::Text(s),
            JsonValue::Array(a) => Param::List(a),
            JsonValue::Object(o) => Param::Map(o),
        }
    }
}

/// Build a [`Params`] map inline.
///
/// ```rust
/// use databank::params;
///
/// let p = params! { "member" => "John", "id" => 1 };
/// assert_eq!(p.len(), 2);
/// ```
#[macro_export]
macro_rules! params {
    () => { $crate::Params::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Params::new();
        $( map.insert(String::from($name), $crate::Param::from($value)); )+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn passthrough_types_are_idempotent() {
        assert_eq!(
            serialize(Param::Text("1".into())).unwrap(),
            Value::Text("1".into())
        );
        assert_eq!(serialize(Param::Int(1)).unwrap(), Value::Int(1));
        assert_eq!(serialize(Param::Float(1.0)).unwrap(), Value::Float(1.0));
        assert_eq!(serialize(Param::Bool(true)).unwrap(), Value::Bool(true));
        assert_eq!(serialize(Param::Null).unwrap(), Value::Null);

        let ts = NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(serialize(Param::Timestamp(ts)).unwrap(), Value::Timestamp(ts));
    }

    #[test]
    fn composites_become_json_text_once() {
        let first = serialize(Param::from(json!({"a": 0}))).unwrap();
        assert_eq!(first, Value::Text(r#"{"a":0}"#.into()));

        // Second pass over the produced string: unchanged, it is just text now.
        let Value::Text(text) = first else { unreachable!() };
        let second = serialize(Param::Text(text.clone())).unwrap();
        assert_eq!(second, Value::Text(text));

        assert_eq!(
            serialize(Param::from(json!([0]))).unwrap(),
            Value::Text("[0]".into())
        );
    }

    #[test]
    fn driver_native_json_is_not_double_encoded() {
        let payload = json!({"a": [1, 2]});
        assert_eq!(
            serialize(Param::Json(payload.clone())).unwrap(),
            Value::Json(payload)
        );
    }

    #[test]
    fn tuples_keep_scalars_and_reject_nesting() {
        assert_eq!(
            serialize(Param::Tuple(vec![json!(0), json!("a"), json!(true)])).unwrap(),
            Value::Tuple(vec![
                Value::Int(0),
                Value::Text("a".into()),
                Value::Bool(true)
            ])
        );

        let err = serialize(Param::Tuple(vec![json!({"a": 0})])).unwrap_err();
        assert!(matches!(err, DbError::UnserializableValue { ref type_name } if type_name.contains("object")));
    }

    #[test]
    fn unsupported_values_fail_with_type_name() {
        let err = serialize(Param::Uint(u64::MAX)).unwrap_err();
        assert!(matches!(err, DbError::UnserializableValue { ref type_name } if type_name.contains("u64")));
    }

    #[test]
    fn serialize_map_covers_every_entry() {
        let serialized = serialize_map(params! {
            "name" => "John",
            "meta" => json!({"role": "rhythm"}),
        })
        .unwrap();
        assert_eq!(serialized["name"], Value::Text("John".into()));
        assert_eq!(
            serialized["meta"],
            Value::Text(r#"{"role":"rhythm"}"#.into())
        );
    }

    #[test]
    fn option_params_map_to_null() {
        assert_eq!(Param::from(None::<i64>), Param::Null);
        assert_eq!(Param::from(Some(3_i64)), Param::Int(3));
    }
}
