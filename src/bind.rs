//! Named-placeholder binding.
//!
//! The drivers underneath are positional (`$N` for Postgres, `?N` for
//! `SQLite`), so `:name` tokens are rewritten by a lightweight state machine
//! that leaves quoted strings, comments, dollar-quoted blocks and `::` casts
//! untouched. Binding is strict in both directions: a placeholder with no
//! parameter and a parameter with no placeholder are both errors. Tuple
//! values expand in place to a parenthesized placeholder list, one slot per
//! element, for `WHERE x IN :values` patterns.

use std::collections::{HashMap, HashSet};

use crate::error::{DbError, DriverError};
use crate::params::{Params, Value, serialize_map};

/// Target placeholder style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlaceholderStyle {
    /// `PostgreSQL`-style placeholders like `$1`.
    #[cfg(feature = "postgres")]
    Postgres,
    /// `SQLite`-style placeholders like `?1`.
    #[cfg(feature = "sqlite")]
    Sqlite,
}

impl PlaceholderStyle {
    fn render(self, index: usize) -> String {
        match self {
            #[cfg(feature = "postgres")]
            PlaceholderStyle::Postgres => format!("${index}"),
            #[cfg(feature = "sqlite")]
            PlaceholderStyle::Sqlite => format!("?{index}"),
        }
    }
}

/// A statement rewritten to positional placeholders plus its value vector.
#[derive(Debug, Clone)]
pub(crate) struct BoundStatement {
    pub sql: String,
    pub values: Vec<Value>,
}

/// Rewrite `:name` placeholders into positional ones.
///
/// Repeated names share one slot; tuple values take one slot per element.
pub(crate) fn bind_named(
    sql: &str,
    params: &HashMap<String, Value>,
    style: PlaceholderStyle,
) -> Result<BoundStatement, String> {
    let mut values: Vec<Value> = Vec::with_capacity(params.len());
    let mut slots: HashMap<String, String> = HashMap::new();

    let rewritten = rewrite_placeholders(sql, |name| {
        if let Some(existing) = slots.get(name) {
            return Ok(existing.clone());
        }
        let value = params
            .get(name)
            .ok_or_else(|| format!("no value supplied for placeholder ':{name}'"))?;
        let rendered = render_slot(name, value, style, &mut values)?;
        slots.insert(name.to_string(), rendered.clone());
        Ok(rendered)
    })?;

    let unused = unused_names(params.keys(), |name| slots.contains_key(name));
    if !unused.is_empty() {
        return Err(format!(
            "parameters never bound by the statement: {}",
            unused.join(", ")
        ));
    }

    Ok(BoundStatement {
        sql: rewritten,
        values,
    })
}

/// Render a statement with parameter values inlined as SQL literals.
///
/// For logs and diagnostics only: the output performs no driver-grade
/// escaping beyond `''` doubling and must never be executed.
///
/// # Errors
/// [`DbError::UnserializableValue`] if a parameter fails serialization and
/// [`DbError::QueryError`] when placeholders and parameters do not match.
pub fn compile_sql(sql: &str, params: Params) -> Result<String, DbError> {
    let serialized = serialize_map(params)?;
    let mut used: HashSet<String> = HashSet::new();

    let rewritten = rewrite_placeholders(sql, |name| {
        let value = serialized
            .get(name)
            .ok_or_else(|| format!("no value supplied for placeholder ':{name}'"))?;
        used.insert(name.to_string());
        Ok(literal(value))
    })
    .map_err(|message| bind_error(sql, &serialized, message))?;

    let unused = unused_names(serialized.keys(), |name| used.contains(name));
    if !unused.is_empty() {
        return Err(bind_error(
            sql,
            &serialized,
            format!("parameters never bound by the statement: {}", unused.join(", ")),
        ));
    }

    Ok(rewritten)
}

/// Sorted union of parameter names across all sets, for error reporting.
pub(crate) fn param_names(param_sets: &[HashMap<String, Value>]) -> Vec<String> {
    let mut names: Vec<String> = param_sets
        .iter()
        .flat_map(|set| set.keys().cloned())
        .collect();
    names.sort_unstable();
    names.dedup();
    names
}

fn bind_error(sql: &str, params: &HashMap<String, Value>, message: String) -> DbError {
    DbError::QueryError {
        statement: sql.to_string(),
        param_names: param_names(std::slice::from_ref(params)),
        source: DriverError::Bind(message),
    }
}

fn unused_names<'a>(
    names: impl Iterator<Item = &'a String>,
    mut was_used: impl FnMut(&str) -> bool,
) -> Vec<&'a str> {
    let mut unused: Vec<&str> = names
        .map(String::as_str)
        .filter(|name| !was_used(name))
        .collect();
    unused.sort_unstable();
    unused
}

fn render_slot(
    name: &str,
    value: &Value,
    style: PlaceholderStyle,
    values: &mut Vec<Value>,
) -> Result<String, String> {
    match value {
        Value::Tuple(elements) => {
            if elements.is_empty() {
                return Err(format!(
                    "tuple parameter ':{name}' is empty; IN () is not valid SQL"
                ));
            }
            let mut rendered = String::from("(");
            for (i, element) in elements.iter().enumerate() {
                if i > 0 {
                    rendered.push_str(", ");
                }
                values.push(element.clone());
                rendered.push_str(&style.render(values.len()));
            }
            rendered.push(')');
            Ok(rendered)
        }
        other => {
            values.push(other.clone());
            Ok(style.render(values.len()))
        }
    }
}

fn literal(value: &Value) -> String {
    match value {
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Date(d) => format!("'{}'", d.format("%F")),
        Value::Timestamp(ts) => format!("'{}'", ts.format("%F %T%.f")),
        Value::Bytes(b) => {
            let mut hex = String::with_capacity(b.len() * 2 + 3);
            hex.push_str("X'");
            for byte in b {
                hex.push_str(&format!("{byte:02X}"));
            }
            hex.push('\'');
            hex
        }
        Value::Tuple(elements) => {
            let rendered: Vec<String> = elements.iter().map(literal).collect();
            format!("({})", rendered.join(", "))
        }
        Value::Json(v) => format!("'{}'", v.to_string().replace('\'', "''")),
        Value::Null => "NULL".to_string(),
    }
}

#[derive(Clone)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// Walk the statement, calling `replace` for every `:name` outside quotes,
/// comments and dollar-quoted blocks.
fn rewrite_placeholders(
    sql: &str,
    mut replace: impl FnMut(&str) -> Result<String, String>,
) -> Result<String, String> {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len() + 8);
    let mut copied = 0usize;
    let mut state = State::Normal;
    let mut idx = 0usize;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => state = State::BlockComment(1),
                b'$' => {
                    if let Some((tag, advance)) = try_start_dollar_quote(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = advance;
                    }
                }
                b':' => {
                    if bytes.get(idx + 1) == Some(&b':') {
                        idx += 1; // `::` cast, leave as-is
                    } else if let Some((name_end, name)) = scan_name(bytes, idx + 1) {
                        let rendered = replace(name)?;
                        out.push_str(&sql[copied..idx]);
                        out.push_str(&rendered);
                        copied = name_end;
                        idx = name_end - 1;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1; // escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    let tag_len = tag.len();
                    state = State::Normal;
                    idx += tag_len + 1;
                }
            }
        }
        idx += 1;
    }

    out.push_str(&sql[copied..]);
    Ok(out)
}

/// Scan a placeholder name after the `:`; names start with a letter or `_`.
fn scan_name(bytes: &[u8], start: usize) -> Option<(usize, &str)> {
    if start >= bytes.len() || !(bytes[start].is_ascii_alphabetic() || bytes[start] == b'_') {
        return None;
    }
    let mut idx = start;
    while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_') {
        idx += 1;
    }
    std::str::from_utf8(&bytes[start..idx])
        .ok()
        .map(|name| (idx, name))
}

fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

fn try_start_dollar_quote(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let mut idx = start + 1;
    while idx < bytes.len() && bytes[idx] != b'$' {
        let b = bytes[idx];
        if !(b.is_ascii_alphanumeric() || b == b'_') {
            return None;
        }
        idx += 1;
    }

    if idx < bytes.len() && bytes[idx] == b'$' {
        let tag = String::from_utf8(bytes[start + 1..idx].to_vec()).ok()?;
        Some((tag, idx))
    } else {
        None
    }
}

fn matches_tag(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let end = idx + 1 + tag.len();
    end < bytes.len()
        && bytes[idx + 1..=end].starts_with(tag.as_bytes())
        && bytes.get(end) == Some(&b'$')
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::params;

    fn values(pairs: Vec<(&str, Value)>) -> HashMap<String, Value> {
        pairs
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    #[test]
    fn rewrites_named_placeholders_in_order_of_first_use() {
        let params = values(vec![
            ("member", Value::Text("John".into())),
            ("id", Value::Int(1)),
        ]);
        let bound = bind_named(
            "UPDATE beatles SET member = :member WHERE id = :id",
            &params,
            PlaceholderStyle::Sqlite,
        )
        .unwrap();
        assert_eq!(bound.sql, "UPDATE beatles SET member = ?1 WHERE id = ?2");
        assert_eq!(
            bound.values,
            vec![Value::Text("John".into()), Value::Int(1)]
        );
    }

    #[test]
    fn repeated_names_share_one_slot() {
        let params = values(vec![("name", Value::Text("John".into()))]);
        let bound = bind_named(
            "SELECT * FROM t WHERE a = :name OR b = :name",
            &params,
            PlaceholderStyle::Sqlite,
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT * FROM t WHERE a = ?1 OR b = ?1");
        assert_eq!(bound.values.len(), 1);
    }

    #[test]
    fn skips_literals_comments_and_casts() {
        let params = values(vec![("id", Value::Int(7))]);
        let sql = "SELECT ':nope', \":also_nope\" -- :still_nope\n/* :nope */ FROM t WHERE id = :id AND ts = created::text";
        let bound = bind_named(sql, &params, PlaceholderStyle::Sqlite).unwrap();
        assert!(bound.sql.contains("':nope'"));
        assert!(bound.sql.contains("-- :still_nope"));
        assert!(bound.sql.contains("/* :nope */"));
        assert!(bound.sql.contains("id = ?1"));
        assert!(bound.sql.contains("created::text"));
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn skips_dollar_quoted_blocks() {
        let params = values(vec![("id", Value::Int(7))]);
        let sql = "$fn$ SELECT :id $fn$ WHERE id = :id";
        let bound = bind_named(sql, &params, PlaceholderStyle::Postgres).unwrap();
        assert_eq!(bound.sql, "$fn$ SELECT :id $fn$ WHERE id = $1");
    }

    #[test]
    fn time_literals_are_not_placeholders() {
        let bound = bind_named(
            "SELECT * FROM t WHERE ts > '12:30:00'",
            &HashMap::new(),
            PlaceholderStyle::Sqlite,
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT * FROM t WHERE ts > '12:30:00'");
    }

    #[test]
    fn missing_parameter_is_a_bind_error() {
        let err = bind_named(
            "SELECT * FROM t WHERE id = :id",
            &HashMap::new(),
            PlaceholderStyle::Sqlite,
        )
        .unwrap_err();
        assert!(err.contains(":id"));
    }

    #[test]
    fn unused_parameter_is_a_bind_error() {
        let params = values(vec![
            ("id", Value::Int(1)),
            ("stray", Value::Int(2)),
        ]);
        let err = bind_named(
            "SELECT * FROM t WHERE id = :id",
            &params,
            PlaceholderStyle::Sqlite,
        )
        .unwrap_err();
        assert!(err.contains("stray"));
        assert!(!err.contains("id,"));
    }

    #[test]
    fn tuples_expand_to_one_slot_per_element() {
        let params = values(vec![(
            "ids",
            Value::Tuple(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        )]);
        let bound = bind_named(
            "SELECT * FROM t WHERE id IN :ids",
            &params,
            PlaceholderStyle::Sqlite,
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT * FROM t WHERE id IN (?1, ?2, ?3)");
        assert_eq!(bound.values.len(), 3);
    }

    #[test]
    fn empty_tuples_are_rejected() {
        let params = values(vec![("ids", Value::Tuple(Vec::new()))]);
        let err = bind_named(
            "SELECT * FROM t WHERE id IN :ids",
            &params,
            PlaceholderStyle::Sqlite,
        )
        .unwrap_err();
        assert!(err.contains("empty"));
    }

    #[test]
    fn compile_sql_inlines_literals() {
        let compiled = compile_sql(
            "SELECT * FROM foo WHERE bar = :bar;",
            params! { "bar" => 1 },
        )
        .unwrap();
        assert_eq!(compiled, "SELECT * FROM foo WHERE bar = 1;");

        let compiled = compile_sql(
            "INSERT INTO t (name) VALUES (:name)",
            params! { "name" => "O'Brien" },
        )
        .unwrap();
        assert_eq!(compiled, "INSERT INTO t (name) VALUES ('O''Brien')");
    }

    #[test]
    fn compile_sql_reports_mismatches_as_query_errors() {
        let err = compile_sql("SELECT :a", params! {}).unwrap_err();
        assert!(matches!(err, DbError::QueryError { .. }));
    }
}
