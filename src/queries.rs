//! Named query files: `.sql` collections with `/* @name ... */` headers.
//!
//! A query file holds statements separated by one blank line, each preceded
//! by a header naming it:
//!
//! ```sql
//! /* @name select_all_members */
//! SELECT * FROM beatles;
//!
//! /* @name insert_member */
//! INSERT INTO beatles (member) VALUES (:member);
//! ```

use std::collections::HashMap;
use std::ops::Index;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::DbError;

/// Queries are separated by one blank line.
const QUERY_SEPARATOR: &str = "\n\n";

/// The pattern a query header must match.
static HEADER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/\*\s@name\s(\w+)\s\*/$").expect("header pattern compiles"));

/// A named collection of SQL statements loaded from a `.sql` file.
#[derive(Debug, Clone, Default)]
pub struct QueryCollection {
    queries: HashMap<String, String>,
}

impl QueryCollection {
    /// Load a collection from the given `.sql` file.
    ///
    /// # Errors
    /// [`DbError::ConfigError`] when the path is not a `.sql` file,
    /// [`DbError::Io`] when reading fails, and
    /// [`DbError::InvalidQueryHeader`] when an entry's first line is not
    /// `/* @name identifier */`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();
        if path.extension().and_then(|ext| ext.to_str()) != Some("sql") {
            return Err(DbError::ConfigError(format!(
                "'{}' is not a SQL file",
                path.display()
            )));
        }
        let sql = std::fs::read_to_string(path)?;
        Self::parse(&sql)
    }

    /// Parse a collection from already-loaded text.
    ///
    /// # Errors
    /// [`DbError::InvalidQueryHeader`] for a malformed entry header.
    pub fn parse(sql: &str) -> Result<Self, DbError> {
        let mut queries = HashMap::new();
        for entry in sql
            .split(QUERY_SEPARATOR)
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
        {
            let (header, body) = entry.split_once('\n').unwrap_or((entry, ""));
            let name = parse_header(header.trim_end())?;
            queries.insert(name, body.trim().to_string());
        }
        Ok(Self { queries })
    }

    /// Look up a query by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.queries.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Iterate over the query names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.queries.keys().map(String::as_str)
    }
}

impl Index<&str> for QueryCollection {
    type Output = str;

    /// # Panics
    /// Panics when `name` is not in the collection; use
    /// [`get`](QueryCollection::get) for a fallible lookup.
    fn index(&self, name: &str) -> &str {
        self.get(name)
            .unwrap_or_else(|| panic!("'{name}' is not a valid query name"))
    }
}

fn parse_header(header: &str) -> Result<String, DbError> {
    HEADER_PATTERN
        .captures(header)
        .map(|captures| captures[1].to_string())
        .ok_or_else(|| DbError::InvalidQueryHeader(header.to_string()))
}
