//! Session-scoped SQL access for `PostgreSQL` and `SQLite`.
//!
//! Every public operation acquires a connection from the pool, runs inside
//! its own transaction, commits on success, rolls back on failure, and always
//! returns the connection to the pool. Parameters are named (`:name` in the
//! statement text) and pass through a serialization step that narrows them to
//! a closed set of wire-safe types before any I/O happens.
//!
//! ```rust,no_run
//! use databank::{Database, Params, PoolSettings, params};
//!
//! # async fn demo() -> Result<(), databank::DbError> {
//! let db = Database::new_sqlite("beatles.db", PoolSettings::default()).await?;
//! db.execute(
//!     "CREATE TABLE beatles (id INTEGER PRIMARY KEY, member TEXT NOT NULL)",
//!     Params::new(),
//! )
//! .await?;
//! db.execute(
//!     "INSERT INTO beatles (member) VALUES (:member)",
//!     params! { "member" => "John" },
//! )
//! .await?;
//! let row = db
//!     .fetch_one("SELECT * FROM beatles ORDER BY id", Params::new())
//!     .await?;
//! assert_eq!(row.get("member").and_then(databank::Value::as_text), Some("John"));
//! # Ok(()) }
//! ```
//!
//! A blocking facade with the same surface lives in [`blocking`].

#[cfg(not(any(feature = "postgres", feature = "sqlite")))]
compile_error!("enable at least one backend feature: `postgres` or `sqlite`");

mod bind;
mod config;
mod database;
mod error;
mod params;
mod pool;
mod queries;
mod rows;

#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "sqlite")]
mod sqlite;

pub mod blocking;

pub use bind::compile_sql;
pub use config::{DatabaseType, PoolSettings};
pub use database::Database;
pub use error::{DbError, DriverError};
pub use params::{Param, Params, Value, serialize, serialize_map};
pub use queries::QueryCollection;
pub use rows::Row;
