//! `SQLite` backend: deadpool-sqlite sessions on the pool's worker threads.

mod params;
mod rows;
mod session;

pub(crate) use session::run;

impl From<deadpool_sqlite::InteractError> for crate::error::DbError {
    fn from(err: deadpool_sqlite::InteractError) -> Self {
        crate::error::DbError::ConnectionError(format!("sqlite interact error: {err}"))
    }
}
