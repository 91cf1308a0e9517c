//! `PostgreSQL` backend: deadpool-postgres sessions over tokio-postgres.

mod params;
mod rows;
mod session;

pub(crate) use session::run;
