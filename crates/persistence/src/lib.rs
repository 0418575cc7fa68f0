//! Persistence layer for the backplane toolkit.
//!
//! A thin wrapper over the SQL connection pool: explicit lifecycle, paged
//! listings and schema-scoped transactions.

pub mod db;

pub use db::{page_params, Database, DatabaseConfig, DbError};
