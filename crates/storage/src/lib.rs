//! Storage facades for the backplane toolkit.
//!
//! - [`kv`]: uniform key-value contract with in-memory and Redis backends.
//! - [`file`]: file storage resolving logical paths to servable locations,
//!   with disk and Google Cloud signed-URL backends.

pub mod file;
pub mod kv;
