//! HTTP server assembly for REST and GraphQL backends.
//!
//! The crate wires caller-supplied controllers into a fixed middleware
//! pipeline: CORS, conditional caching, authentication, hypermedia link
//! rewriting and a uniform error surface.

pub mod builder;
pub mod config;
pub mod error;
pub mod hateoas;
pub mod middleware;
pub mod routes;
pub mod services;

pub use builder::{HttpServerBuilder, ServerError};
pub use error::ApiError;
