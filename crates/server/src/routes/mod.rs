//! HTTP route handlers.

pub mod auth;
pub mod docs;

#[allow(unused_imports)] // Re-exports for downstream use
pub use auth::AuthState;
#[allow(unused_imports)] // Re-exports for downstream use
pub use docs::ApiDocs;
