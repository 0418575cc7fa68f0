//! HTTP middleware components.

pub mod auth;
pub mod etag;
pub mod logging;
pub mod metrics;
pub mod trace_id;

#[allow(unused_imports)] // Re-exports for downstream use
pub use auth::{authenticate, AuthIdentity, AuthMode, Authenticator, RolePolicy};
#[allow(unused_imports)] // Re-exports for downstream use
pub use etag::{etag_cache, EtagCache};
#[allow(unused_imports)] // Re-exports for downstream use
pub use logging::init_logging;
#[allow(unused_imports)] // Re-exports for downstream use
pub use metrics::{init_metrics, metrics_handler, metrics_middleware};
#[allow(unused_imports)] // Re-exports for downstream use
pub use trace_id::{get_request_id, trace_id, RequestId, REQUEST_ID_HEADER};
