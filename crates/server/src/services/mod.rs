//! Domain-facing services behind the HTTP routes.

pub mod cookies;
pub mod google;
pub mod login;

#[allow(unused_imports)] // Re-exports for downstream use
pub use cookies::{extract_cookie, CookieHelper};
#[allow(unused_imports)] // Re-exports for downstream use
pub use google::{GoogleClient, GoogleUser, GoogleVerifier};
#[allow(unused_imports)] // Re-exports for downstream use
pub use login::{AuthFlowError, LoginOutcome, LoginService, UserLookup};
