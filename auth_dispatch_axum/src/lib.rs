//! auth_dispatch_axum - Axum integration for auth_dispatch
//!
//! Mounts the authentication routes into an axum application and provides the
//! [`AuthSession`] extractor for the application's own handlers.

mod config;
mod error;
mod router;
mod session;

pub use config::{AUTH_MAX_BODY_BYTES, AUTH_REDIRECT_ANON};
pub use error::IntoResponseError;
pub use router::{auth_router, auth_router_no_trace};
pub use session::{AuthRedirect, AuthSession};

// Re-export the route prefix and initialization function from auth_dispatch crate
pub use auth_dispatch::{AUTH_ROUTE_PREFIX, init};
