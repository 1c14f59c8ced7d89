//! auth_dispatch - Authentication route dispatcher for OAuth2/OIDC web applications
//!
//! This crate routes the login, callback, logout, profile and back-channel logout endpoints
//! to pluggable handlers. The callback route verifies the identity provider's response,
//! exchanges the code for tokens and establishes the application session, in either the
//! page-router (mutable response) or the app-router (returned response) shape.

mod adapter;
mod auth;
mod callback;
mod config;
mod errors;
mod handlers;
mod oidc;
mod options;
mod request;
mod response;
mod router;
mod session;
mod transaction;
mod utils;

pub use adapter::{AppRouterAdapter, PageRouterAdapter, ResponseAdapter};
pub use auth::Auth;
pub use callback::{
    AfterCallback, AfterCallbackResult, CallbackOptions, CallbackRoute, HookRequest,
    after_callback, handle_callback, verify_callback,
};
pub use config::{AUTH_ROUTE_PREFIX, AppConfig, GetConfig};
pub use errors::{ErrorKind, HandlerError, HookError, StatusError};
pub use handlers::{
    BackchannelLogoutRoute, GetLoginState, LoginOptions, LoginRoute, LogoutOptions, LogoutRoute,
    ProfileOptions, ProfileRoute, handle_backchannel_logout, handle_login, handle_logout,
    handle_profile,
};
pub use oidc::{Claims, LogoutTokenClaims, OAuthClient, OidcClient, OidcError, TokenRequest, TokenSet};
pub use options::{BoxFuture, HandlerOptions};
pub use request::{AbortSignal, AuthRequest, AuthRequestBuilder};
pub use response::{
    AuthResponse, PageResponse, ResponseWriteError, empty_response, json_response,
    redirect_response,
};
pub use router::{AuthHandler, AuthRoute, Handlers, OnError, handle_auth, on_error};
pub use session::{InMemorySessionStore, Session, SessionError, SessionStore};
pub use transaction::{CallbackState, InMemoryTransactionStore, LoginTransaction, TransactionStore};

/// Load `.env` into the process environment before the `AUTH_*` settings are read.
pub fn init() {
    if dotenvy::dotenv().is_err() {
        tracing::debug!("No .env file loaded");
    }
}
