use async_trait::async_trait;
use http::HeaderMap;

use crate::config::AppConfig;
use crate::oidc::LogoutTokenClaims;
use crate::request::AuthRequest;

use super::errors::SessionError;
use super::types::Session;

/// Persistence for application sessions
///
/// Stores own the cookie format. `save` and `delete` return the `Set-Cookie` headers the
/// caller must emit with its response.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist `session` for the browser that sent `req`, replacing any session it had.
    async fn save(
        &self,
        config: &AppConfig,
        req: &AuthRequest,
        session: &Session,
    ) -> Result<HeaderMap, SessionError>;

    /// Load the session belonging to `req`, if any.
    async fn load(
        &self,
        config: &AppConfig,
        req: &AuthRequest,
    ) -> Result<Option<Session>, SessionError>;

    /// Remove the session belonging to `req` and return headers clearing its cookie.
    async fn delete(&self, config: &AppConfig, req: &AuthRequest)
    -> Result<HeaderMap, SessionError>;

    /// Invalidate every stored session named by a back-channel logout token.
    ///
    /// Returns the number of sessions removed.
    async fn revoke(&self, logout: &LogoutTokenClaims) -> Result<usize, SessionError>;
}
