use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::oidc::{Claims, LogoutTokenClaims, TokenSet};

/// The application-visible result of a successful login
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Session {
    /// Claims of the authenticated user, taken from the validated ID token
    pub user: Claims,
    pub id_token: Option<String>,
    pub access_token: Option<String>,
    pub access_token_scope: Option<String>,
    /// Unix timestamp (seconds) after which the access token is no longer valid
    pub access_token_expires_at: Option<i64>,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
}

impl Session {
    /// Build a session from validated ID token claims and the token endpoint response.
    pub fn from_tokens(user: Claims, tokens: TokenSet, issued_at: i64) -> Self {
        Self {
            user,
            // An `expires_in` too large to represent leaves the expiry unknown
            access_token_expires_at: tokens
                .expires_in
                .and_then(|secs| i64::try_from(secs).ok())
                .and_then(|secs| issued_at.checked_add(secs)),
            id_token: tokens.id_token,
            access_token: Some(tokens.access_token),
            access_token_scope: tokens.scope,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type,
        }
    }

    fn claim(&self, name: &str) -> Option<&str> {
        self.user.get(name).and_then(Value::as_str)
    }

    pub fn sub(&self) -> Option<&str> {
        self.claim("sub")
    }

    pub fn sid(&self) -> Option<&str> {
        self.claim("sid")
    }

    /// Whether a back-channel logout token names this session.
    ///
    /// A `sid` in the token must match the session's `sid` when the session has one. A token
    /// with only a `sub` matches every session of that user.
    pub fn matches_logout(&self, logout: &LogoutTokenClaims) -> bool {
        let sub_matches = logout.sub.as_deref().is_some_and(|sub| self.sub() == Some(sub));
        match (logout.sid.as_deref(), self.sid()) {
            (Some(sid), Some(session_sid)) => sid == session_sid,
            (Some(_), None) => sub_matches,
            (None, _) => sub_matches,
        }
    }
}
