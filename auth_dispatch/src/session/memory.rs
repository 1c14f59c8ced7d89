use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::HeaderMap;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::oidc::LogoutTokenClaims;
use crate::request::AuthRequest;
use crate::utils::{expiry_after, gen_random_string, header_clear_cookie, header_set_cookie};

use super::errors::SessionError;
use super::store::SessionStore;
use super::types::Session;

#[derive(Debug, Clone)]
struct StoredSession {
    session: Session,
    expires_at: DateTime<Utc>,
}

/// Process-local [`SessionStore`] keyed by a random session id kept in a cookie
pub struct InMemorySessionStore {
    entry: Mutex<HashMap<String, StoredSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory session store");
        Self {
            entry: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live sessions held by the store
    pub async fn len(&self) -> usize {
        self.entry.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(
        &self,
        config: &AppConfig,
        req: &AuthRequest,
        session: &Session,
    ) -> Result<HeaderMap, SessionError> {
        let session_id = gen_random_string(32)?;
        let expires_at = expiry_after(config.session_max_age)?;

        {
            let mut entry = self.entry.lock().await;
            let now = Utc::now();
            entry.retain(|_, stored| stored.expires_at >= now);
            // A fresh id on every login, the previous one is dropped
            if let Some(old_id) = req.cookie(&config.session_cookie_name) {
                entry.remove(&old_id);
            }
            entry.insert(
                session_id.clone(),
                StoredSession {
                    session: session.clone(),
                    expires_at,
                },
            );
        }

        let mut headers = HeaderMap::new();
        header_set_cookie(
            &mut headers,
            &config.session_cookie_name,
            &session_id,
            "Lax",
            i64::try_from(config.session_max_age).unwrap_or(i64::MAX),
        )?;
        tracing::info!("Session created for sub {:?}", session.sub());
        Ok(headers)
    }

    async fn load(
        &self,
        config: &AppConfig,
        req: &AuthRequest,
    ) -> Result<Option<Session>, SessionError> {
        let Some(session_id) = req.cookie(&config.session_cookie_name) else {
            tracing::debug!("No session cookie '{}' found", config.session_cookie_name);
            return Ok(None);
        };

        let mut entry = self.entry.lock().await;
        let Some(stored) = entry.get(&session_id) else {
            return Ok(None);
        };

        if stored.expires_at < Utc::now() {
            tracing::debug!("Session expired at {}", stored.expires_at);
            entry.remove(&session_id);
            return Ok(None);
        }

        Ok(Some(stored.session.clone()))
    }

    async fn delete(
        &self,
        config: &AppConfig,
        req: &AuthRequest,
    ) -> Result<HeaderMap, SessionError> {
        if let Some(session_id) = req.cookie(&config.session_cookie_name) {
            self.entry.lock().await.remove(&session_id);
        }
        let mut headers = HeaderMap::new();
        header_clear_cookie(&mut headers, &config.session_cookie_name)?;
        Ok(headers)
    }

    async fn revoke(&self, logout: &LogoutTokenClaims) -> Result<usize, SessionError> {
        let mut entry = self.entry.lock().await;
        let before = entry.len();
        entry.retain(|_, stored| !stored.session.matches_logout(logout));
        let removed = before - entry.len();
        tracing::info!(
            "Back-channel logout removed {} session(s) for sid {:?} sub {:?}",
            removed,
            logout.sid,
            logout.sub
        );
        Ok(removed)
    }
}
