use std::sync::Arc;

use crate::config::{AppConfig, GetConfig};
use crate::errors::HandlerError;
use crate::oidc::OAuthClient;
use crate::request::AuthRequest;
use crate::session::{InMemorySessionStore, Session, SessionStore};
use crate::transaction::{InMemoryTransactionStore, TransactionStore};

/// The collaborators every auth route works with
///
/// Cheap to clone; all members are shared.
#[derive(Clone)]
pub struct Auth {
    config: Arc<dyn GetConfig>,
    client: Arc<dyn OAuthClient>,
    sessions: Arc<dyn SessionStore>,
    transactions: Arc<dyn TransactionStore>,
}

impl Auth {
    /// Build with in-memory session and transaction stores.
    pub fn new<C, O>(config: C, client: O) -> Self
    where
        C: GetConfig + 'static,
        O: OAuthClient + 'static,
    {
        Self {
            config: Arc::new(config),
            client: Arc::new(client),
            sessions: Arc::new(InMemorySessionStore::new()),
            transactions: Arc::new(InMemoryTransactionStore::new()),
        }
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = store;
        self
    }

    pub fn with_transaction_store(mut self, store: Arc<dyn TransactionStore>) -> Self {
        self.transactions = store;
        self
    }

    /// Configuration for `req`
    pub fn config(&self, req: &AuthRequest) -> Result<AppConfig, HandlerError> {
        self.config.get_config(req).map_err(HandlerError::log)
    }

    pub fn client(&self) -> &dyn OAuthClient {
        self.client.as_ref()
    }

    pub fn session_store(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    pub fn transaction_store(&self) -> &dyn TransactionStore {
        self.transactions.as_ref()
    }

    /// Load the session the request's cookie points at, if any.
    pub async fn get_session(&self, req: &AuthRequest) -> Result<Option<Session>, HandlerError> {
        let config = self.config(req)?;
        self.load_session(&config, req).await
    }

    /// Like [`Auth::get_session`] for callers that already resolved the configuration.
    pub async fn load_session(
        &self,
        config: &AppConfig,
        req: &AuthRequest,
    ) -> Result<Option<Session>, HandlerError> {
        Ok(self.sessions.load(config, req).await?)
    }
}
