use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::session::SessionError;

use super::types::{LoginTransaction, TransactionStore};

/// Process-local [`TransactionStore`]
pub struct InMemoryTransactionStore {
    entry: Mutex<HashMap<String, LoginTransaction>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory login transaction store");
        Self {
            entry: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryTransactionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn save(&self, transaction: LoginTransaction) -> Result<(), SessionError> {
        let mut entry = self.entry.lock().await;
        // Drop stale attempts while we hold the lock
        entry.retain(|_, tx| !tx.is_expired());
        entry.insert(transaction.state.clone(), transaction);
        Ok(())
    }

    async fn take(&self, state: &str) -> Result<Option<LoginTransaction>, SessionError> {
        let Some(transaction) = self.entry.lock().await.remove(state) else {
            return Ok(None);
        };
        if transaction.is_expired() {
            tracing::debug!("Login transaction expired at {}", transaction.expires_at);
            return Ok(None);
        }
        Ok(Some(transaction))
    }
}
