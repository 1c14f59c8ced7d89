use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::SessionError;

/// Opaque key/value state round-tripped from login to callback
///
/// Carries `returnTo` when the login recorded one, plus anything the login options added.
pub type CallbackState = BTreeMap<String, Value>;

/// A login attempt waiting for its callback
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginTransaction {
    pub state: String,
    pub nonce: String,
    pub code_verifier: String,
    /// `redirect_uri` sent with the authorization request
    pub redirect_uri: String,
    pub organization: Option<String>,
    pub return_to: Option<String>,
    pub custom_state: BTreeMap<String, Value>,
    pub expires_at: DateTime<Utc>,
}

impl LoginTransaction {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// State handed to the after-callback hook
    pub fn callback_state(&self) -> CallbackState {
        let mut state = self.custom_state.clone();
        if let Some(return_to) = &self.return_to {
            state.insert("returnTo".to_string(), Value::String(return_to.clone()));
        }
        state
    }
}

/// Persistence for [`LoginTransaction`]s
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn save(&self, transaction: LoginTransaction) -> Result<(), SessionError>;

    /// Remove and return the transaction for `state`.
    ///
    /// A transaction can only be taken once; expired transactions are never returned.
    async fn take(&self, state: &str) -> Result<Option<LoginTransaction>, SessionError>;
}
