use std::collections::BTreeMap;
use std::sync::Arc;

use auth_dispatch::{
    AppConfig, Auth, AuthHandler, Handlers, InMemoryTransactionStore, LoginTransaction,
    TransactionStore, handle_auth,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};

use super::mock_client::MockOAuthClient;
use super::session_utils::CountingSessionStore;

pub const SIGNING_SECRET: &[u8] = b"integration-test-signing-secret";
pub const BASE_URL: &str = "https://app.example.com";
pub const ISSUER: &str = "https://issuer.example.com";
pub const CLIENT_ID: &str = "client-1";
pub const TRANSACTION_COOKIE: &str = "auth_verification";
pub const SESSION_COOKIE: &str = "appSession";

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::new(BASE_URL, ISSUER, CLIENT_ID);
    config.route_prefix = "/api/auth".to_string();
    config
}

pub fn sign(claims: Value) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SIGNING_SECRET),
    )
    .expect("encode jwt")
}

/// ID token claims for `sub` answering a login that used `nonce`
pub fn id_token_claims(sub: &str, nonce: &str) -> Value {
    let now = Utc::now().timestamp();
    json!({
        "iss": format!("{ISSUER}/"),
        "aud": CLIENT_ID,
        "sub": sub,
        "sid": format!("sid-{sub}"),
        "nonce": nonce,
        "iat": now,
        "exp": now + 600,
    })
}

pub fn logout_token(sid: Option<&str>, sub: Option<&str>) -> String {
    let now = Utc::now().timestamp();
    let mut claims = json!({
        "iss": ISSUER,
        "aud": CLIENT_ID,
        "iat": now,
        "exp": now + 120,
        "events": { "http://schemas.openid.net/event/backchannel-logout": {} },
    });
    if let Some(sid) = sid {
        claims["sid"] = json!(sid);
    }
    if let Some(sub) = sub {
        claims["sub"] = json!(sub);
    }
    sign(claims)
}

pub fn transaction(state: &str, nonce: &str) -> LoginTransaction {
    LoginTransaction {
        state: state.to_string(),
        nonce: nonce.to_string(),
        code_verifier: "verifier-1".to_string(),
        redirect_uri: format!("{BASE_URL}/api/auth/callback"),
        organization: None,
        return_to: None,
        custom_state: BTreeMap::new(),
        expires_at: Utc::now() + Duration::seconds(600),
    }
}

/// Collaborators of one test, kept around for assertions
pub struct TestContext {
    pub auth: Arc<Auth>,
    pub client: MockOAuthClient,
    pub sessions: Arc<CountingSessionStore>,
    pub transactions: Arc<InMemoryTransactionStore>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let client = MockOAuthClient::new();
        let sessions = Arc::new(CountingSessionStore::new());
        let transactions = Arc::new(InMemoryTransactionStore::new());
        let auth = Auth::new(config, client.clone())
            .with_session_store(sessions.clone())
            .with_transaction_store(transactions.clone());

        Self {
            auth: Arc::new(auth),
            client,
            sessions,
            transactions,
        }
    }

    /// Record a pending login and make the provider answer it for `sub`.
    pub async fn seed_login(&self, tx: LoginTransaction, sub: &str) {
        self.client
            .set_id_token_claims(id_token_claims(sub, &tx.nonce));
        self.transactions.save(tx).await.expect("save transaction");
    }

    pub fn handler(&self, handlers: Handlers) -> AuthHandler {
        handle_auth(self.auth.clone(), handlers)
    }
}
