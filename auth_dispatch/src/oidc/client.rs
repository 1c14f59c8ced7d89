use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::config::AppConfig;

use super::errors::OidcError;
use super::types::{Claims, LogoutTokenClaims, TokenRequest, TokenSet};

/// The identity provider as seen from the callback core
///
/// Implementations perform the network calls and the cryptographic checks. The callback core
/// only relies on the contract: `exchange_code` resolves or fails exactly once, and the
/// `verify_*` methods only return claims for tokens they accept.
#[async_trait]
pub trait OAuthClient: Send + Sync {
    /// Exchange an authorization code for tokens.
    async fn exchange_code(
        &self,
        config: &AppConfig,
        request: TokenRequest,
    ) -> Result<TokenSet, OidcError>;

    /// Validate an ID token (signature, issuer, audience, expiry) and return its claims.
    async fn verify_id_token(&self, config: &AppConfig, id_token: &str)
    -> Result<Claims, OidcError>;

    /// Validate a back-channel logout token.
    async fn verify_logout_token(
        &self,
        config: &AppConfig,
        logout_token: &str,
    ) -> Result<LogoutTokenClaims, OidcError>;

    /// Fetch fresh claims from the userinfo endpoint.
    async fn userinfo(&self, config: &AppConfig, access_token: &str)
    -> Result<Claims, OidcError>;
}

/// Default [`OAuthClient`] talking to a standard OIDC provider
///
/// Token signatures are checked with a key supplied up front (an HS256 client secret or an
/// RS256 public key in PEM form). Keys are not discovered or rotated here.
#[derive(Clone)]
pub struct OidcClient {
    http: reqwest::Client,
    key: DecodingKey,
    algorithm: Algorithm,
}

impl OidcClient {
    /// Verify tokens signed with HS256 using `secret`.
    pub fn with_hs256_secret(secret: &[u8]) -> Result<Self, OidcError> {
        Ok(Self {
            http: get_client()?,
            key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
        })
    }

    /// Verify tokens signed with RS256 using a PEM encoded public key.
    pub fn with_rsa_pem(pem: &[u8]) -> Result<Self, OidcError> {
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| OidcError::Configuration(format!("Invalid RSA public key: {e}")))?;
        Ok(Self {
            http: get_client()?,
            key,
            algorithm: Algorithm::RS256,
        })
    }

    fn validation(&self, config: &AppConfig) -> Validation {
        let issuer = config.issuer_base_url.trim_end_matches('/');
        let mut validation = Validation::new(self.algorithm);
        validation.set_audience(&[config.client_id.as_str()]);
        // Providers differ on whether the issuer carries a trailing slash
        validation.set_issuer(&[issuer.to_string(), format!("{issuer}/")]);
        validation
    }

    fn decode(&self, config: &AppConfig, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation(config))
            .map(|data| data.claims)
    }
}

/// HTTP client for provider calls.
///
/// `timeout` is 30 seconds so a stuck provider cannot hold a callback forever. Pool settings
/// match reqwest's defaults for idle timeout and per-host idle connections.
fn get_client() -> Result<reqwest::Client, OidcError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(32)
        .build()
        .map_err(|e| OidcError::Configuration(format!("Failed to create HTTP client: {e}")))
}

#[async_trait]
impl OAuthClient for OidcClient {
    async fn exchange_code(
        &self,
        config: &AppConfig,
        request: TokenRequest,
    ) -> Result<TokenSet, OidcError> {
        let mut form: Vec<(String, String)> = vec![
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("code".to_string(), request.code),
            ("redirect_uri".to_string(), request.redirect_uri),
            ("code_verifier".to_string(), request.code_verifier),
            ("client_id".to_string(), config.client_id.clone()),
        ];
        if let Some(secret) = &config.client_secret {
            form.push(("client_secret".to_string(), secret.clone()));
        }
        form.extend(request.authorization_params);

        let response = self
            .http
            .post(config.token_endpoint.as_str())
            .form(&form)
            .send()
            .await
            .map_err(|e| OidcError::TokenExchange(e.to_string()))?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| OidcError::TokenExchange(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!("Token Exchange Response: {} {}", status, response_body);
            return Err(OidcError::TokenExchange(format!("{status}: {response_body}")));
        }

        let tokens: TokenSet = serde_json::from_str(&response_body)
            .map_err(|e| OidcError::TokenExchange(e.to_string()))?;
        tracing::debug!(
            "Token exchange succeeded, id_token present: {}",
            tokens.id_token.is_some()
        );
        Ok(tokens)
    }

    async fn verify_id_token(
        &self,
        config: &AppConfig,
        id_token: &str,
    ) -> Result<Claims, OidcError> {
        self.decode(config, id_token)
            .map_err(|e| OidcError::IdToken(e.to_string()))
    }

    async fn verify_logout_token(
        &self,
        config: &AppConfig,
        logout_token: &str,
    ) -> Result<LogoutTokenClaims, OidcError> {
        let claims = self
            .decode(config, logout_token)
            .map_err(|e| OidcError::LogoutToken(e.to_string()))?;
        LogoutTokenClaims::from_claims(&claims)
    }

    async fn userinfo(&self, config: &AppConfig, access_token: &str) -> Result<Claims, OidcError> {
        let url = config
            .userinfo_endpoint
            .as_deref()
            .ok_or_else(|| OidcError::Configuration("userinfo endpoint is not set".to_string()))?;

        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| OidcError::Userinfo(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OidcError::Userinfo(response.status().to_string()));
        }

        let claims: Claims = response
            .json()
            .await
            .map_err(|e| OidcError::Userinfo(e.to_string()))?;
        Ok(claims)
    }
}
