use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::OidcError;

/// Verified token claims, keyed by claim name
pub type Claims = Map<String, Value>;

pub(crate) const BACKCHANNEL_LOGOUT_EVENT: &str =
    "http://schemas.openid.net/event/backchannel-logout";

/// Parameters for the authorization-code-to-token exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub code: String,
    /// Must equal the `redirect_uri` sent with the authorization request
    pub redirect_uri: String,
    pub code_verifier: String,
    /// Extra parameters forwarded to the token endpoint
    pub authorization_params: BTreeMap<String, String>,
}

/// Token endpoint response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Identity of the session(s) named by a back-channel logout token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutTokenClaims {
    pub sid: Option<String>,
    pub sub: Option<String>,
}

impl LogoutTokenClaims {
    /// Validate the logout-token specific claims.
    ///
    /// The token must carry the back-channel logout event, must not carry a nonce and must
    /// name a `sid`, a `sub` or both.
    pub fn from_claims(claims: &Claims) -> Result<Self, OidcError> {
        let has_event = claims
            .get("events")
            .and_then(Value::as_object)
            .is_some_and(|events| events.contains_key(BACKCHANNEL_LOGOUT_EVENT));
        if !has_event {
            return Err(OidcError::LogoutToken(
                "missing back-channel logout event".to_string(),
            ));
        }
        if claims.contains_key("nonce") {
            return Err(OidcError::LogoutToken(
                "nonce is not allowed in a logout token".to_string(),
            ));
        }

        let sid = claims.get("sid").and_then(Value::as_str).map(String::from);
        let sub = claims.get("sub").and_then(Value::as_str).map(String::from);
        if sid.is_none() && sub.is_none() {
            return Err(OidcError::LogoutToken("missing sid and sub".to_string()));
        }

        Ok(Self { sid, sub })
    }
}
