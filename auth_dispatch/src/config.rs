//! Central configuration for the auth_dispatch crate

use std::env;
use std::sync::LazyLock;

use crate::errors::HandlerError;
use crate::request::AuthRequest;

/// Route prefix under which the auth endpoints are mounted
///
/// Default: "/api/auth"
pub static AUTH_ROUTE_PREFIX: LazyLock<String> = LazyLock::new(|| {
    env::var("AUTH_ROUTE_PREFIX").unwrap_or_else(|_| "/api/auth".to_string())
});

const DEFAULT_SCOPE: &str = "openid profile email";
const DEFAULT_SESSION_COOKIE_NAME: &str = "appSession";
const DEFAULT_TRANSACTION_COOKIE_NAME: &str = "auth_verification";
const DEFAULT_SESSION_MAX_AGE: u64 = 86400;
const DEFAULT_TRANSACTION_MAX_AGE: u64 = 600;
// Browsers cap cookie lifetimes at 400 days
const MAX_COOKIE_MAX_AGE: u64 = 400 * 24 * 60 * 60;

/// Application configuration used by every handler invocation
///
/// Usually built once with [`AppConfig::from_env`], but any [`GetConfig`] implementation
/// may derive it per request (e.g. per-tenant base URLs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Public base URL of the application, e.g. `https://app.example.com`
    pub base_url: String,
    /// Route prefix the dispatcher is mounted under
    pub route_prefix: String,
    pub issuer_base_url: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: Option<String>,
    pub end_session_endpoint: Option<String>,
    pub scope: String,
    /// Default organization (id or name) sent with every login
    pub organization: Option<String>,
    /// Enables the back-channel logout route
    pub backchannel_logout: bool,
    /// Log out of the identity provider as well when an end-session endpoint is known
    pub idp_logout: bool,
    pub session_cookie_name: String,
    pub session_max_age: u64,
    pub transaction_cookie_name: String,
    pub transaction_max_age: u64,
}

impl AppConfig {
    /// Build a configuration with defaults for everything but the required fields.
    pub fn new(
        base_url: impl Into<String>,
        issuer_base_url: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        let issuer_base_url: String = issuer_base_url.into();
        let issuer = issuer_base_url.trim_end_matches('/').to_string();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            route_prefix: AUTH_ROUTE_PREFIX.to_string(),
            authorization_endpoint: format!("{issuer}/authorize"),
            token_endpoint: format!("{issuer}/oauth/token"),
            userinfo_endpoint: Some(format!("{issuer}/userinfo")),
            end_session_endpoint: None,
            issuer_base_url: issuer,
            client_id: client_id.into(),
            client_secret: None,
            scope: DEFAULT_SCOPE.to_string(),
            organization: None,
            backchannel_logout: false,
            idp_logout: false,
            session_cookie_name: DEFAULT_SESSION_COOKIE_NAME.to_string(),
            session_max_age: DEFAULT_SESSION_MAX_AGE,
            transaction_cookie_name: DEFAULT_TRANSACTION_COOKIE_NAME.to_string(),
            transaction_max_age: DEFAULT_TRANSACTION_MAX_AGE,
        }
    }

    /// Load the configuration from `AUTH_*` environment variables.
    ///
    /// `AUTH_BASE_URL`, `AUTH_ISSUER_BASE_URL` and `AUTH_CLIENT_ID` are required.
    pub fn from_env() -> Result<Self, HandlerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, HandlerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| HandlerError::configuration(format!("{key} must be set")))
        };

        let mut config = Self::new(
            required("AUTH_BASE_URL")?,
            required("AUTH_ISSUER_BASE_URL")?,
            required("AUTH_CLIENT_ID")?,
        );

        if let Some(prefix) = lookup("AUTH_ROUTE_PREFIX") {
            config.route_prefix = prefix;
        }
        config.client_secret = lookup("AUTH_CLIENT_SECRET");
        if let Some(url) = lookup("AUTH_AUTHORIZATION_ENDPOINT") {
            config.authorization_endpoint = url;
        }
        if let Some(url) = lookup("AUTH_TOKEN_ENDPOINT") {
            config.token_endpoint = url;
        }
        if let Some(url) = lookup("AUTH_USERINFO_ENDPOINT") {
            config.userinfo_endpoint = Some(url);
        }
        config.end_session_endpoint = lookup("AUTH_END_SESSION_ENDPOINT");
        if let Some(scope) = lookup("AUTH_SCOPE") {
            config.scope = scope;
        }
        config.organization = lookup("AUTH_ORGANIZATION");
        config.backchannel_logout = parse_flag(lookup("AUTH_BACKCHANNEL_LOGOUT"));
        config.idp_logout = parse_flag(lookup("AUTH_IDP_LOGOUT"));
        if let Some(name) = lookup("AUTH_SESSION_COOKIE_NAME") {
            config.session_cookie_name = name;
        }
        config.session_max_age = lookup("AUTH_SESSION_MAX_AGE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SESSION_MAX_AGE);
        if let Some(name) = lookup("AUTH_TRANSACTION_COOKIE_NAME") {
            config.transaction_cookie_name = name;
        }
        config.transaction_max_age = lookup("AUTH_TRANSACTION_MAX_AGE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TRANSACTION_MAX_AGE);

        config.validate()?;
        Ok(config)
    }

    /// Check the fields the handlers rely on.
    pub fn validate(&self) -> Result<(), HandlerError> {
        for (name, value) in [
            ("base_url", &self.base_url),
            ("issuer_base_url", &self.issuer_base_url),
            ("authorization_endpoint", &self.authorization_endpoint),
            ("token_endpoint", &self.token_endpoint),
        ] {
            url::Url::parse(value).map_err(|e| {
                HandlerError::configuration(format!("{name} is not a valid URL: {e}"))
            })?;
        }
        if self.client_id.is_empty() {
            return Err(HandlerError::configuration("client_id must not be empty"));
        }
        for (name, value) in [
            ("session_max_age", self.session_max_age),
            ("transaction_max_age", self.transaction_max_age),
        ] {
            if value > MAX_COOKIE_MAX_AGE {
                return Err(HandlerError::configuration(format!(
                    "{name} must not exceed {MAX_COOKIE_MAX_AGE} seconds"
                )));
            }
        }
        Ok(())
    }

    /// Absolute URL of the callback route, used as the default `redirect_uri`
    pub fn callback_url(&self) -> String {
        format!("{}{}/callback", self.base_url, self.route_prefix)
    }
}

fn parse_flag(value: Option<String>) -> bool {
    value
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Supplies the [`AppConfig`] for a request
pub trait GetConfig: Send + Sync {
    fn get_config(&self, req: &AuthRequest) -> Result<AppConfig, HandlerError>;
}

impl GetConfig for AppConfig {
    fn get_config(&self, _req: &AuthRequest) -> Result<AppConfig, HandlerError> {
        Ok(self.clone())
    }
}

impl<F> GetConfig for F
where
    F: Fn(&AuthRequest) -> Result<AppConfig, HandlerError> + Send + Sync,
{
    fn get_config(&self, req: &AuthRequest) -> Result<AppConfig, HandlerError> {
        self(req)
    }
}
