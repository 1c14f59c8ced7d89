use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use http::HeaderMap;

use crate::Auth;
use crate::adapter::ResponseAdapter;
use crate::config::AppConfig;
use crate::errors::{ErrorKind, HandlerError};
use crate::options::HandlerOptions;
use crate::request::AuthRequest;
use crate::router::AuthRoute;
use crate::transaction::{CallbackState, LoginTransaction};
use crate::utils::{expiry_after, gen_random_string, header_set_cookie, pkce_challenge};

use super::safe_return_to;

/// Computes extra state stored with the login and handed to the after-callback hook
pub type GetLoginState = Arc<dyn Fn(&AuthRequest) -> CallbackState + Send + Sync>;

// Parameters the login route owns; callers cannot override them
const RESERVED_PARAMS: &[&str] = &[
    "response_type",
    "client_id",
    "state",
    "nonce",
    "code_challenge",
    "code_challenge_method",
];

#[derive(Clone, Default)]
pub struct LoginOptions {
    /// Where to land after the callback when the request has no usable `returnTo`
    pub return_to: Option<String>,
    /// Extra authorization request parameters (`scope`, `redirect_uri`, `organization`,
    /// `prompt`, ...)
    pub authorization_params: BTreeMap<String, String>,
    pub get_login_state: Option<GetLoginState>,
}

impl fmt::Debug for LoginOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginOptions")
            .field("return_to", &self.return_to)
            .field("authorization_params", &self.authorization_params)
            .field("get_login_state", &self.get_login_state.as_ref().map(|_| ".."))
            .finish()
    }
}

pub struct LoginRoute {
    options: HandlerOptions<LoginOptions>,
}

pub fn handle_login(options: impl Into<HandlerOptions<LoginOptions>>) -> LoginRoute {
    LoginRoute {
        options: options.into(),
    }
}

#[async_trait]
impl AuthRoute for LoginRoute {
    async fn handle(
        &self,
        auth: &Auth,
        config: &AppConfig,
        req: &AuthRequest,
        adapter: &mut ResponseAdapter,
    ) -> Result<(), HandlerError> {
        let options = self.options.resolve(req).await?;

        let transaction = new_transaction(config, req, &options)?;
        let location = authorization_url(config, &options, &transaction)?;

        let mut headers = HeaderMap::new();
        header_set_cookie(
            &mut headers,
            &config.transaction_cookie_name,
            &transaction.state,
            transaction_same_site(&options),
            i64::try_from(config.transaction_max_age).unwrap_or(i64::MAX),
        )?;

        auth.transaction_store()
            .save(transaction)
            .await
            .map_err(|e| login_error(format!("Failed to store login transaction: {e}")))?;

        tracing::debug!("Redirecting to authorization endpoint");
        adapter.finalize_with_redirect(&location, headers).await
    }
}

/// A `form_post` callback is a cross-site POST, which only carries `SameSite=None` cookies
fn transaction_same_site(options: &LoginOptions) -> &'static str {
    match options.authorization_params.get("response_mode").map(String::as_str) {
        Some("form_post") => "None",
        _ => "Lax",
    }
}

fn login_error(message: String) -> HandlerError {
    HandlerError::new(ErrorKind::Login, message).log()
}

fn new_transaction(
    config: &AppConfig,
    req: &AuthRequest,
    options: &LoginOptions,
) -> Result<LoginTransaction, HandlerError> {
    let return_to = req
        .query_param("returnTo")
        .and_then(|target| safe_return_to(&config.base_url, &target))
        .or_else(|| options.return_to.clone());

    Ok(LoginTransaction {
        state: gen_random_string(32)?,
        nonce: gen_random_string(32)?,
        code_verifier: gen_random_string(32)?,
        redirect_uri: options
            .authorization_params
            .get("redirect_uri")
            .cloned()
            .unwrap_or_else(|| config.callback_url()),
        organization: options
            .authorization_params
            .get("organization")
            .cloned()
            .or_else(|| config.organization.clone()),
        return_to,
        custom_state: options
            .get_login_state
            .as_ref()
            .map(|f| f(req))
            .unwrap_or_default(),
        expires_at: expiry_after(config.transaction_max_age)?,
    })
}

fn authorization_url(
    config: &AppConfig,
    options: &LoginOptions,
    transaction: &LoginTransaction,
) -> Result<String, HandlerError> {
    let mut url = url::Url::parse(&config.authorization_endpoint).map_err(|e| {
        HandlerError::configuration(format!("Invalid authorization endpoint: {e}")).log()
    })?;

    let scope = options
        .authorization_params
        .get("scope")
        .map(String::as_str)
        .unwrap_or(config.scope.as_str());

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", &config.client_id)
            .append_pair("redirect_uri", &transaction.redirect_uri)
            .append_pair("scope", scope)
            .append_pair("state", &transaction.state)
            .append_pair("nonce", &transaction.nonce)
            .append_pair("code_challenge", &pkce_challenge(&transaction.code_verifier))
            .append_pair("code_challenge_method", "S256");
        if let Some(organization) = &transaction.organization {
            query.append_pair("organization", organization);
        }
        for (key, value) in &options.authorization_params {
            if matches!(key.as_str(), "scope" | "redirect_uri" | "organization")
                || RESERVED_PARAMS.contains(&key.as_str())
            {
                continue;
            }
            query.append_pair(key, value);
        }
    }

    Ok(url.into())
}
