use std::collections::HashMap;

use chrono::Utc;
use http::Method;
use serde_json::Value;
use subtle::ConstantTimeEq;

use crate::Auth;
use crate::adapter::ResponseAdapter;
use crate::config::AppConfig;
use crate::errors::HandlerError;
use crate::oidc::{Claims, TokenRequest};
use crate::request::AuthRequest;
use crate::session::Session;
use crate::transaction::LoginTransaction;
use crate::utils::header_clear_cookie;

use super::types::{AfterCallbackResult, CallbackOptions};

/// Verify an authorization response and establish the session.
///
/// Shared by both handler shapes; only `adapter` knows how the result is delivered. No
/// session is persisted unless the exchange and every claim check succeeded and the
/// after-callback hook (if any) settled on a session.
pub async fn verify_callback(
    auth: &Auth,
    config: &AppConfig,
    req: &AuthRequest,
    adapter: &mut ResponseAdapter,
    options: &CallbackOptions,
) -> Result<(), HandlerError> {
    let params = callback_params(req);

    if let Some(error) = params.get("error") {
        let description = params
            .get("error_description")
            .map(String::as_str)
            .unwrap_or_default();
        return Err(HandlerError::callback(format!(
            "Authorization server returned an error: {error} {description}"
        ))
        .log());
    }

    let state = non_empty(&params, "state")
        .ok_or_else(|| HandlerError::callback("Missing state parameter").log())?;
    let code = non_empty(&params, "code")
        .ok_or_else(|| HandlerError::callback("Missing code parameter").log())?;

    let transaction = take_transaction(auth, req, &config.transaction_cookie_name, state).await?;

    let redirect_uri = options
        .redirect_uri
        .clone()
        .unwrap_or_else(|| transaction.redirect_uri.clone());
    let tokens = auth
        .client()
        .exchange_code(
            config,
            TokenRequest {
                code: code.to_string(),
                redirect_uri,
                code_verifier: transaction.code_verifier.clone(),
                authorization_params: options.authorization_params.clone(),
            },
        )
        .await
        .map_err(|e| {
            HandlerError::token_exchange(format!("Token exchange failed: {e}"))
                .with_cause(e)
                .log()
        })?;

    let id_token = tokens
        .id_token
        .as_deref()
        .ok_or_else(|| HandlerError::callback("Token response has no id_token").log())?;
    let claims = auth
        .client()
        .verify_id_token(config, id_token)
        .await
        .map_err(|e| {
            HandlerError::callback(format!("ID token validation failed: {e}"))
                .with_cause(e)
                .log()
        })?;

    verify_nonce(&claims, &transaction.nonce)?;
    let organization = options
        .organization
        .as_deref()
        .or(transaction.organization.as_deref());
    if let Some(organization) = organization {
        verify_organization(&claims, organization)?;
    }

    let session = Session::from_tokens(claims, tokens, Utc::now().timestamp());

    let session = match &options.after_callback {
        None => session,
        Some(hook) => {
            let result = hook(
                adapter.hook_request(req),
                session,
                transaction.callback_state(),
            )
            .await
            .map_err(|e| HandlerError::from_hook(e).log())?;

            match (result, adapter.is_page()) {
                (AfterCallbackResult::Session(session), _) => session,
                (AfterCallbackResult::Handled, true) => {
                    if !adapter.is_finished().await {
                        return Err(HandlerError::after_callback(
                            "afterCallback returned Handled without finishing the response",
                        )
                        .log());
                    }
                    tracing::debug!("afterCallback handled the response, no session saved");
                    return Ok(());
                }
                (AfterCallbackResult::Handled, false) => {
                    return Err(HandlerError::after_callback(
                        "afterCallback may only return Handled for page router requests",
                    )
                    .log());
                }
                (AfterCallbackResult::Response(response), false) => {
                    tracing::debug!(
                        "afterCallback returned a {} response, no session saved",
                        response.status()
                    );
                    return adapter.finalize_with_response(response).await;
                }
                (AfterCallbackResult::Response(_), true) => {
                    return Err(HandlerError::after_callback(
                        "afterCallback may only return a response for app router requests",
                    )
                    .log());
                }
            }
        }
    };

    if adapter.write_aborted() {
        tracing::debug!("Client went away before the session was saved");
        return Err(HandlerError::aborted());
    }

    let mut headers = auth.session_store().save(config, req, &session).await?;
    header_clear_cookie(&mut headers, &config.transaction_cookie_name)?;

    let location = transaction
        .return_to
        .clone()
        .unwrap_or_else(|| config.base_url.clone());
    tracing::info!("Login completed for sub {:?}", session.sub());
    adapter.finalize_with_session(headers, &location).await
}

/// Callback parameters: the query string, or the form body for `response_mode=form_post`.
fn callback_params(req: &AuthRequest) -> HashMap<String, String> {
    if req.method() == Method::POST {
        req.form_params()
    } else {
        req.query_params()
    }
}

fn non_empty<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

/// Match `state` against the transaction cookie and consume the stored transaction.
async fn take_transaction(
    auth: &Auth,
    req: &AuthRequest,
    cookie_name: &str,
    state: &str,
) -> Result<LoginTransaction, HandlerError> {
    let cookie_state = req
        .cookie(cookie_name)
        .ok_or_else(|| HandlerError::callback("Missing login transaction cookie").log())?;

    if !bool::from(cookie_state.as_bytes().ct_eq(state.as_bytes())) {
        return Err(HandlerError::callback("State does not match the login transaction").log());
    }

    auth.transaction_store()
        .take(state)
        .await?
        .ok_or_else(|| HandlerError::callback("Login transaction not found or expired").log())
}

fn verify_nonce(claims: &Claims, expected: &str) -> Result<(), HandlerError> {
    let nonce = claims
        .get("nonce")
        .and_then(Value::as_str)
        .ok_or_else(|| HandlerError::callback("ID token has no nonce").log())?;
    if !bool::from(nonce.as_bytes().ct_eq(expected.as_bytes())) {
        return Err(HandlerError::callback("Nonce mismatch").log());
    }
    Ok(())
}

/// `org_...` values are organization ids and match exactly; anything else is a name and
/// matches case-insensitively.
fn verify_organization(claims: &Claims, expected: &str) -> Result<(), HandlerError> {
    let (claim, matches) = if expected.starts_with("org_") {
        let claim = claims.get("org_id").and_then(Value::as_str);
        (claim, claim == Some(expected))
    } else {
        let claim = claims.get("org_name").and_then(Value::as_str);
        (claim, claim.is_some_and(|name| name.eq_ignore_ascii_case(expected)))
    };

    if !matches {
        return Err(HandlerError::callback(format!(
            "Organization mismatch: expected {expected}, found {claim:?}"
        ))
        .log());
    }
    Ok(())
}
