use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use auth_dispatch::{
    AbortSignal, AfterCallbackResult, AuthRequest, CallbackOptions, HandlerOptions, Handlers,
    HookError, HookRequest, PageResponse, StatusError, after_callback, handle_callback,
    json_response,
};
use http::header::LOCATION;
use http::{Method, StatusCode};
use serde_json::{Value, json};

use crate::common::{
    BASE_URL, SESSION_COOKIE, TRANSACTION_COOKIE, TestContext, clears_cookie, cookie_pair,
    id_token_claims, request_with_cookies, transaction,
};

fn callback_request(query: &str, state_cookie: &str) -> AuthRequest {
    request_with_cookies(
        &format!("/api/auth/callback?{query}"),
        &[&format!("{TRANSACTION_COOKIE}={state_cookie}")],
    )
}

fn handlers_with(options: CallbackOptions) -> Handlers {
    Handlers::new().callback(handle_callback(options))
}

/// Callback options whose after-callback hook keeps the session and counts its runs
fn counting_hook() -> (CallbackOptions, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let hook = after_callback(move |_req, session, _state| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { Ok::<_, HookError>(AfterCallbackResult::Session(session)) }
    });
    (CallbackOptions::default().with_after_callback(hook), calls)
}

/// Load the session the response's cookie points at
async fn session_from(ctx: &TestContext, response: &http::Response<String>) -> auth_dispatch::Session {
    let pair = cookie_pair(response.headers(), SESSION_COOKIE).expect("session cookie");
    let req = request_with_cookies("/", &[&pair]);
    ctx.auth
        .get_session(&req)
        .await
        .expect("load session")
        .expect("session exists")
}

#[tokio::test]
async fn test_callback_establishes_session() -> Result<(), HookError> {
    // Given a pending login {state: xyz, nonce: n1} answered for sub u1
    let ctx = TestContext::new();
    ctx.seed_login(transaction("xyz", "n1"), "u1").await;
    let (options, hook_calls) = counting_hook();
    let handler = ctx.handler(handlers_with(options));

    // When the provider redirects back with code=abc&state=xyz
    let response = handler
        .app(callback_request("code=abc&state=xyz", "xyz"))
        .await?;

    // Then the browser lands on the base URL with a session for u1
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
    assert_eq!(response.headers().get(LOCATION).unwrap(), BASE_URL);
    assert!(clears_cookie(response.headers(), TRANSACTION_COOKIE));

    let session = session_from(&ctx, &response).await;
    assert_eq!(session.sub(), Some("u1"));
    assert_eq!(session.access_token.as_deref(), Some("at1"));
    assert!(session.id_token.is_some());

    let request = ctx.client.last_request().expect("token request");
    assert_eq!(request.code, "abc");
    assert_eq!(request.code_verifier, "verifier-1");
    assert_eq!(request.redirect_uri, format!("{BASE_URL}/api/auth/callback"));
    Ok(())
}

#[tokio::test]
async fn test_session_user_equals_issued_claims() -> Result<(), HookError> {
    let ctx = TestContext::new();
    ctx.seed_login(transaction("xyz", "n1"), "u1").await;
    // Pin the claims so the comparison below is exact
    let claims = id_token_claims("u1", "n1");
    ctx.client.set_id_token_claims(claims.clone());

    let response = ctx
        .handler(Handlers::new())
        .app(callback_request("code=abc&state=xyz", "xyz"))
        .await?;

    let session = session_from(&ctx, &response).await;
    assert_eq!(Value::Object(session.user), claims);
    Ok(())
}

#[tokio::test]
async fn test_callback_page_router() -> Result<(), HookError> {
    let ctx = TestContext::new();
    ctx.seed_login(transaction("xyz", "n1"), "u1").await;
    let res = PageResponse::new();

    ctx.handler(Handlers::new())
        .page(callback_request("code=abc&state=xyz", "xyz"), res.clone())
        .await?;

    assert!(res.is_finished().await);
    let response = res.to_response().await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(session_from(&ctx, &response).await.sub(), Some("u1"));
    Ok(())
}

#[tokio::test]
async fn test_callback_form_post() -> Result<(), HookError> {
    let ctx = TestContext::new();
    ctx.seed_login(transaction("xyz", "n1"), "u1").await;

    let req = AuthRequest::builder()
        .method(Method::POST)
        .uri("/api/auth/callback")
        .header(http::header::COOKIE, &format!("{TRANSACTION_COOKIE}=xyz"))
        .body("code=abc&state=xyz")
        .build();
    let response = ctx.handler(Handlers::new()).app(req).await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(ctx.sessions.save_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_callback_redirects_to_return_to() -> Result<(), HookError> {
    let ctx = TestContext::new();
    let mut tx = transaction("xyz", "n1");
    tx.return_to = Some(format!("{BASE_URL}/dashboard"));
    ctx.seed_login(tx, "u1").await;

    let response = ctx
        .handler(Handlers::new())
        .app(callback_request("code=abc&state=xyz", "xyz"))
        .await?;

    assert_eq!(
        response.headers().get(LOCATION).unwrap().to_str()?,
        format!("{BASE_URL}/dashboard")
    );
    Ok(())
}

#[tokio::test]
async fn test_missing_state_is_400_without_exchange() -> Result<(), HookError> {
    let ctx = TestContext::new();
    ctx.seed_login(transaction("xyz", "n1"), "u1").await;

    let response = ctx
        .handler(Handlers::new())
        .app(callback_request("code=abc", "xyz"))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.body().is_empty());
    assert_eq!(ctx.client.exchange_calls(), 0);
    assert_eq!(ctx.sessions.save_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_missing_code_is_400() -> Result<(), HookError> {
    let ctx = TestContext::new();
    ctx.seed_login(transaction("xyz", "n1"), "u1").await;

    let response = ctx
        .handler(Handlers::new())
        .app(callback_request("state=xyz", "xyz"))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ctx.client.exchange_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_unmatched_state_is_400() -> Result<(), HookError> {
    let ctx = TestContext::new();
    ctx.seed_login(transaction("xyz", "n1"), "u1").await;
    let handler = ctx.handler(Handlers::new());

    // State differs from the transaction cookie
    let response = handler
        .app(callback_request("code=abc&state=other", "xyz"))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Cookie and state agree, but no such transaction was stored
    let response = handler
        .app(callback_request("code=abc&state=forged", "forged"))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // No transaction cookie at all
    let response = handler
        .app(AuthRequest::builder().uri("/api/auth/callback?code=abc&state=xyz").build())
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(ctx.client.exchange_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_transaction_is_single_use() -> Result<(), HookError> {
    let ctx = TestContext::new();
    ctx.seed_login(transaction("xyz", "n1"), "u1").await;
    let handler = ctx.handler(Handlers::new());

    let first = handler
        .app(callback_request("code=abc&state=xyz", "xyz"))
        .await?;
    let replay = handler
        .app(callback_request("code=abc&state=xyz", "xyz"))
        .await?;

    assert_eq!(first.status(), StatusCode::FOUND);
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ctx.client.exchange_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_provider_error_is_400() -> Result<(), HookError> {
    let ctx = TestContext::new();
    let response = ctx
        .handler(Handlers::new())
        .app(callback_request(
            "error=access_denied&error_description=User%20cancelled&state=xyz",
            "xyz",
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ctx.client.exchange_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_token_exchange_failure_is_500() -> Result<(), HookError> {
    let ctx = TestContext::new();
    ctx.seed_login(transaction("xyz", "n1"), "u1").await;
    ctx.client.fail_exchange();

    let (options, hook_calls) = counting_hook();

    let response = ctx
        .handler(handlers_with(options))
        .app(callback_request("code=abc&state=xyz", "xyz"))
        .await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(ctx.sessions.save_calls(), 0);
    assert_eq!(hook_calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_nonce_mismatch_is_400() -> Result<(), HookError> {
    let ctx = TestContext::new();
    ctx.seed_login(transaction("xyz", "n1"), "u1").await;
    ctx.client.set_id_token_claims(id_token_claims("u1", "replayed"));

    let (options, hook_calls) = counting_hook();

    let response = ctx
        .handler(handlers_with(options))
        .app(callback_request("code=abc&state=xyz", "xyz"))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ctx.sessions.save_calls(), 0);
    assert_eq!(hook_calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_organization_mismatch_is_400() -> Result<(), HookError> {
    let ctx = TestContext::new();
    let mut tx = transaction("xyz", "n1");
    tx.organization = Some("org_123".to_string());
    ctx.seed_login(tx, "u1").await;

    let (options, hook_calls) = counting_hook();

    let response = ctx
        .handler(handlers_with(options))
        .app(callback_request("code=abc&state=xyz", "xyz"))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ctx.sessions.save_calls(), 0);
    assert_eq!(hook_calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_after_callback_handled_page_401() -> Result<(), HookError> {
    // Given a page hook that rejects the user itself
    let ctx = TestContext::new();
    ctx.seed_login(transaction("xyz", "n1"), "u1").await;
    let hook = after_callback(|req: HookRequest, _session, _state| async move {
        let res = req.page_response().expect("page response");
        res.send(StatusCode::UNAUTHORIZED, "").await?;
        Ok::<_, HookError>(AfterCallbackResult::Handled)
    });
    let handler = ctx.handler(handlers_with(CallbackOptions::default().with_after_callback(hook)));
    let res = PageResponse::new();

    // When the callback runs
    handler
        .page(callback_request("code=abc&state=xyz", "xyz"), res.clone())
        .await?;

    // Then the hook's 401 is final and no session was saved
    assert_eq!(res.to_response().await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(ctx.sessions.save_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_after_callback_handled_unfinished_fails_closed() -> Result<(), HookError> {
    let ctx = TestContext::new();
    ctx.seed_login(transaction("xyz", "n1"), "u1").await;
    let hook = after_callback(|_req, _session, _state| async move {
        Ok(AfterCallbackResult::Handled)
    });
    let handler = ctx.handler(handlers_with(CallbackOptions::default().with_after_callback(hook)));
    let res = PageResponse::new();

    handler
        .page(callback_request("code=abc&state=xyz", "xyz"), res.clone())
        .await?;

    assert_eq!(
        res.to_response().await.status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(ctx.sessions.save_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_after_callback_modifies_session() -> Result<(), HookError> {
    let ctx = TestContext::new();
    let mut tx = transaction("xyz", "n1");
    tx.return_to = Some(format!("{BASE_URL}/welcome"));
    ctx.seed_login(tx, "u1").await;

    let hook = after_callback(|_req, mut session, state| async move {
        // The login's returnTo is visible to the hook
        if state.get("returnTo") != Some(&json!("https://app.example.com/welcome")) {
            return Err::<AfterCallbackResult, HookError>("returnTo missing".into());
        }
        session.user.insert("role".to_string(), json!("admin"));
        session.refresh_token = None;
        Ok(AfterCallbackResult::Session(session))
    });
    let response = ctx
        .handler(handlers_with(CallbackOptions::default().with_after_callback(hook)))
        .app(callback_request("code=abc&state=xyz", "xyz"))
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    let session = session_from(&ctx, &response).await;
    assert_eq!(session.user.get("role"), Some(&json!("admin")));
    Ok(())
}

#[tokio::test]
async fn test_after_callback_response_bypasses_session() -> Result<(), HookError> {
    let ctx = TestContext::new();
    ctx.seed_login(transaction("xyz", "n1"), "u1").await;
    let hook = after_callback(|_req, _session, _state| async move {
        Ok(AfterCallbackResult::Response(json_response(
            StatusCode::FORBIDDEN,
            &json!({"error": "not_invited"}),
        )))
    });

    let response = ctx
        .handler(handlers_with(CallbackOptions::default().with_after_callback(hook)))
        .app(callback_request("code=abc&state=xyz", "xyz"))
        .await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.body(), r#"{"error":"not_invited"}"#);
    assert_eq!(ctx.sessions.save_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_after_callback_invalid_shapes_are_500() -> Result<(), HookError> {
    // Handled from an app router request
    let ctx = TestContext::new();
    ctx.seed_login(transaction("xyz", "n1"), "u1").await;
    let hook = after_callback(|_req, _session, _state| async move {
        Ok(AfterCallbackResult::Handled)
    });
    let response = ctx
        .handler(handlers_with(CallbackOptions::default().with_after_callback(hook)))
        .app(callback_request("code=abc&state=xyz", "xyz"))
        .await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // A response from a page router request
    let ctx = TestContext::new();
    ctx.seed_login(transaction("xyz", "n1"), "u1").await;
    let hook = after_callback(|_req, _session, _state| async move {
        Ok(AfterCallbackResult::Response(json_response(
            StatusCode::OK,
            &json!({}),
        )))
    });
    let res = PageResponse::new();
    ctx.handler(handlers_with(CallbackOptions::default().with_after_callback(hook)))
        .page(callback_request("code=abc&state=xyz", "xyz"), res.clone())
        .await?;
    assert_eq!(
        res.to_response().await.status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(ctx.sessions.save_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_after_callback_status_error_is_honored() -> Result<(), HookError> {
    let ctx = TestContext::new();
    ctx.seed_login(transaction("xyz", "n1"), "u1").await;
    let hook = after_callback(|_req, _session, _state| async move {
        Err::<AfterCallbackResult, HookError>(Box::new(StatusError::new(
            StatusCode::FORBIDDEN,
            "user is blocked",
        )))
    });

    let response = ctx
        .handler(handlers_with(CallbackOptions::default().with_after_callback(hook)))
        .app(callback_request("code=abc&state=xyz", "xyz"))
        .await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(ctx.sessions.save_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_after_callback_plain_error_is_500() -> Result<(), HookError> {
    let ctx = TestContext::new();
    ctx.seed_login(transaction("xyz", "n1"), "u1").await;
    let hook = after_callback(|_req, _session, _state| async move {
        Err::<AfterCallbackResult, HookError>("database unavailable".into())
    });

    let response = ctx
        .handler(handlers_with(CallbackOptions::default().with_after_callback(hook)))
        .app(callback_request("code=abc&state=xyz", "xyz"))
        .await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}

#[tokio::test]
async fn test_aborted_app_request_writes_nothing() -> Result<(), HookError> {
    let ctx = TestContext::new();
    ctx.seed_login(transaction("xyz", "n1"), "u1").await;
    let signal = AbortSignal::new();
    signal.abort();

    let response = ctx
        .handler(Handlers::new())
        .app(callback_request("code=abc&state=xyz", "xyz").with_signal(signal))
        .await?;

    assert_eq!(response.status().as_u16(), 499);
    assert!(response.headers().is_empty());
    assert_eq!(ctx.sessions.save_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_callback_options_from_request() -> Result<(), HookError> {
    // Options resolved per request override the recorded redirect_uri
    let ctx = TestContext::new();
    ctx.seed_login(transaction("xyz", "n1"), "u1").await;
    let options = HandlerOptions::from_fn(|req: &AuthRequest| {
        let tenant = req.query_param("tenant").unwrap_or_default();
        Ok(CallbackOptions {
            redirect_uri: Some(format!("https://{tenant}.example.com/api/auth/callback")),
            ..Default::default()
        })
    });

    let response = ctx
        .handler(Handlers::new().callback(handle_callback(options)))
        .app(callback_request("code=abc&state=xyz&tenant=acme", "xyz"))
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        ctx.client.last_request().unwrap().redirect_uri,
        "https://acme.example.com/api/auth/callback"
    );
    Ok(())
}
