use std::collections::BTreeMap;

use auth_dispatch::{
    AfterCallbackResult, CallbackOptions, Claims, Handlers, HookError, after_callback,
    handle_callback,
};
use http::StatusCode;
use proptest::prelude::*;
use serde_json::Value;

use crate::common::{
    SESSION_COOKIE, TRANSACTION_COOKIE, TestContext, cookie_pair, request_with_cookies,
    transaction,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().expect("tokio runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Whatever session the hook returns is exactly the session that gets persisted
    #[test]
    fn test_hook_session_is_persisted(
        sub in "[a-zA-Z0-9|_-]{1,32}",
        extra in proptest::collection::btree_map("[a-z]{1,12}", "[\\p{L}\\p{N} ]{0,24}", 0..6),
    ) {
        let persisted = runtime().block_on(async {
            let ctx = TestContext::new();
            ctx.seed_login(transaction("s1", "n1"), "u1").await;

            let mut user = Claims::new();
            user.insert("sub".to_string(), Value::String(sub.clone()));
            for (key, value) in &extra {
                user.insert(format!("x_{key}"), Value::String(value.clone()));
            }
            let replacement = user.clone();
            let hook = after_callback(move |_req, mut session, _state| {
                let user = replacement.clone();
                async move {
                    session.user = user;
                    Ok::<_, HookError>(AfterCallbackResult::Session(session))
                }
            });
            let handler = ctx.handler(Handlers::new().callback(handle_callback(
                CallbackOptions::default().with_after_callback(hook),
            )));

            let response = handler
                .app(request_with_cookies(
                    "/api/auth/callback?code=abc&state=s1",
                    &[&format!("{TRANSACTION_COOKIE}=s1")],
                ))
                .await
                .expect("callback");
            assert_eq!(response.status(), StatusCode::FOUND);

            let cookie = cookie_pair(response.headers(), SESSION_COOKIE).expect("session cookie");
            let session = ctx
                .auth
                .get_session(&request_with_cookies("/", &[&cookie]))
                .await
                .expect("load session")
                .expect("session present");
            (session.user, user)
        });

        prop_assert_eq!(persisted.0, persisted.1);
    }

    /// A state that differs from the transaction cookie never reaches the token endpoint
    #[test]
    fn test_mismatched_state_rejected(
        state in "[a-zA-Z0-9]{1,32}",
        cookie in "[a-zA-Z0-9]{1,32}",
    ) {
        prop_assume!(state != cookie);

        let (status, exchanges) = runtime().block_on(async {
            let ctx = TestContext::new();
            ctx.seed_login(transaction(&cookie, "n1"), "u1").await;

            let response = ctx
                .handler(Handlers::new())
                .app(request_with_cookies(
                    &format!("/api/auth/callback?code=abc&state={state}"),
                    &[&format!("{TRANSACTION_COOKIE}={cookie}")],
                ))
                .await
                .expect("callback");
            (response.status(), ctx.client.exchange_calls())
        });

        prop_assert_eq!(status, StatusCode::BAD_REQUEST);
        prop_assert_eq!(exchanges, 0);
    }

    /// Arbitrary query parameters on the callback never produce a session without a valid state
    #[test]
    fn test_callback_without_transaction_never_saves(
        params in proptest::collection::btree_map("[a-z_]{1,10}", "[a-zA-Z0-9]{0,16}", 0..5),
    ) {
        let params: BTreeMap<String, String> = params;
        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let saves = runtime().block_on(async {
            let ctx = TestContext::new();
            let response = ctx
                .handler(Handlers::new())
                .app(request_with_cookies(&format!("/api/auth/callback?{query}"), &[]))
                .await
                .expect("callback");
            assert!(response.status().is_client_error() || response.status().is_server_error());
            ctx.sessions.save_calls()
        });

        prop_assert_eq!(saves, 0);
    }
}
